//! Chat message text
//!
//! Every message the bot posts is built here so wording stays consistent.

use crate::domain::ProposalKind;

/// Fallback reply when a submission is missing required input
pub const INPUT_ERROR: &str =
    "Oops! It appears you've made an error while creating a proposal. Please try again, or ask someone for help!";

/// Reply when a vote is started from inside a thread
pub const THREAD_CONTEXT_ERROR: &str = "You cannot start a vote in a thread";

/// Mention a user
pub fn ping(user_id: &str) -> String {
    format!("<@{}>", user_id)
}

/// Relative timestamp markup for a Unix-millisecond instant
pub fn timestamp(ms: i64) -> String {
    format!("<t:{}:R>", ms.div_euclid(1000))
}

/// Fields shown in a vote announcement
#[derive(Debug, Clone)]
pub struct Announcement<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub user_id: &'a str,
    pub kind: ProposalKind,
    pub deadline: i64,
    pub objection_emoji: &'a str,
    pub cancel_emoji: Option<&'a str>,
}

/// Vote announcement posted when a proposal is submitted
pub fn announcement(a: &Announcement<'_>) -> String {
    let mut text = format!(
        "___{}___\n\
         **Name**: {}\n\
         **Description**: {}\n\
         **Proposed By**: {}\n\
         **Proposal Type**: {}\n\
         **{}**: {}\n\
         Press {} to object to this {}.",
        a.kind.heading(),
        a.name,
        a.description,
        ping(a.user_id),
        a.kind.display_value(),
        a.kind.deadline_label(),
        timestamp(a.deadline),
        a.objection_emoji,
        a.kind.subject(),
    );
    if let Some(cancel) = a.cancel_emoji {
        text.push_str(&format!("\nThe proposer can press {} to cancel this vote.", cancel));
    }
    text
}

/// Posted when objections push the deadline out
///
/// `renewals` is the count after this extension.
pub fn extension_notice(name: &str, user_id: &str, deadline: i64, renewals: u32) -> String {
    format!(
        "Vote \"{}\" by {} has been extended due to objections. The new deadline is {}. This vote has been renewed {} times.",
        name,
        ping(user_id),
        timestamp(deadline),
        renewals
    )
}

/// Posted when a vote closes with at most the seed objection
pub fn pass_notice(name: &str, user_id: &str) -> String {
    format!("Vote \"{}\" by {} has passed.", name, ping(user_id))
}

/// Posted when a vote runs out of renewals with objections outstanding
pub fn failure_notice(name: &str, user_id: &str, renewals: u32) -> String {
    format!(
        "Vote \"{}\" by {} has been renewed {} times. Since the vote still has objections, it has failed.",
        name,
        ping(user_id),
        renewals
    )
}

/// Posted when the proposer withdraws their vote
pub fn cancel_notice(name: &str, user_id: &str) -> String {
    format!("Vote \"{}\" by {} has been cancelled by the proposer.", name, ping(user_id))
}
