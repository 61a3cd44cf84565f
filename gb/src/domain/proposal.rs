//! Proposal domain type
//!
//! The unit of work under vote. The external-context bag carries everything
//! the vote engine needs to re-arm itself after a restart.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::{Partition, ProposalKind};

/// Current wall-clock time in Unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// External context of a proposal: where its vote lives on the chat platform
///
/// Keys match the JSON stored in the sheet. Keys this type does not know
/// are kept in `extra` and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteContext {
    /// Vote message tracked for reactions
    #[serde(rename = "msgId")]
    pub message_id: String,

    /// Channel holding the vote message
    #[serde(rename = "channelId")]
    pub channel_id: String,

    /// Proposer's user ID
    #[serde(rename = "userId")]
    pub user_id: String,

    /// Reaction counted as an objection
    #[serde(rename = "emoji", alias = "objectEmoji")]
    pub objection_emoji: String,

    /// Reaction the proposer applies to withdraw the vote
    #[serde(rename = "cancelEmoji", default, skip_serializing_if = "Option::is_none")]
    pub cancel_emoji: Option<String>,

    /// Original per-stage duration in hours
    #[serde(rename = "time")]
    pub base_hours: f64,

    /// Unrecognized keys, preserved verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VoteContext {
    pub fn new(
        message_id: impl Into<String>,
        channel_id: impl Into<String>,
        user_id: impl Into<String>,
        objection_emoji: impl Into<String>,
        base_hours: f64,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            channel_id: channel_id.into(),
            user_id: user_id.into(),
            objection_emoji: objection_emoji.into(),
            cancel_emoji: None,
            base_hours,
            extra: Map::new(),
        }
    }

    /// Base duration in milliseconds
    pub fn base_ms(&self) -> i64 {
        (self.base_hours * 3_600_000.0).round() as i64
    }
}

/// A single item under vote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// Unique identifier, stable for the proposal's lifetime
    pub id: String,

    pub name: String,

    pub description: String,

    /// Display name of the proposer
    pub proposed_by: String,

    /// Free-form classification (the proposal kind's label)
    pub kind: String,

    pub coordinates: Option<String>,

    pub image_link: Option<String>,

    /// Link to the discussion thread
    pub thread_link: String,

    /// Creation timestamp (Unix milliseconds)
    pub date_proposed: i64,

    /// Current deadline (Unix milliseconds); moves forward on every extension
    pub action_date: Option<i64>,

    /// Renewal cycles so far
    pub num_extensions: u32,

    /// Advisory snapshot of objectors; live counts come from the chat platform
    #[serde(default)]
    pub objections: Vec<String>,

    /// Chat-platform context needed to re-arm the vote
    pub context: Option<VoteContext>,
}

impl Proposal {
    /// Create a new proposal with a generated ID
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        proposed_by: impl Into<String>,
        kind: impl Into<ProposalKind>,
    ) -> Self {
        let name = name.into();
        let kind = kind.into();
        debug!(%name, %kind, "Proposal::new: called");
        Self::with_id(uuid::Uuid::now_v7().to_string(), name, description, proposed_by, kind)
    }

    /// Create with a specific ID (for testing or recovery)
    pub fn with_id(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        proposed_by: impl Into<String>,
        kind: impl Into<ProposalKind>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            proposed_by: proposed_by.into(),
            kind: kind.into().display_value().to_string(),
            coordinates: None,
            image_link: None,
            thread_link: String::new(),
            date_proposed: now_ms(),
            action_date: None,
            num_extensions: 0,
            objections: Vec::new(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: VoteContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_action_date(mut self, action_date: i64) -> Self {
        self.action_date = Some(action_date);
        self
    }

    pub fn with_thread_link(mut self, link: impl Into<String>) -> Self {
        self.thread_link = link.into();
        self
    }

    /// Whether the record carries what the engine needs to re-arm it
    pub fn is_armable(&self) -> bool {
        self.context.is_some() && self.action_date.is_some()
    }

    /// Milliseconds until the current deadline, clamped at zero
    pub fn remaining_ms(&self, now: i64) -> Option<i64> {
        self.action_date.map(|deadline| (deadline - now).max(0))
    }
}

/// Every stored proposal, grouped by partition
#[derive(Debug, Clone, Default, Serialize)]
pub struct AllProposals {
    pub approved: Vec<Proposal>,
    pub in_progress: Vec<Proposal>,
    pub denied: Vec<Proposal>,
    pub all: Vec<Proposal>,
}

impl AllProposals {
    /// Add a proposal to its partition and to `all`
    pub fn push(&mut self, partition: Partition, proposal: Proposal) {
        match partition {
            Partition::Approved => self.approved.push(proposal.clone()),
            Partition::InProgress => self.in_progress.push(proposal.clone()),
            Partition::Denied => self.denied.push(proposal.clone()),
        }
        self.all.push(proposal);
    }

    /// Proposals in one partition
    pub fn partition(&self, partition: Partition) -> &[Proposal] {
        match partition {
            Partition::Approved => &self.approved,
            Partition::InProgress => &self.in_progress,
            Partition::Denied => &self.denied,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CommunityType, DevType};

    #[test]
    fn test_new_generates_unique_ids() {
        let a = Proposal::new("Station", "A rail station", "alice", DevType::Rail);
        let b = Proposal::new("Station", "A rail station", "alice", DevType::Rail);
        assert_ne!(a.id, b.id);
        assert_eq!(a.kind, "Rail 🚆");
        assert_eq!(a.num_extensions, 0);

        let c = Proposal::new("Rename spawn", "d", "alice", CommunityType::Rule);
        assert_eq!(c.kind, "Rule");
    }

    #[test]
    fn test_is_armable() {
        let p = Proposal::with_id("p1", "n", "d", "u", DevType::Town);
        assert!(!p.is_armable());

        let p = p.with_action_date(1_000);
        assert!(!p.is_armable());

        let p = p.with_context(VoteContext::new("m", "c", "u", "✋", 24.0));
        assert!(p.is_armable());
    }

    #[test]
    fn test_remaining_ms_clamps() {
        let p = Proposal::with_id("p1", "n", "d", "u", DevType::Town).with_action_date(10_000);
        assert_eq!(p.remaining_ms(4_000), Some(6_000));
        assert_eq!(p.remaining_ms(20_000), Some(0));
    }

    #[test]
    fn test_context_json_keys() {
        let mut ctx = VoteContext::new("msg1", "chan1", "user1", "✋", 24.0);
        ctx.cancel_emoji = Some("❌".to_string());
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["msgId"], "msg1");
        assert_eq!(json["channelId"], "chan1");
        assert_eq!(json["userId"], "user1");
        assert_eq!(json["emoji"], "✋");
        assert_eq!(json["cancelEmoji"], "❌");
        assert_eq!(json["time"], 24.0);
    }

    #[test]
    fn test_context_accepts_legacy_keys_and_keeps_unknown() {
        let raw = r#"{"msgId":"1","channelId":"2","userId":"3","objectEmoji":"✋","time":72,"note":"x"}"#;
        let ctx: VoteContext = serde_json::from_str(raw).unwrap();
        assert_eq!(ctx.objection_emoji, "✋");
        assert_eq!(ctx.base_hours, 72.0);
        assert_eq!(ctx.extra.get("note"), Some(&Value::String("x".to_string())));

        let back = serde_json::to_value(&ctx).unwrap();
        assert_eq!(back["note"], "x");
    }

    #[test]
    fn test_base_ms() {
        let ctx = VoteContext::new("m", "c", "u", "✋", 24.0);
        assert_eq!(ctx.base_ms(), 86_400_000);
    }

    #[test]
    fn test_all_proposals_push() {
        let mut all = AllProposals::default();
        all.push(Partition::InProgress, Proposal::with_id("a", "A", "", "", DevType::Town));
        all.push(Partition::Denied, Proposal::with_id("b", "B", "", "", DevType::Town));

        assert_eq!(all.partition(Partition::InProgress)[0].id, "a");
        assert_eq!(all.partition(Partition::Denied)[0].id, "b");
        assert!(all.approved.is_empty());
        assert_eq!(all.all.len(), 2);
    }
}
