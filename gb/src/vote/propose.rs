//! Proposal submission
//!
//! Opens the discussion thread, posts the vote announcement, seeds the
//! objection reaction, stores the proposal, and arms its first deadline.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use super::clock::Clock;
use super::decision::VoteRules;
use super::engine::VoteEngine;
use crate::chat::{ChatError, ChatPlatform};
use crate::domain::{Partition, Proposal, ProposalKind, VoteContext};
use crate::notify::{self, Announcement};
use crate::store::{ProposalStore, StoreError};

/// Errors from submitting a proposal
#[derive(Debug, Error)]
pub enum ProposeError {
    /// The submission itself was unusable; the message is shown to the user
    #[error("{0}")]
    InvalidInput(String),

    /// The vote was started somewhere a vote cannot live (inside a thread)
    #[error("{0}")]
    InvalidContext(String),

    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// A user's proposal submission
#[derive(Debug, Clone)]
pub struct ProposalRequest {
    pub name: String,
    pub description: String,
    pub kind: ProposalKind,
    pub user_id: String,
    pub username: String,
    pub channel_id: String,
    pub guild_id: String,
    pub coordinates: Option<String>,
    pub image_link: Option<String>,
}

impl ProposalRequest {
    fn validate(&self) -> Result<(), ProposeError> {
        let required = [
            &self.name,
            &self.description,
            &self.user_id,
            &self.username,
            &self.channel_id,
        ];
        if required.iter().any(|s| s.trim().is_empty()) {
            debug!(name = %self.name, "validate: missing required input");
            return Err(ProposeError::InvalidInput(notify::INPUT_ERROR.to_string()));
        }
        Ok(())
    }
}

/// Submits proposals and hands them to the vote engine
pub struct Proposer {
    store: ProposalStore,
    chat: Arc<dyn ChatPlatform>,
    clock: Arc<dyn Clock>,
    rules: VoteRules,
    engine: Option<Arc<VoteEngine>>,
}

impl Proposer {
    /// A proposer without an engine; stored votes are armed by the daemon's next sweep
    pub fn new(store: ProposalStore, chat: Arc<dyn ChatPlatform>, clock: Arc<dyn Clock>, rules: VoteRules) -> Self {
        Self {
            store,
            chat,
            clock,
            rules,
            engine: None,
        }
    }

    /// A proposer sharing the engine's store, chat, clock, and rules
    pub fn for_engine(engine: Arc<VoteEngine>) -> Self {
        Self {
            store: engine.store().clone(),
            chat: Arc::clone(engine.chat()),
            clock: Arc::clone(engine.clock()),
            rules: engine.rules().clone(),
            engine: Some(engine),
        }
    }

    /// Run the submission flow, returning the stored proposal
    pub async fn propose(&self, request: ProposalRequest) -> Result<Proposal, ProposeError> {
        debug!(name = %request.name, kind = %request.kind, "propose: called");
        request.validate()?;

        let thread_name = format!("{} by {}", request.name, request.username);
        let thread_id = match self.chat.create_thread(&request.channel_id, &thread_name).await {
            Ok(id) => id,
            Err(e) if e.is_invalid_channel() => {
                debug!(channel_id = %request.channel_id, error = %e, "propose: channel cannot hold a thread");
                return Err(ProposeError::InvalidContext(notify::THREAD_CONTEXT_ERROR.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        self.chat.add_thread_member(&thread_id, &request.user_id).await?;

        let kind = request.kind;
        let deadline = self.clock.now_ms() + kind.base_ms();

        let text = notify::announcement(&Announcement {
            name: &request.name,
            description: &request.description,
            user_id: &request.user_id,
            kind,
            deadline,
            objection_emoji: &self.rules.objection_emoji,
            cancel_emoji: self.rules.cancel_emoji.as_deref(),
        });
        let message_id = self.chat.post_message(&request.channel_id, &text).await?;
        self.chat
            .add_reaction(&request.channel_id, &message_id, &self.rules.objection_emoji)
            .await?;
        if let Some(cancel) = &self.rules.cancel_emoji {
            self.chat.add_reaction(&request.channel_id, &message_id, cancel).await?;
        }

        let mut context = VoteContext::new(
            message_id,
            &request.channel_id,
            &request.user_id,
            &self.rules.objection_emoji,
            kind.base_hours(),
        );
        context.cancel_emoji = self.rules.cancel_emoji.clone();

        let mut proposal = Proposal::new(&request.name, &request.description, &request.username, kind)
            .with_thread_link(format!(
                "https://discord.com/channels/{}/{}/{}",
                request.guild_id, request.channel_id, thread_id
            ))
            .with_action_date(deadline)
            .with_context(context);
        proposal.date_proposed = self.clock.now_ms();
        proposal.coordinates = request.coordinates.filter(|s| !s.trim().is_empty());
        proposal.image_link = request.image_link.filter(|s| !s.trim().is_empty());

        self.store.insert(&proposal, Partition::InProgress).await?;
        info!(id = %proposal.id, name = %proposal.name, %deadline, "Proposal submitted");

        if let Some(engine) = &self.engine {
            let delay = Duration::from_millis((deadline - self.clock.now_ms()).max(0) as u64);
            engine.arm(proposal.clone(), delay).await;
        }

        Ok(proposal)
    }
}
