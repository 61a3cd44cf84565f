//! VoteEngine - drives each proposal from deadline to outcome
//!
//! Every armed proposal gets one tokio task that sleeps until its deadline,
//! evaluates the vote, and either re-arms itself (extension) or stops
//! (pass, fail, cancel). The store is the source of truth: the record is
//! refreshed before every transition.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::decision::{Decision, VoteRules, decide};
use super::timers::{ArmOutcome, TimerTable};
use crate::chat::ChatPlatform;
use crate::domain::{Partition, Proposal, VoteContext};
use crate::notify;
use crate::store::{ProposalStore, StoreError};

/// What an evaluation did
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationOutcome {
    /// Proposer withdrew; removed from the store
    Cancelled,
    /// Vote passed; moved to Approved
    Approved,
    /// Renewals exhausted with objections; moved to Denied
    Denied { renewals: u32 },
    /// Deadline pushed out; still In Progress
    Extended { proposal: Box<Proposal>, extend_ms: i64 },
    /// Tracked message is gone; the vote can never be decided
    DeadLetter,
    /// Transient failure; nothing changed and a later sweep retries
    Aborted(String),
    /// Record already left In Progress (a racing evaluation finished it)
    Stale,
}

/// The vote lifecycle engine
pub struct VoteEngine {
    store: ProposalStore,
    chat: Arc<dyn ChatPlatform>,
    clock: Arc<dyn Clock>,
    rules: VoteRules,
    timers: TimerTable,
    dead_letters: Mutex<HashSet<String>>,
}

impl VoteEngine {
    pub fn new(store: ProposalStore, chat: Arc<dyn ChatPlatform>, clock: Arc<dyn Clock>, rules: VoteRules) -> Self {
        debug!(?rules, "VoteEngine::new: called");
        Self {
            store,
            chat,
            clock,
            rules,
            timers: TimerTable::new(),
            dead_letters: Mutex::new(HashSet::new()),
        }
    }

    pub fn store(&self) -> &ProposalStore {
        &self.store
    }

    pub fn chat(&self) -> &Arc<dyn ChatPlatform> {
        &self.chat
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn rules(&self) -> &VoteRules {
        &self.rules
    }

    /// Schedule one evaluation of `proposal` after `delay`
    ///
    /// Returns immediately. A proposal that already has a timer is left alone.
    pub async fn arm(self: &Arc<Self>, proposal: Proposal, delay: Duration) -> ArmOutcome {
        debug!(id = %proposal.id, ?delay, "arm: called");
        let Some(generation) = self.timers.reserve(&proposal.id).await else {
            debug!(id = %proposal.id, "arm: already armed");
            return ArmOutcome::AlreadyArmed;
        };
        info!(id = %proposal.id, name = %proposal.name, delay_secs = delay.as_secs(), "Armed vote");
        self.schedule(proposal, generation, delay).await;
        ArmOutcome::Armed
    }

    /// Cancel a proposal's timer; true if one was armed
    pub async fn cancel(&self, id: &str) -> bool {
        debug!(%id, "cancel: called");
        self.timers.cancel(id).await
    }

    pub async fn is_armed(&self, id: &str) -> bool {
        self.timers.is_armed(id).await
    }

    /// IDs with an armed timer, sorted
    pub async fn armed_ids(&self) -> Vec<String> {
        self.timers.armed_ids().await
    }

    /// Whether evaluating `id` found its tracked message gone
    pub async fn is_dead_lettered(&self, id: &str) -> bool {
        self.dead_letters.lock().await.contains(id)
    }

    /// Abort every timer, returning how many were armed
    pub async fn shutdown(&self) -> usize {
        debug!("shutdown: called");
        let count = self.timers.shutdown().await;
        info!(count, "Vote engine stopped");
        count
    }

    async fn schedule(self: &Arc<Self>, proposal: Proposal, generation: u64, delay: Duration) {
        let id = proposal.id.clone();
        let handle = tokio::spawn(Arc::clone(self).timer_task(proposal, generation, delay));
        self.timers.attach(&id, generation, handle).await;
    }

    fn timer_task(self: Arc<Self>, proposal: Proposal, generation: u64, delay: Duration) -> BoxFuture<'static, ()> {
        async move {
            tokio::time::sleep(delay).await;

            let id = proposal.id.clone();
            if !self.timers.begin_evaluation(&id, generation).await {
                return;
            }

            match self.evaluate(&proposal).await {
                EvaluationOutcome::Extended { proposal, extend_ms } => {
                    let delay = Duration::from_millis(extend_ms.max(0) as u64);
                    if let Some(next) = self.timers.rearm(&id, generation).await {
                        self.schedule(*proposal, next, delay).await;
                    }
                }
                outcome => {
                    debug!(%id, ?outcome, "timer_task: evaluation finished");
                    self.timers.release(&id, generation).await;
                }
            }
        }
        .boxed()
    }

    /// Evaluate a vote at its deadline and apply the transition
    pub async fn evaluate(&self, proposal: &Proposal) -> EvaluationOutcome {
        let id = proposal.id.as_str();
        debug!(%id, name = %proposal.name, "evaluate: called");

        let Some(ctx) = proposal.context.as_ref() else {
            warn!(%id, "evaluate: proposal has no vote context");
            return EvaluationOutcome::Aborted("missing vote context".to_string());
        };

        let message = match self.chat.fetch_message(&ctx.channel_id, &ctx.message_id).await {
            Ok(Some(message)) => message,
            Ok(None) => {
                warn!(%id, message_id = %ctx.message_id, "Vote message gone, dead-lettering");
                self.dead_letters.lock().await.insert(id.to_string());
                return EvaluationOutcome::DeadLetter;
            }
            Err(e) => {
                warn!(%id, error = %e, "evaluate: could not fetch vote message, aborting");
                return EvaluationOutcome::Aborted(e.to_string());
            }
        };

        let cancel_present = ctx.cancel_emoji.as_deref().is_some_and(|e| message.has_reaction(e));
        let cancelled = match self.cancelled_by_proposer(ctx, cancel_present).await {
            Ok(cancelled) => cancelled,
            Err(reason) => return EvaluationOutcome::Aborted(reason),
        };

        let mut current = match self.store.find(id).await {
            Ok(Some((Partition::InProgress, stored))) => stored,
            Ok(Some((partition, _))) => {
                debug!(%id, %partition, "evaluate: already finished elsewhere");
                return EvaluationOutcome::Stale;
            }
            Ok(None) => {
                debug!(%id, "evaluate: no longer in store");
                return EvaluationOutcome::Stale;
            }
            Err(e) => {
                warn!(%id, error = %e, "evaluate: could not refresh proposal, aborting");
                return EvaluationOutcome::Aborted(e.to_string());
            }
        };
        current.num_extensions = current.num_extensions.max(proposal.num_extensions);
        if current.context.is_none() {
            current.context = Some(ctx.clone());
        }

        let objections = message.reaction_count(&ctx.objection_emoji);
        let now = self.clock.now_ms();
        let decision = decide(objections, cancelled, current.num_extensions, ctx.base_ms(), &self.rules);
        debug!(%id, objections, ?decision, "evaluate: decided");

        match decision {
            Decision::Cancel => {
                if let Err(e) = self.store.remove(id).await {
                    warn!(%id, error = %e, "evaluate: failed to remove cancelled proposal");
                }
                self.post(ctx, &notify::cancel_notice(&current.name, &ctx.user_id)).await;
                info!(%id, name = %current.name, "Vote cancelled by proposer");
                EvaluationOutcome::Cancelled
            }
            Decision::Approve => {
                current.action_date = Some(now);
                self.finish(&current, Partition::Approved).await;
                self.post(ctx, &notify::pass_notice(&current.name, &ctx.user_id)).await;
                info!(%id, name = %current.name, "Vote passed");
                EvaluationOutcome::Approved
            }
            Decision::Deny => {
                let renewals = current.num_extensions;
                current.action_date = Some(now);
                self.finish(&current, Partition::Denied).await;
                self.post(ctx, &notify::failure_notice(&current.name, &ctx.user_id, renewals))
                    .await;
                info!(%id, name = %current.name, renewals, "Vote failed");
                EvaluationOutcome::Denied { renewals }
            }
            Decision::Extend { extend_ms } => {
                let deadline = now + extend_ms;
                current.action_date = Some(deadline);
                current.num_extensions += 1;
                if let Err(e) = self.store.update(&current).await {
                    warn!(%id, error = %e, "evaluate: failed to persist extension");
                }
                self.post(
                    ctx,
                    &notify::extension_notice(&current.name, &ctx.user_id, deadline, current.num_extensions),
                )
                .await;
                info!(%id, name = %current.name, renewals = current.num_extensions, deadline, "Vote extended");
                EvaluationOutcome::Extended {
                    proposal: Box::new(current),
                    extend_ms,
                }
            }
        }
    }

    /// Whether the proposer applied the cancel reaction
    async fn cancelled_by_proposer(&self, ctx: &VoteContext, present: bool) -> Result<bool, String> {
        let Some(emoji) = ctx.cancel_emoji.as_deref() else {
            return Ok(false);
        };
        if !present {
            return Ok(false);
        }
        match self.chat.reaction_users(&ctx.channel_id, &ctx.message_id, emoji).await {
            Ok(users) => Ok(users.iter().any(|u| u == &ctx.user_id)),
            Err(e) => {
                warn!(message_id = %ctx.message_id, error = %e, "cancelled_by_proposer: could not list reactions");
                Err(e.to_string())
            }
        }
    }

    /// Move a finished proposal to its terminal partition
    async fn finish(&self, proposal: &Proposal, partition: Partition) {
        match self.store.move_to(proposal, partition).await {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => {
                debug!(id = %proposal.id, "finish: record vanished before move");
            }
            Err(e) => {
                warn!(id = %proposal.id, %partition, error = %e, "finish: store write failed, sweep will retry");
            }
        }
    }

    async fn post(&self, ctx: &VoteContext, content: &str) {
        if let Err(e) = self.chat.post_message(&ctx.channel_id, content).await {
            warn!(channel_id = %ctx.channel_id, error = %e, "post: failed to send notice");
        }
    }
}
