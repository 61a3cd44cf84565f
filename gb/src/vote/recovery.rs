//! Recovery - re-arm in-flight votes from the store
//!
//! On startup the store is repaired and every In Progress proposal gets a
//! timer for whatever is left of its deadline. The daemon's periodic sweep
//! runs the same arming pass without the repair, which also retries votes
//! whose evaluation was aborted or whose terminal write failed.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::engine::VoteEngine;
use super::timers::ArmOutcome;
use crate::domain::Proposal;
use crate::store::StoreError;

/// Statistics from a recovery or sweep pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    /// In Progress proposals found
    pub in_progress: usize,
    /// Timers newly armed
    pub armed: usize,
    /// Proposals that already had a timer
    pub already_armed: usize,
    /// Proposals missing their vote context or deadline
    pub skipped: usize,
    /// Rows changed by the store repair pass
    pub repaired: usize,
    /// Proposals whose vote message is known to be gone
    pub dead_lettered: usize,
}

impl std::fmt::Display for RecoveryStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} in progress: {} armed, {} already armed, {} skipped, {} dead-lettered; {} rows repaired",
            self.in_progress, self.armed, self.already_armed, self.skipped, self.dead_lettered, self.repaired
        )
    }
}

/// Repair the store, then arm every in-flight vote
pub async fn recover(engine: &Arc<VoteEngine>) -> Result<RecoveryStats, StoreError> {
    debug!("recover: called");
    info!("Recovering in-flight votes");

    let repaired = engine.store().repair().await?;
    let mut stats = sweep(engine).await?;
    stats.repaired = repaired;

    info!(%stats, "Recovery complete");
    Ok(stats)
}

/// Arm every In Progress proposal that has no timer yet
pub async fn sweep(engine: &Arc<VoteEngine>) -> Result<RecoveryStats, StoreError> {
    debug!("sweep: called");
    let all = engine.store().list_all().await?;
    let now = engine.clock().now_ms();

    let mut stats = RecoveryStats {
        in_progress: all.in_progress.len(),
        ..RecoveryStats::default()
    };

    for proposal in all.in_progress {
        arm_one(engine, proposal, now, &mut stats).await;
    }

    debug!(%stats, "sweep: complete");
    Ok(stats)
}

async fn arm_one(engine: &Arc<VoteEngine>, proposal: Proposal, now: i64, stats: &mut RecoveryStats) {
    let Some(remaining) = proposal.remaining_ms(now).filter(|_| proposal.context.is_some()) else {
        warn!(id = %proposal.id, name = %proposal.name, "Skipping proposal without vote context or deadline");
        stats.skipped += 1;
        return;
    };

    if engine.is_dead_lettered(&proposal.id).await {
        debug!(id = %proposal.id, "arm_one: dead-lettered, skipping");
        stats.dead_lettered += 1;
        return;
    }

    let id = proposal.id.clone();
    match engine.arm(proposal, Duration::from_millis(remaining as u64)).await {
        ArmOutcome::Armed => {
            debug!(%id, remaining_ms = remaining, "arm_one: armed");
            stats.armed += 1;
        }
        ArmOutcome::AlreadyArmed => {
            debug!(%id, "arm_one: already armed");
            stats.already_armed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatPlatform, MemoryChat};
    use crate::domain::{DevType, Partition, VoteContext};
    use crate::store::{DEFAULT_HEADER_ROWS, ProposalStore};
    use crate::vote::{TokioClock, VoteRules};
    use sheetstore::MemorySheets;

    const T0: i64 = 1_700_000_000_000;

    fn engine() -> (Arc<VoteEngine>, Arc<MemoryChat>) {
        let sheets = Arc::new(MemorySheets::with_headers(&Partition::sheet_names(), DEFAULT_HEADER_ROWS));
        let store = ProposalStore::new(sheets, DEFAULT_HEADER_ROWS);
        let chat = Arc::new(MemoryChat::new());
        let clock = Arc::new(TokioClock::starting_at(T0));
        let engine = Arc::new(VoteEngine::new(store, chat.clone(), clock, VoteRules::default()));
        (engine, chat)
    }

    async fn insert(engine: &VoteEngine, chat: &MemoryChat, id: &str, deadline: i64) -> Proposal {
        let message_id = chat.post_message("votes", "vote").await.unwrap();
        chat.add_reaction("votes", &message_id, "✋").await.unwrap();
        let p = Proposal::with_id(id, id, "d", "alice", DevType::Town)
            .with_action_date(deadline)
            .with_context(VoteContext::new(message_id, "votes", "42", "✋", 24.0));
        engine.store().insert(&p, Partition::InProgress).await.unwrap();
        p
    }

    #[tokio::test(start_paused = true)]
    async fn test_recover_arms_in_progress_only() {
        let (engine, chat) = engine();
        insert(&engine, &chat, "a", T0 + 3_600_000).await;
        insert(&engine, &chat, "b", T0 + 1_000).await;
        let done = Proposal::with_id("c", "c", "d", "alice", DevType::Town).with_action_date(T0);
        engine.store().insert(&done, Partition::Approved).await.unwrap();

        let stats = recover(&engine).await.unwrap();
        assert_eq!(stats.in_progress, 2);
        assert_eq!(stats.armed, 2);
        assert_eq!(engine.armed_ids().await, vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recover_is_idempotent() {
        let (engine, chat) = engine();
        insert(&engine, &chat, "a", T0 + 3_600_000).await;

        let first = recover(&engine).await.unwrap();
        let second = recover(&engine).await.unwrap();
        assert_eq!(first.armed, 1);
        assert_eq!(second.armed, 0);
        assert_eq!(second.already_armed, 1);
        assert_eq!(engine.armed_ids().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recover_skips_malformed() {
        let (engine, _) = engine();
        let no_context = Proposal::with_id("x", "x", "d", "alice", DevType::Town).with_action_date(T0);
        let no_deadline = Proposal::with_id("y", "y", "d", "alice", DevType::Town)
            .with_context(VoteContext::new("m", "c", "u", "✋", 24.0));
        engine.store().insert(&no_context, Partition::InProgress).await.unwrap();
        engine.store().insert(&no_deadline, Partition::InProgress).await.unwrap();

        let stats = recover(&engine).await.unwrap();
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.armed, 0);
        assert!(engine.armed_ids().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overdue_vote_fires_immediately() {
        let (engine, chat) = engine();
        insert(&engine, &chat, "late", T0 - 60_000).await;

        recover(&engine).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let (partition, _) = engine.store().find("late").await.unwrap().unwrap();
        assert_eq!(partition, Partition::Approved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_skips_dead_letters() {
        let (engine, chat) = engine();
        let p = insert(&engine, &chat, "gone", T0).await;
        chat.delete_message(&p.context.as_ref().unwrap().message_id).await;

        sweep(&engine).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(engine.is_dead_lettered("gone").await);

        let stats = sweep(&engine).await.unwrap();
        assert_eq!(stats.dead_lettered, 1);
        assert_eq!(stats.armed, 0);
    }

    #[test]
    fn test_stats_display() {
        let stats = RecoveryStats {
            in_progress: 3,
            armed: 2,
            already_armed: 1,
            ..RecoveryStats::default()
        };
        assert_eq!(
            stats.to_string(),
            "3 in progress: 2 armed, 1 already armed, 0 skipped, 0 dead-lettered; 0 rows repaired"
        );
    }
}
