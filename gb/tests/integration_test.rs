//! Integration tests for govbot
//!
//! These drive whole vote lifecycles through the engine against the
//! in-memory chat platform and spreadsheet, on paused tokio time.

use std::sync::Arc;
use std::time::Duration;

use govbot::chat::{ChatPlatform, MemoryChat};
use govbot::domain::{DevType, Partition, Proposal};
use govbot::store::{DEFAULT_HEADER_ROWS, ProposalStore, codec};
use govbot::vote::{ProposalRequest, Proposer, TokioClock, VoteEngine, VoteRules, recover};
use sheetstore::{MemorySheets, Sheets};
use tempfile::TempDir;

const HOUR: Duration = Duration::from_secs(3600);
const HOUR_MS: i64 = 3_600_000;
const T0: i64 = 1_700_000_000_000;

// =============================================================================
// Helpers
// =============================================================================

fn memory_sheets() -> Arc<MemorySheets> {
    Arc::new(MemorySheets::with_headers(&Partition::sheet_names(), DEFAULT_HEADER_ROWS))
}

fn engine_on(sheets: Arc<MemorySheets>, chat: Arc<MemoryChat>, rules: VoteRules) -> Arc<VoteEngine> {
    engine_at(sheets, chat, rules, T0)
}

/// Engine whose wall clock reads `origin_ms` now, as after a restart
fn engine_at(sheets: Arc<MemorySheets>, chat: Arc<MemoryChat>, rules: VoteRules, origin_ms: i64) -> Arc<VoteEngine> {
    let store = ProposalStore::new(sheets, DEFAULT_HEADER_ROWS);
    let clock = Arc::new(TokioClock::starting_at(origin_ms));
    Arc::new(VoteEngine::new(store, chat, clock, rules))
}

fn request(name: &str, dev_type: DevType) -> ProposalRequest {
    ProposalRequest {
        name: name.to_string(),
        description: "A new development".to_string(),
        kind: dev_type.into(),
        user_id: "42".to_string(),
        username: "alice".to_string(),
        channel_id: "votes".to_string(),
        guild_id: "guild".to_string(),
        coordinates: None,
        image_link: None,
    }
}

fn message_id(p: &Proposal) -> String {
    p.context.as_ref().map(|c| c.message_id.clone()).unwrap_or_default()
}

async fn last_post(chat: &MemoryChat) -> String {
    chat.posts().await.last().map(|p| p.content.clone()).unwrap_or_default()
}

/// Occurrences of `id` across every sheet, counting raw rows
async fn raw_copies(sheets: &MemorySheets, id: &str) -> usize {
    let mut count = 0;
    for name in Partition::sheet_names() {
        let rows = sheets.read(name).await.unwrap();
        count += rows.iter().filter(|r| codec::row_id(r) == Some(id)).count();
    }
    count
}

// =============================================================================
// Vote lifecycle
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_objected_vote_extends_then_passes() {
    let chat = Arc::new(MemoryChat::new());
    let engine = engine_on(memory_sheets(), chat.clone(), VoteRules::default());
    let proposal = Proposer::for_engine(engine.clone())
        .propose(request("Station", DevType::Rail))
        .await
        .unwrap();
    assert_eq!(proposal.action_date, Some(T0 + 24 * HOUR_MS));

    // Seed plus two objectors
    chat.set_reaction_count(&message_id(&proposal), "✋", 3).await;
    tokio::time::sleep(24 * HOUR + Duration::from_secs(1)).await;

    let (partition, stored) = engine.store().find(&proposal.id).await.unwrap().unwrap();
    assert_eq!(partition, Partition::InProgress);
    assert_eq!(stored.num_extensions, 1);
    assert_eq!(stored.action_date, Some(T0 + 36 * HOUR_MS));
    assert!(last_post(&chat).await.ends_with("This vote has been renewed 1 times."));
    assert!(engine.is_armed(&proposal.id).await);

    // Every objection withdrawn
    chat.set_reaction_count(&message_id(&proposal), "✋", 0).await;
    tokio::time::sleep(12 * HOUR).await;

    let (partition, stored) = engine.store().find(&proposal.id).await.unwrap().unwrap();
    assert_eq!(partition, Partition::Approved);
    assert_eq!(stored.action_date, Some(T0 + 36 * HOUR_MS));
    assert_eq!(last_post(&chat).await, "Vote \"Station\" by <@42> has passed.");
    assert!(engine.armed_ids().await.is_empty());

    let all = engine.store().list_all().await.unwrap();
    assert!(all.in_progress.is_empty());
    assert_eq!(all.approved.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_persistent_objections_fail_after_renewals() {
    let chat = Arc::new(MemoryChat::new());
    let engine = engine_on(memory_sheets(), chat.clone(), VoteRules::default());
    let proposal = Proposer::for_engine(engine.clone())
        .propose(request("Highway", DevType::Road))
        .await
        .unwrap();
    chat.set_reaction_count(&message_id(&proposal), "✋", 4).await;

    // 24h, then +12h, +24h, +24h, +24h before the final evaluation
    tokio::time::sleep(108 * HOUR + Duration::from_secs(1)).await;

    let (partition, stored) = engine.store().find(&proposal.id).await.unwrap().unwrap();
    assert_eq!(partition, Partition::Denied);
    assert_eq!(stored.num_extensions, 4);
    assert_eq!(
        last_post(&chat).await,
        "Vote \"Highway\" by <@42> has been renewed 4 times. Since the vote still has objections, it has failed."
    );

    let extensions = chat
        .posts()
        .await
        .iter()
        .filter(|p| p.content.contains("has been extended"))
        .count();
    assert_eq!(extensions, 4);
    assert!(engine.armed_ids().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_reaction_from_other_user_is_ignored() {
    let rules = VoteRules {
        cancel_emoji: Some("❌".to_string()),
        ..VoteRules::default()
    };
    let chat = Arc::new(MemoryChat::new());
    let engine = engine_on(memory_sheets(), chat.clone(), rules);
    let proposal = Proposer::for_engine(engine.clone())
        .propose(request("Village", DevType::Town))
        .await
        .unwrap();
    chat.react(&message_id(&proposal), "❌", "someone-else").await;

    tokio::time::sleep(24 * HOUR + Duration::from_secs(1)).await;

    assert_eq!(
        engine.store().find(&proposal.id).await.unwrap().unwrap().0,
        Partition::Approved
    );
}

#[tokio::test(start_paused = true)]
async fn test_proposer_cancel_removes_everywhere() {
    let rules = VoteRules {
        cancel_emoji: Some("❌".to_string()),
        ..VoteRules::default()
    };
    let sheets = memory_sheets();
    let chat = Arc::new(MemoryChat::new());
    let engine = engine_on(sheets.clone(), chat.clone(), rules);
    let proposal = Proposer::for_engine(engine.clone())
        .propose(request("Village", DevType::Town))
        .await
        .unwrap();
    chat.set_reaction_count(&message_id(&proposal), "✋", 6).await;
    chat.react(&message_id(&proposal), "❌", "42").await;

    tokio::time::sleep(24 * HOUR + Duration::from_secs(1)).await;

    assert!(engine.store().find(&proposal.id).await.unwrap().is_none());
    assert_eq!(raw_copies(&sheets, &proposal.id).await, 0);
    assert_eq!(
        last_post(&chat).await,
        "Vote \"Village\" by <@42> has been cancelled by the proposer."
    );
}

// =============================================================================
// Recovery
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_restart_recovers_from_file_store() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("proposals.json");
    let chat = Arc::new(MemoryChat::new());

    let open = || {
        Arc::new(MemorySheets::open(&path, &Partition::sheet_names(), DEFAULT_HEADER_ROWS).expect("open workbook"))
    };

    // First run: submit, then shut down before the deadline
    let first = engine_on(open(), chat.clone(), VoteRules::default());
    let proposal = Proposer::for_engine(first.clone())
        .propose(request("Terminal", DevType::Airport))
        .await
        .unwrap();
    tokio::time::sleep(HOUR).await;
    assert_eq!(first.shutdown().await, 1);

    // Second run reads the same workbook
    let second = engine_at(open(), chat.clone(), VoteRules::default(), T0 + HOUR_MS);
    let stats = recover(&second).await.unwrap();
    assert_eq!(stats.in_progress, 1);
    assert_eq!(stats.armed, 1);
    assert_eq!(stats.repaired, 0);
    assert_eq!(second.armed_ids().await, vec![proposal.id.clone()]);

    // Recovering again arms nothing new
    let again = recover(&second).await.unwrap();
    assert_eq!(again.armed, 0);
    assert_eq!(again.already_armed, 1);
    assert_eq!(second.armed_ids().await.len(), 1);

    tokio::time::sleep(72 * HOUR).await;
    let (partition, _) = second.store().find(&proposal.id).await.unwrap().unwrap();
    assert_eq!(partition, Partition::Approved);

    // Exactly one pass notice for the one vote
    let passes = chat
        .posts()
        .await
        .iter()
        .filter(|p| p.content.ends_with("has passed."))
        .count();
    assert_eq!(passes, 1);
}

#[tokio::test(start_paused = true)]
async fn test_overdue_vote_evaluates_on_recovery() {
    let sheets = memory_sheets();
    let chat = Arc::new(MemoryChat::new());
    let first = engine_on(sheets.clone(), chat.clone(), VoteRules::default());
    let proposal = Proposer::for_engine(first.clone())
        .propose(request("Depot", DevType::Misc))
        .await
        .unwrap();
    first.shutdown().await;

    // Downtime past the deadline
    tokio::time::sleep(48 * HOUR).await;

    let late = engine_at(sheets.clone(), chat.clone(), VoteRules::default(), T0 + 48 * HOUR_MS);

    let stats = recover(&late).await.unwrap();
    assert_eq!(stats.armed, 1);
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(
        late.store().find(&proposal.id).await.unwrap().unwrap().0,
        Partition::Approved
    );
}

// =============================================================================
// Partition exclusivity
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_duplicate_rows_resolve_and_repair() {
    let sheets = memory_sheets();
    let store = ProposalStore::new(sheets.clone(), DEFAULT_HEADER_ROWS);

    let base = Proposal::with_id("dup", "Bridge", "d", "alice", DevType::Road).with_action_date(T0);
    let mut newer = base.clone();
    newer.num_extensions = 2;
    newer.action_date = Some(T0 + 36 * HOUR_MS);

    // Simulate a crash that left the proposal in two partitions
    store.insert(&base, Partition::Approved).await.unwrap();
    store.insert(&newer, Partition::InProgress).await.unwrap();
    assert_eq!(raw_copies(&sheets, "dup").await, 2);

    let all = store.list_all().await.unwrap();
    let total = all.approved.len() + all.in_progress.len() + all.denied.len();
    assert_eq!(total, 1);
    assert_eq!(all.in_progress, vec![newer.clone()]);

    assert_eq!(store.repair().await.unwrap(), 1);
    assert_eq!(raw_copies(&sheets, "dup").await, 1);
    assert_eq!(store.find("dup").await.unwrap(), Some((Partition::InProgress, newer)));

    // A second pass has nothing to do
    assert_eq!(store.repair().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_every_transition_leaves_one_copy() {
    let sheets = memory_sheets();
    let chat = Arc::new(MemoryChat::new());
    let engine = engine_on(sheets.clone(), chat.clone(), VoteRules::default());
    let proposer = Proposer::for_engine(engine.clone());

    let passing = proposer.propose(request("Pass", DevType::Town)).await.unwrap();
    let extended = proposer.propose(request("Extend", DevType::Town)).await.unwrap();
    let failing = proposer.propose(request("Fail", DevType::Town)).await.unwrap();
    chat.set_reaction_count(&message_id(&extended), "✋", 2).await;
    chat.set_reaction_count(&message_id(&failing), "✋", 9).await;

    tokio::time::sleep(24 * HOUR + Duration::from_secs(1)).await;
    for p in [&passing, &extended, &failing] {
        assert_eq!(raw_copies(&sheets, &p.id).await, 1, "{}", p.name);
    }
    // Both objected votes were extended at the first deadline
    for p in [&extended, &failing] {
        let (partition, stored) = engine.store().find(&p.id).await.unwrap().unwrap();
        assert_eq!(partition, Partition::InProgress);
        assert_eq!(stored.num_extensions, 1);
    }

    tokio::time::sleep(200 * HOUR).await;
    for p in [&passing, &extended, &failing] {
        assert_eq!(raw_copies(&sheets, &p.id).await, 1, "{}", p.name);
    }
    let all = engine.store().list_all().await.unwrap();
    assert_eq!(all.approved.len(), 1);
    assert_eq!(all.denied.len(), 2);
    assert!(all.in_progress.is_empty());

    // The bot seeded exactly one objection per vote
    for p in [&passing, &extended, &failing] {
        let users = chat.reaction_users("votes", &message_id(p), "✋").await.unwrap();
        assert_eq!(users.first().map(String::as_str), Some("bot"));
    }
}
