//! Daemon wiring
//!
//! Builds the store, chat client, and vote engine from configuration, runs
//! startup recovery, then sweeps on an interval until a shutdown signal.
//! Armed timers are aborted on shutdown; the next start re-arms them from
//! the store.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use eyre::{Context, Result};
use sheetstore::{GoogleSheets, GoogleSheetsConfig, MemorySheets, Sheets};
use tracing::{debug, error, info, warn};

use crate::chat::{ChatPlatform, DiscordClient, DiscordConfig};
use crate::config::{Config, SheetsBackend};
use crate::domain::Partition;
use crate::store::ProposalStore;
use crate::vote::{SystemClock, VoteEngine, recover, sweep};

/// Open the configured proposal store
pub fn open_store(config: &Config) -> Result<ProposalStore> {
    debug!(backend = ?config.sheets.backend, "open_store: called");
    let settings = &config.sheets;
    let sheets: Arc<dyn Sheets> = match settings.backend {
        SheetsBackend::File => {
            let path = settings.expanded_file_path();
            info!(path = %path.display(), "Using file-backed proposal store");
            let book = MemorySheets::open(&path, &Partition::sheet_names(), settings.header_rows)
                .context(format!("Failed to open workbook {}", path.display()))?;
            Arc::new(book)
        }
        SheetsBackend::Google => {
            let access_token = std::env::var(&settings.token_env)
                .context(format!("{} environment variable not set", settings.token_env))?;
            info!(spreadsheet_id = %settings.spreadsheet_id, "Using Google Sheets proposal store");
            let client = GoogleSheets::new(GoogleSheetsConfig {
                spreadsheet_id: settings.spreadsheet_id.clone(),
                access_token,
                base_url: settings.base_url.clone(),
                timeout: settings.timeout(),
            })
            .context("Failed to create Google Sheets client")?;
            Arc::new(client)
        }
    };
    Ok(ProposalStore::new(sheets, settings.header_rows))
}

/// Open the Discord client
pub fn open_chat(config: &Config) -> Result<Arc<dyn ChatPlatform>> {
    debug!(base_url = %config.discord.base_url, "open_chat: called");
    let token = std::env::var(&config.discord.token_env)
        .context(format!("{} environment variable not set", config.discord.token_env))?;
    let client = DiscordClient::new(DiscordConfig {
        token,
        base_url: config.discord.base_url.clone(),
        timeout: config.discord.timeout(),
    })
    .context("Failed to create Discord client")?;
    Ok(Arc::new(client))
}

/// Build a vote engine on the wall clock
pub fn build_engine(config: &Config) -> Result<Arc<VoteEngine>> {
    debug!("build_engine: called");
    let store = open_store(config)?;
    let chat = open_chat(config)?;
    let rules = config.vote.to_rules();
    Ok(Arc::new(VoteEngine::new(store, chat, Arc::new(SystemClock), rules)))
}

/// Run the daemon until SIGINT or SIGTERM
pub async fn run_daemon(config: &Config) -> Result<()> {
    debug!("run_daemon: called");
    config.validate()?;
    let engine = build_engine(config)?;
    info!(rules = ?engine.rules(), "Daemon starting");

    run_until(engine, config.vote.sweep_interval(), shutdown_signal()).await
}

/// Recover, then sweep every `interval` until `shutdown` resolves
pub async fn run_until<F>(engine: Arc<VoteEngine>, interval: Duration, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    debug!(?interval, "run_until: called");
    recover(&engine).await.context("Startup recovery failed")?;

    let sweeper = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; recovery already covered it
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match sweep(&engine).await {
                    Ok(stats) if stats.armed > 0 => info!(%stats, "Sweep armed votes"),
                    Ok(stats) => debug!(%stats, "run_until: sweep found nothing new"),
                    Err(e) => error!(error = %e, "Sweep failed"),
                }
            }
        })
    };

    shutdown.await;
    info!("Daemon shutting down...");

    sweeper.abort();
    let aborted = engine.shutdown().await;
    info!(aborted, "Armed timers aborted");
    debug!("run_until: shutdown complete");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM (Ctrl+C off Unix)
async fn shutdown_signal() {
    debug!("shutdown_signal: setting up signal handlers");
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => warn!("SIGINT received"),
                    _ = sigterm.recv() => warn!("SIGTERM received"),
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Failed to install signal handlers, falling back to Ctrl+C");
            }
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::MemoryChat;
    use crate::domain::{DevType, Proposal, VoteContext};
    use crate::store::DEFAULT_HEADER_ROWS;
    use crate::vote::{TokioClock, VoteRules};
    use tokio::sync::oneshot;

    const T0: i64 = 1_700_000_000_000;

    #[test]
    fn test_open_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.sheets.file_path = dir.path().join("book.json").to_string_lossy().into_owned();
        assert!(open_store(&config).is_ok());
        assert!(dir.path().join("book.json").exists());
    }

    #[test]
    fn test_open_chat_needs_token() {
        let mut config = Config::default();
        config.discord.token_env = "GOVBOT_TEST_UNSET_DISCORD".to_string();
        assert!(open_chat(&config).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_arms_rows_added_while_running() {
        let sheets = Arc::new(MemorySheets::with_headers(&Partition::sheet_names(), DEFAULT_HEADER_ROWS));
        let store = ProposalStore::new(sheets, DEFAULT_HEADER_ROWS);
        let chat = Arc::new(MemoryChat::new());
        let clock = Arc::new(TokioClock::starting_at(T0));
        let engine = Arc::new(VoteEngine::new(store.clone(), chat, clock, VoteRules::default()));

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(run_until(Arc::clone(&engine), Duration::from_secs(60), async move {
            let _ = rx.await;
        }));
        tokio::time::sleep(Duration::from_secs(1)).await;

        // Row written by another process, e.g. `gb propose`
        let proposal = Proposal::with_id("p1", "Station", "d", "alice", DevType::Rail)
            .with_context(VoteContext::new("m1", "c1", "42", "✋", 24.0))
            .with_action_date(T0 + 3_600_000);
        store.insert(&proposal, Partition::InProgress).await.unwrap();
        assert!(!engine.is_armed("p1").await);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(engine.is_armed("p1").await);

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
        assert!(engine.armed_ids().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_sees_rows_from_another_process() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.sheets.file_path = dir.path().join("book.json").to_string_lossy().into_owned();

        let chat = Arc::new(MemoryChat::new());
        let clock = Arc::new(TokioClock::starting_at(T0));
        let engine = Arc::new(VoteEngine::new(
            open_store(&config).unwrap(),
            chat,
            clock,
            VoteRules::default(),
        ));
        let mine = Proposal::with_id("p1", "Station", "d", "alice", DevType::Rail)
            .with_context(VoteContext::new("m1", "c1", "42", "✋", 24.0))
            .with_action_date(T0 + 7_200_000);
        engine.store().insert(&mine, Partition::InProgress).await.unwrap();

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(run_until(Arc::clone(&engine), Duration::from_secs(60), async move {
            let _ = rx.await;
        }));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(engine.is_armed("p1").await);

        // `gb propose` opens its own handle on the same workbook
        let cli = open_store(&config).unwrap();
        let theirs = Proposal::with_id("p2", "Depot", "d", "bob", DevType::Town)
            .with_context(VoteContext::new("m2", "c1", "43", "✋", 24.0))
            .with_action_date(T0 + 3_600_000);
        cli.insert(&theirs, Partition::InProgress).await.unwrap();

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(engine.is_armed("p2").await);

        // A daemon write afterwards keeps the other process's row on disk
        engine.store().update(&mine.clone().with_action_date(T0 + 10_800_000)).await.unwrap();
        let reopened = open_store(&config).unwrap().list_all().await.unwrap();
        assert_eq!(reopened.in_progress.len(), 2);

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
