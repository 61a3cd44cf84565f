//! govbot - objection-vote governance bot
//!
//! CLI entry point for running the vote daemon and managing proposals.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use govbot::cli::{Cli, Command, OutputFormat, Submission, get_log_path};
use govbot::config::Config;
use govbot::daemon::{open_chat, open_store, run_daemon};
use govbot::domain::{Partition, Proposal, ProposalKind};
use govbot::vote::{ProposalRequest, Proposer, SystemClock};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("govbot")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("govbot.log"))
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Run) | None => {
            debug!("main: matched Run command");
            println!("Starting govbot daemon (logs: {})", get_log_path().display());
            run_daemon(&config).await
        }
        Some(Command::Propose {
            submission,
            dev_type,
            coordinates,
            image,
        }) => {
            debug!(name = %submission.name, %dev_type, "main: matched Propose command");
            let request = proposal_request(submission, dev_type.into(), coordinates, image);
            cmd_propose(&config, request).await
        }
        Some(Command::ProposeCommunity {
            submission,
            community_type,
        }) => {
            debug!(name = %submission.name, %community_type, "main: matched ProposeCommunity command");
            let request = proposal_request(submission, community_type.into(), None, None);
            cmd_propose(&config, request).await
        }
        Some(Command::List { partition, format }) => {
            debug!(?partition, ?format, "main: matched List command");
            cmd_list(&config, partition, format).await
        }
        Some(Command::Repair) => {
            debug!("main: matched Repair command");
            cmd_repair(&config).await
        }
        Some(Command::Logs { lines }) => {
            debug!(lines, "main: matched Logs command");
            cmd_logs(lines)
        }
    }
}

fn proposal_request(
    submission: Submission,
    kind: ProposalKind,
    coordinates: Option<String>,
    image_link: Option<String>,
) -> ProposalRequest {
    ProposalRequest {
        name: submission.name,
        description: submission.description,
        kind,
        user_id: submission.user,
        username: submission.username,
        channel_id: submission.channel,
        guild_id: submission.guild,
        coordinates,
        image_link,
    }
}

/// Submit a proposal; the running daemon's next sweep arms its timer
async fn cmd_propose(config: &Config, request: ProposalRequest) -> Result<()> {
    debug!(name = %request.name, "cmd_propose: called");
    config.validate()?;
    let proposer = Proposer::new(
        open_store(config)?,
        open_chat(config)?,
        Arc::new(SystemClock),
        config.vote.to_rules(),
    );

    let proposal = proposer.propose(request).await?;
    println!("{} {} ({})", "Proposed".green().bold(), proposal.name, proposal.id);
    println!("Thread: {}", proposal.thread_link);
    if let Some(deadline) = proposal.action_date {
        println!("First deadline: {}", format_ms(deadline));
    }
    Ok(())
}

/// List proposals by partition
async fn cmd_list(config: &Config, partition: Option<Partition>, format: OutputFormat) -> Result<()> {
    debug!(?partition, ?format, "cmd_list: called");
    let all = open_store(config)?.list_all().await?;
    let partitions: Vec<Partition> = match partition {
        Some(p) => vec![p],
        None => Partition::ALL.to_vec(),
    };

    match format {
        OutputFormat::Json => {
            let json = match partition {
                Some(p) => serde_json::to_value(all.partition(p))?,
                None => serde_json::to_value(&all)?,
            };
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            for p in partitions {
                let proposals = all.partition(p);
                let header = format!("{} ({})", p.sheet_name(), proposals.len());
                let header = match p {
                    Partition::InProgress => header.yellow().bold(),
                    Partition::Approved => header.green().bold(),
                    Partition::Denied => header.red().bold(),
                };
                println!("{}", header);
                for proposal in proposals {
                    print_proposal(proposal);
                }
                println!();
            }
        }
    }
    Ok(())
}

fn print_proposal(p: &Proposal) {
    let deadline = p.action_date.map(format_ms).unwrap_or_else(|| "-".to_string());
    println!(
        "  {}  {:<24} {:<10} by {:<16} date: {}  renewals: {}  objections: {}",
        p.id.dimmed(),
        p.name,
        p.kind,
        p.proposed_by,
        deadline,
        p.num_extensions,
        p.objections.len()
    );
}

fn format_ms(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| ms.to_string())
}

/// Clear duplicate rows and settle interrupted moves
async fn cmd_repair(config: &Config) -> Result<()> {
    debug!("cmd_repair: called");
    let changed = open_store(config)?.repair().await?;
    println!("Repaired {} rows", changed);
    Ok(())
}

/// Print the tail of the log file
fn cmd_logs(lines: usize) -> Result<()> {
    debug!(lines, "cmd_logs: called");
    let log_path = get_log_path();

    if !log_path.exists() {
        debug!(?log_path, "cmd_logs: log file does not exist");
        println!("No log file found at: {}", log_path.display());
        return Ok(());
    }

    let file = fs::File::open(&log_path).context("Failed to open log file")?;
    let all_lines: Vec<String> = BufReader::new(file).lines().map_while(std::result::Result::ok).collect();
    let start = all_lines.len().saturating_sub(lines);

    for line in &all_lines[start..] {
        println!("{}", line);
    }
    Ok(())
}
