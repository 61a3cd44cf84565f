//! CLI command definitions and subcommands

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::domain::{CommunityType, DevType, Partition};

/// govbot - objection-vote governance bot
#[derive(Parser)]
#[command(
    name = "gb",
    about = "Objection-vote governance bot with spreadsheet-backed proposal state",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the vote daemon in the foreground
    Run,

    /// Submit a development proposal for a vote
    Propose {
        #[command(flatten)]
        submission: Submission,

        /// Development type (town, rail, road, airport, misc)
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        dev_type: DevType,

        /// In-game coordinates
        #[arg(long)]
        coordinates: Option<String>,

        /// Link to an image of the development
        #[arg(long)]
        image: Option<String>,
    },

    /// Submit a community proposal for a vote
    ProposeCommunity {
        #[command(flatten)]
        submission: Submission,

        /// Community proposal type (player, rule, misc)
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        community_type: CommunityType,
    },

    /// List proposals
    List {
        /// Only show one partition (in-progress, approved, denied)
        #[arg(short, long)]
        partition: Option<Partition>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Clear duplicate rows and settle interrupted moves
    Repair,

    /// Show daemon logs
    Logs {
        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },
}

/// Arguments shared by every proposal submission
#[derive(Debug, Args)]
pub struct Submission {
    /// Proposal name
    #[arg(long)]
    pub name: String,

    /// What is being proposed
    #[arg(long)]
    pub description: String,

    /// Channel to hold the vote in
    #[arg(long)]
    pub channel: String,

    /// Guild (server) the channel belongs to
    #[arg(long)]
    pub guild: String,

    /// Proposer's user ID
    #[arg(long)]
    pub user: String,

    /// Proposer's display name
    #[arg(long)]
    pub username: String,
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("govbot")
        .join("logs")
        .join("govbot.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Output format for the list command
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => {
                debug!("OutputFormat::from_str: matched Text");
                Ok(Self::Text)
            }
            "json" => {
                debug!("OutputFormat::from_str: matched Json");
                Ok(Self::Json)
            }
            _ => {
                debug!(%s, "OutputFormat::from_str: unknown format");
                Err(format!("Unknown format: {}. Use: text or json", s))
            }
        }
    }
}
