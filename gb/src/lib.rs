//! govbot - objection-vote governance bot
//!
//! Members propose developments; each proposal opens a timed vote in a chat
//! channel where any member can object by reacting. A vote with no
//! objections at its deadline passes. Objections extend the deadline a
//! bounded number of times before the vote fails.
//!
//! Proposal state lives in a spreadsheet with one sheet per lifecycle
//! stage. Timers live in memory and are rebuilt from the spreadsheet on
//! every start, so a restart never loses a vote.
//!
//! # Modules
//!
//! - [`domain`] - Proposal, vote context, partitions, development types
//! - [`store`] - Proposal rows on top of a [`sheetstore::Sheets`] backend
//! - [`chat`] - Chat platform trait, Discord client, in-memory platform
//! - [`vote`] - Vote engine, decision rules, recovery, submission
//! - [`notify`] - Text of every message the bot posts
//! - [`config`] - Configuration types and loading
//! - [`daemon`] - Daemon wiring and run loop
//! - [`cli`] - Command-line interface

pub mod chat;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod domain;
pub mod notify;
pub mod store;
pub mod vote;

// Re-export commonly used types
pub use chat::{ChatError, ChatMessage, ChatPlatform, DiscordClient, MemoryChat};
pub use config::Config;
pub use domain::{AllProposals, CommunityType, DevType, Partition, Proposal, ProposalKind, VoteContext};
pub use store::{ProposalStore, StoreError};
pub use vote::{
    Clock, Decision, EvaluationOutcome, ExtensionPolicy, ProposalRequest, Proposer, RecoveryStats, SystemClock,
    VoteEngine, VoteRules, decide, recover, sweep,
};
