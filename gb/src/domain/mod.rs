//! Domain types for govbot
//!
//! Core domain types: Proposal, VoteContext, Partition, ProposalKind.
//! A proposal's lifecycle stage is not a field; it is the partition (sheet)
//! holding the proposal's row.

mod dev_type;
mod kind;
mod partition;
mod proposal;

pub use dev_type::DevType;
pub use kind::{CommunityType, ProposalKind};
pub use partition::Partition;
pub use proposal::{AllProposals, Proposal, VoteContext, now_ms};
