//! Vote lifecycle
//!
//! - [`VoteEngine`] arms one timer per proposal and evaluates it at the deadline
//! - [`decide`] holds the pure pass / extend / fail rules
//! - [`recover`] and [`sweep`] re-arm in-flight votes from the store
//! - [`Proposer`] runs the submission flow

mod clock;
mod decision;
mod engine;
mod propose;
mod recovery;
mod timers;

pub use clock::{Clock, SystemClock, TokioClock};
pub use decision::{
    DEFAULT_EXTENSION_POLICY, DEFAULT_MAX_RENEWALS, DEFAULT_OBJECTION_EMOJI, Decision, ExtensionPolicy, VoteRules,
    decide,
};
pub use engine::{EvaluationOutcome, VoteEngine};
pub use propose::{ProposalRequest, ProposeError, Proposer};
pub use recovery::{RecoveryStats, recover, sweep};
pub use timers::{ArmOutcome, TimerTable};
