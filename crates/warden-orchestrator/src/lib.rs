//! # warden-orchestrator
//!
//! Runs an agent's intended action through governance.
//!
//! One [`Orchestrator::run`] takes a [`RunRequest`] to a terminal
//! [`RunOutcome`]: `ok`, or `blocked` with a machine-readable
//! [`BlockReason`]. On the way it checks the agent's profile, an optional
//! [`GovernanceValidator`], the review gate and, for commits, the single-use
//! token and the approved payload hash. Every step lands in the audit log.
//!
//! ## Key components
//!
//! - [`Orchestrator`]: the run pipeline
//! - [`IntendedAction`]: permission + tool calls, hashed with
//!   [`IntendedAction::payload_hash`]
//! - [`RunState`]: `started → preflighted → authorized → executing → ok`,
//!   any non-terminal state may go to `blocked`
//! - [`ActivityStore`]: last-seen times for the inactivity-gap preflight
//! - [`ScopeGlobValidator`]: allowed/locked glob scopes for workstreams

pub mod action;
pub mod activity;
pub mod error;
pub mod governance;
pub mod orchestrator;
pub mod outcome;

pub use action::{IntendedAction, ReviewCommit, RunRequest};
pub use activity::{ActivityError, ActivityStore, JsonFileActivityStore, MemoryActivityStore};
pub use error::OrchestratorError;
pub use governance::{GovernanceValidator, GovernanceVerdict, ScopeGlobValidator, Workstream};
pub use orchestrator::{run_actions, Orchestrator, DEFAULT_GAP_THRESHOLD_MINUTES};
pub use outcome::{BlockReason, CallRecord, RunOutcome, RunState};
