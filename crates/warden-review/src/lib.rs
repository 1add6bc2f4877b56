//! # warden-review
//!
//! The human-in-the-loop checkpoint for gated agent actions.
//!
//! When an action needs review, the orchestrator records a [`ReviewRequest`]
//! holding the exact payload the agent intends to run. A reviewer approves or
//! rejects it through the [`ReviewService`]; approval issues a single-use
//! commit token, and only its SHA-256 hash is stored. The agent later
//! presents the raw token to commit the approved payload.
//!
//! ## Key components
//!
//! - [`ReviewRequest`] / [`ReviewStatus`]: the record and its lifecycle
//!   (Pending → Approved | Rejected | Cancelled, exactly once)
//! - [`ReviewStore`]: persistence with compare-and-set status updates;
//!   [`MemoryReviewStore`] and [`JsonFileReviewStore`] implement it
//! - [`ReviewService`]: approve / reject / cancel with policy checks and a
//!   mandatory audit entry per resolution
//! - [`token`]: commit token generation and hashing

pub mod error;
pub mod file_store;
pub mod request;
pub mod service;
pub mod store;
pub mod token;

pub use error::ReviewError;
pub use file_store::JsonFileReviewStore;
pub use request::{ReviewRequest, ReviewStatus, ReviewTransition};
pub use service::{Approval, ReviewService};
pub use store::{CommitLookup, CommitRejection, MemoryReviewStore, ReviewStore};
