//! # warden-audit
//!
//! Append-only action log for Warden.
//!
//! Every orchestrator run, block, escalation, review resolution and data
//! query is recorded as an [`AuditLogEntry`] through an [`ActionLogger`].
//! The file-backed [`JsonlActionLogger`] links entries into a SHA-256 hash
//! chain so edits to the stored log are detectable.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use warden_audit::{ActionLogger, AuditLogEntry, JsonlActionLogger};
//!
//! let logger = JsonlActionLogger::open("/tmp/warden-audit.jsonl").unwrap();
//! let entry = AuditLogEntry::new("agent-1", "user-1", "agent.run", Utc::now())
//!     .with_tenant("client-a");
//! logger.append(entry).unwrap();
//! ```

pub mod entry;
pub mod error;
pub mod hasher;
pub mod log;
pub mod logger;

pub use entry::AuditLogEntry;
pub use error::AuditError;
pub use log::JsonlActionLogger;
pub use logger::{ActionLogger, MemoryActionLogger};
