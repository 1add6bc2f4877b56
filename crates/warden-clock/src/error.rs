// error.rs — Error types for the clock subsystem.

use thiserror::Error;

/// Errors that can occur while interpreting timestamps.
#[derive(Debug, Error)]
pub enum ClockError {
    /// The text is not an RFC 3339 / ISO 8601 timestamp.
    #[error("invalid ISO timestamp '{input}': {source}")]
    InvalidTimestamp {
        input: String,
        source: chrono::ParseError,
    },
}
