// error.rs — Fatal orchestrator errors.
//
// Anything the caller can correct and retry (review required, bad token,
// governance verdicts, policy denials inside tools) is a blocked RunOutcome,
// not an error. These variants abort the run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The requested permission is not in the agent's profile.
    #[error("agent '{agent_id}' is not granted permission '{permission}'")]
    PermissionDenied { agent_id: String, permission: String },

    #[error("no profile for agent '{0}'")]
    ProfileNotFound(String),

    /// A tool call violated the agent profile.
    #[error("tool routing failed: {0}")]
    Router(#[from] warden_gateway::RouterError),

    /// A mandatory audit append failed. Side effects were compensated.
    #[error("mandatory audit write failed: {0}")]
    Audit(#[from] warden_audit::AuditError),

    #[error("review store error: {0}")]
    Review(#[from] warden_review::ReviewError),

    #[error("invalid run timestamp: {0}")]
    Clock(#[from] warden_clock::ClockError),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("invalid run state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}
