// error.rs — Error types for the gateway.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal tool-routing failures.
///
/// These are profile violations, not tool failures: a tool that runs and
/// fails returns a `ToolResult` with `ok: false` instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    /// The agent's profile does not list the tool.
    #[error("agent '{agent_id}' may not use tool '{tool}'")]
    ToolNotAllowed { agent_id: String, tool: String },

    /// The tool is listed but its required permission is not granted.
    #[error("agent '{agent_id}' lacks permission '{permission}' required by tool '{tool}'")]
    PermissionNotGranted {
        agent_id: String,
        tool: String,
        permission: String,
    },

    /// No handler is registered under this name.
    #[error("unknown tool '{tool}'")]
    UnknownTool { tool: String },

    /// A rollback step failed.
    #[error("compensation for tool '{tool}' failed: {message}")]
    CompensationFailed { tool: String, message: String },
}

/// Errors raised while assembling the gateway from its on-disk layout.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid YAML in {path}: {source}")]
    YamlParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("capability registry error: {0}")]
    Registry(#[from] warden_policy::RegistryError),

    #[error("audit log error: {0}")]
    Audit(#[from] warden_audit::AuditError),

    #[error("review store error: {0}")]
    Review(#[from] warden_review::ReviewError),

    #[error("draft store error: {0}")]
    Draft(#[from] crate::tools::drafts::DraftError),

    #[error("agent profile not found: {0}")]
    ProfileNotFound(String),
}
