// error.rs — Error types for the policy subsystem.
//
// Every PolicyError maps to a stable PolicyErrorCode. Codes are what callers
// branch on and what lands in `policy.violation` audit entries; messages are
// for humans.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable, machine-readable policy failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyErrorCode {
    RoleRequired,
    PermissionDenied,
    CapabilityMissing,
    ClientIdMismatch,
    CrossTenantDenied,
    ConstraintViolation,
    SanitizationFailed,
    RedactionFailed,
    OperationNotAllowed,
    ConsentMissing,
}

impl PolicyErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyErrorCode::RoleRequired => "ROLE_REQUIRED",
            PolicyErrorCode::PermissionDenied => "PERMISSION_DENIED",
            PolicyErrorCode::CapabilityMissing => "CAPABILITY_MISSING",
            PolicyErrorCode::ClientIdMismatch => "CLIENT_ID_MISMATCH",
            PolicyErrorCode::CrossTenantDenied => "CROSS_TENANT_DENIED",
            PolicyErrorCode::ConstraintViolation => "CONSTRAINT_VIOLATION",
            PolicyErrorCode::SanitizationFailed => "SANITIZATION_FAILED",
            PolicyErrorCode::RedactionFailed => "REDACTION_FAILED",
            PolicyErrorCode::OperationNotAllowed => "OPERATION_NOT_ALLOWED",
            PolicyErrorCode::ConsentMissing => "CONSENT_MISSING",
        }
    }

    /// What the caller should do about it.
    pub fn remediation(&self) -> &'static str {
        match self {
            PolicyErrorCode::RoleRequired => {
                "Ask an administrator to grant a reviewer or admin role, or route the request to someone who holds one."
            }
            PolicyErrorCode::PermissionDenied => {
                "Request the missing permission for this user or agent before retrying."
            }
            PolicyErrorCode::CapabilityMissing => {
                "Register the operation and its source in the tenant's capability map."
            }
            PolicyErrorCode::ClientIdMismatch => {
                "Run the request under a client (tenant) context; customer data is always tenant-scoped."
            }
            PolicyErrorCode::CrossTenantDenied => {
                "Remove the foreign clientId parameter; requests may only address the caller's own tenant."
            }
            PolicyErrorCode::ConstraintViolation => {
                "Request only fields and limits permitted by the capability map for this operation."
            }
            PolicyErrorCode::SanitizationFailed => {
                "Send structured parameters only; raw query-language input is never accepted."
            }
            PolicyErrorCode::RedactionFailed => {
                "Check the connector: result rows must be JSON objects."
            }
            PolicyErrorCode::OperationNotAllowed => {
                "Use an operation enabled for this tenant and license tier."
            }
            PolicyErrorCode::ConsentMissing => {
                "Record the client's consent for this data scope before querying it."
            }
        }
    }
}

impl fmt::Display for PolicyErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A governed operation was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// The caller lacks every role that may perform the operation.
    #[error("operation '{operation}' requires one of the roles {required:?}")]
    RoleRequired {
        operation: String,
        required: Vec<String>,
    },

    /// The caller lacks the permission the operation requires.
    #[error("operation '{operation}' requires permission '{permission}'")]
    PermissionDenied {
        operation: String,
        permission: String,
    },

    /// The tenant has no capability (or no source mapping) for the operation.
    #[error("tenant '{tenant}' has no capability for '{operation}': {detail}")]
    CapabilityMissing {
        tenant: String,
        operation: String,
        detail: String,
    },

    /// The context carries no usable client id for a tenant-scoped operation.
    #[error("operation '{operation}': {detail}")]
    ClientIdMismatch { operation: String, detail: String },

    /// Parameters address a different tenant than the caller's context.
    #[error(
        "operation '{operation}' denied: context client '{context_client}' cannot access client '{requested_client}'"
    )]
    CrossTenantDenied {
        operation: String,
        context_client: String,
        requested_client: String,
    },

    /// Parameters exceed what the capability map permits.
    #[error("constraint violation on '{operation}': {detail}")]
    ConstraintViolation { operation: String, detail: String },

    /// Parameters contain raw query-language input.
    #[error("sanitization failed on '{operation}': {detail}")]
    SanitizationFailed { operation: String, detail: String },

    /// Result data could not be redacted.
    #[error("redaction failed on '{operation}': {detail}")]
    RedactionFailed { operation: String, detail: String },

    /// The operation is not enabled for this tenant or license.
    #[error("operation '{operation}' not allowed: {detail}")]
    OperationNotAllowed { operation: String, detail: String },

    /// The client has not consented to processing in this scope.
    #[error("client '{client_id}' has not consented to '{scope}'")]
    ConsentMissing { client_id: String, scope: String },
}

impl PolicyError {
    pub fn code(&self) -> PolicyErrorCode {
        match self {
            PolicyError::RoleRequired { .. } => PolicyErrorCode::RoleRequired,
            PolicyError::PermissionDenied { .. } => PolicyErrorCode::PermissionDenied,
            PolicyError::CapabilityMissing { .. } => PolicyErrorCode::CapabilityMissing,
            PolicyError::ClientIdMismatch { .. } => PolicyErrorCode::ClientIdMismatch,
            PolicyError::CrossTenantDenied { .. } => PolicyErrorCode::CrossTenantDenied,
            PolicyError::ConstraintViolation { .. } => PolicyErrorCode::ConstraintViolation,
            PolicyError::SanitizationFailed { .. } => PolicyErrorCode::SanitizationFailed,
            PolicyError::RedactionFailed { .. } => PolicyErrorCode::RedactionFailed,
            PolicyError::OperationNotAllowed { .. } => PolicyErrorCode::OperationNotAllowed,
            PolicyError::ConsentMissing { .. } => PolicyErrorCode::ConsentMissing,
        }
    }

    pub fn remediation(&self) -> &'static str {
        self.code().remediation()
    }

    /// `{code, message, remediation}` for audit entries and tool results.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code().as_str(),
            "message": self.to_string(),
            "remediation": self.remediation(),
        })
    }
}

/// Errors loading a capability registry from disk.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read capability file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid capability YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
