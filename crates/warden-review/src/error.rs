// error.rs — Error types for the review subsystem.

use thiserror::Error;
use uuid::Uuid;

use crate::request::ReviewStatus;

#[derive(Debug, Error)]
pub enum ReviewError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize review data.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("review request not found: {0}")]
    NotFound(Uuid),

    #[error("review request already exists: {0}")]
    AlreadyExists(Uuid),

    /// The request left `pending` before this resolution could apply.
    #[error("review {review_id} is already resolved ({status})")]
    AlreadyResolved {
        review_id: Uuid,
        status: ReviewStatus,
    },

    #[error("invalid transition from {from} to {to} for review {review_id}")]
    InvalidTransition {
        review_id: Uuid,
        from: ReviewStatus,
        to: ReviewStatus,
    },

    /// The caller lacks every reviewer role the request names.
    #[error("user '{user_id}' may not resolve review {review_id} (needs one of: {})", required.join(", "))]
    NotAReviewer {
        review_id: Uuid,
        user_id: String,
        required: Vec<String>,
    },

    /// Only the requester or an admin may cancel.
    #[error("user '{user_id}' may not cancel review {review_id}")]
    CancelNotPermitted { review_id: Uuid, user_id: String },

    #[error("review {review_id} is {status}, not approved")]
    NotApproved {
        review_id: Uuid,
        status: ReviewStatus,
    },

    #[error("commit token for review {0} was already used")]
    TokenAlreadyUsed(Uuid),

    #[error(transparent)]
    Policy(#[from] warden_policy::PolicyError),

    /// Writing the mandatory audit entry failed; the resolution was reverted.
    #[error("audit write failed: {0}")]
    Audit(#[from] warden_audit::AuditError),
}
