// request.rs — ReviewRequest: one gated action awaiting a human decision.
//
// The lifecycle:
//   Pending → Approved | Rejected | Cancelled
// A request leaves Pending exactly once. Approval also attaches the hash of
// a freshly issued commit token; the token itself is consumed at most once.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ReviewError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewStatus::Pending => write!(f, "pending"),
            ReviewStatus::Approved => write!(f, "approved"),
            ReviewStatus::Rejected => write!(f, "rejected"),
            ReviewStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReviewStatus::Pending),
            "approved" => Ok(ReviewStatus::Approved),
            "rejected" => Ok(ReviewStatus::Rejected),
            "cancelled" => Ok(ReviewStatus::Cancelled),
            other => Err(format!("unknown review status '{}'", other)),
        }
    }
}

impl ReviewStatus {
    /// Only Pending has outgoing edges.
    pub fn can_transition_to(&self, next: ReviewStatus) -> bool {
        matches!(
            (self, next),
            (ReviewStatus::Pending, ReviewStatus::Approved)
                | (ReviewStatus::Pending, ReviewStatus::Rejected)
                | (ReviewStatus::Pending, ReviewStatus::Cancelled)
        )
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, ReviewStatus::Pending)
    }
}

/// A review request record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewRequest {
    pub review_id: Uuid,
    pub agent_id: String,
    /// The permission the gated action requested.
    pub permission: String,
    /// The intended action exactly as the agent submitted it.
    pub payload: serde_json::Value,
    /// Roles allowed to resolve this request. Empty means any reviewer.
    #[serde(default)]
    pub reviewer_roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// The user the agent acted for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub status: ReviewStatus,
    /// SHA-256 of the commit token, set on approval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_token_hash: Option<String>,
    #[serde(default)]
    pub token_used: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ReviewRequest {
    /// Create a new request in the Pending state.
    pub fn new(
        agent_id: impl Into<String>,
        permission: impl Into<String>,
        payload: serde_json::Value,
        reviewer_roles: Vec<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            review_id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            permission: permission.into(),
            payload,
            reviewer_roles,
            created_at,
            user_id: None,
            tenant_id: None,
            project_id: None,
            status: ReviewStatus::Pending,
            commit_token_hash: None,
            token_used: false,
            resolved_at: None,
            resolved_by: None,
            note: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_tenant_opt(mut self, tenant_id: Option<&str>) -> Self {
        self.tenant_id = tenant_id.map(str::to_string);
        self
    }

    pub fn with_project_opt(mut self, project_id: Option<&str>) -> Self {
        self.project_id = project_id.map(str::to_string);
        self
    }

    /// Apply `transition` if the current status is `expected`.
    ///
    /// Returns false, leaving the record untouched, when the status moved.
    pub(crate) fn apply(&mut self, expected: ReviewStatus, transition: &ReviewTransition) -> bool {
        if self.status != expected {
            return false;
        }
        self.status = transition.to;
        self.resolved_at = transition.resolved_at;
        self.resolved_by = transition.resolved_by.clone();
        self.note = transition.note.clone();
        self.commit_token_hash = transition.commit_token_hash.clone();
        true
    }
}

/// The new state a compare-and-set writes.
///
/// Every field is written, so a transition back to Pending (used to undo a
/// resolution whose audit entry could not be stored) clears the resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewTransition {
    pub to: ReviewStatus,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub note: Option<String>,
    pub commit_token_hash: Option<String>,
}

impl ReviewTransition {
    /// A resolution by `user_id` at `at`.
    pub fn resolve(to: ReviewStatus, user_id: &str, at: DateTime<Utc>, note: Option<&str>) -> Self {
        Self {
            to,
            resolved_at: Some(at),
            resolved_by: Some(user_id.to_string()),
            note: note.map(str::to_string),
            commit_token_hash: None,
        }
    }

    pub fn with_token_hash(mut self, hash: String) -> Self {
        self.commit_token_hash = Some(hash);
        self
    }

    /// Undo a resolution.
    pub fn reopen() -> Self {
        Self {
            to: ReviewStatus::Pending,
            resolved_at: None,
            resolved_by: None,
            note: None,
            commit_token_hash: None,
        }
    }

    /// Reject transitions the lifecycle does not allow.
    pub fn validate(&self, review_id: Uuid, from: ReviewStatus) -> Result<(), ReviewError> {
        if from.can_transition_to(self.to) {
            Ok(())
        } else {
            Err(ReviewError::InvalidTransition {
                review_id,
                from,
                to: self.to,
            })
        }
    }
}
