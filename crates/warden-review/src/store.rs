// store.rs — ReviewStore trait and the in-memory implementation.
//
// Status changes go through `compare_and_set` only: the write applies when
// the stored status still equals the caller's expectation, and reports
// whether it did. Two racing approvals therefore resolve exactly once.
// Stores serialize writers with a mutex in place of a database row lock.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ReviewError;
use crate::request::{ReviewRequest, ReviewStatus, ReviewTransition};
use crate::token;

/// Persistence for review requests.
pub trait ReviewStore: Send + Sync {
    /// Insert a new request. Fails if the id already exists.
    fn create(&self, request: ReviewRequest) -> Result<(), ReviewError>;

    fn get(&self, review_id: Uuid) -> Result<Option<ReviewRequest>, ReviewError>;

    /// All requests, newest first, optionally filtered by status.
    fn list(&self, status: Option<ReviewStatus>) -> Result<Vec<ReviewRequest>, ReviewError>;

    /// Apply `transition` if the stored status equals `expected`.
    ///
    /// Returns Ok(false) when the status had already moved.
    fn compare_and_set(
        &self,
        review_id: Uuid,
        expected: ReviewStatus,
        transition: ReviewTransition,
    ) -> Result<bool, ReviewError>;

    /// Check that `token` commits an approved, unused review.
    fn get_approved_for_commit(&self, review_id: Uuid, token: &str) -> Result<CommitLookup, ReviewError>;

    /// Consume the commit token. A second call fails with TokenAlreadyUsed.
    fn mark_token_used(&self, review_id: Uuid) -> Result<(), ReviewError>;
}

/// Why a commit lookup failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommitRejection {
    NotFound,
    NotApproved,
    TokenMismatch,
    TokenUsed,
}

impl CommitRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitRejection::NotFound => "not_found",
            CommitRejection::NotApproved => "not_approved",
            CommitRejection::TokenMismatch => "token_mismatch",
            CommitRejection::TokenUsed => "token_used",
        }
    }
}

/// Result of [`ReviewStore::get_approved_for_commit`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommitLookup {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<CommitRejection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    /// Tenant the request was raised in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl CommitLookup {
    pub fn approved(request: &ReviewRequest) -> Self {
        Self {
            ok: true,
            reason: None,
            permission: Some(request.permission.clone()),
            agent_id: Some(request.agent_id.clone()),
            payload: Some(request.payload.clone()),
            tenant_id: request.tenant_id.clone(),
        }
    }

    pub fn rejected(reason: CommitRejection) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
            permission: None,
            agent_id: None,
            payload: None,
            tenant_id: None,
        }
    }

    /// Evaluate a commit attempt against a stored record.
    pub(crate) fn evaluate(request: Option<&ReviewRequest>, presented: &str) -> Self {
        let Some(request) = request else {
            return Self::rejected(CommitRejection::NotFound);
        };
        if request.status != ReviewStatus::Approved {
            return Self::rejected(CommitRejection::NotApproved);
        }
        match request.commit_token_hash.as_deref() {
            Some(stored) if token::matches(presented, stored) => {}
            _ => return Self::rejected(CommitRejection::TokenMismatch),
        }
        if request.token_used {
            return Self::rejected(CommitRejection::TokenUsed);
        }
        Self::approved(request)
    }
}

/// Consume the token on a loaded record.
pub(crate) fn consume_token(request: &mut ReviewRequest) -> Result<(), ReviewError> {
    if request.status != ReviewStatus::Approved {
        return Err(ReviewError::NotApproved {
            review_id: request.review_id,
            status: request.status,
        });
    }
    if request.token_used {
        return Err(ReviewError::TokenAlreadyUsed(request.review_id));
    }
    request.token_used = true;
    Ok(())
}

pub(crate) fn sort_and_filter(
    mut requests: Vec<ReviewRequest>,
    status: Option<ReviewStatus>,
) -> Vec<ReviewRequest> {
    if let Some(status) = status {
        requests.retain(|r| r.status == status);
    }
    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    requests
}

/// Review store held in process memory.
#[derive(Debug, Default)]
pub struct MemoryReviewStore {
    requests: Mutex<HashMap<Uuid, ReviewRequest>>,
}

impl MemoryReviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, ReviewRequest>> {
        self.requests.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ReviewStore for MemoryReviewStore {
    fn create(&self, request: ReviewRequest) -> Result<(), ReviewError> {
        let mut requests = self.lock();
        if requests.contains_key(&request.review_id) {
            return Err(ReviewError::AlreadyExists(request.review_id));
        }
        requests.insert(request.review_id, request);
        Ok(())
    }

    fn get(&self, review_id: Uuid) -> Result<Option<ReviewRequest>, ReviewError> {
        Ok(self.lock().get(&review_id).cloned())
    }

    fn list(&self, status: Option<ReviewStatus>) -> Result<Vec<ReviewRequest>, ReviewError> {
        let all = self.lock().values().cloned().collect();
        Ok(sort_and_filter(all, status))
    }

    fn compare_and_set(
        &self,
        review_id: Uuid,
        expected: ReviewStatus,
        transition: ReviewTransition,
    ) -> Result<bool, ReviewError> {
        let mut requests = self.lock();
        let request = requests
            .get_mut(&review_id)
            .ok_or(ReviewError::NotFound(review_id))?;
        Ok(request.apply(expected, &transition))
    }

    fn get_approved_for_commit(&self, review_id: Uuid, token: &str) -> Result<CommitLookup, ReviewError> {
        Ok(CommitLookup::evaluate(self.lock().get(&review_id), token))
    }

    fn mark_token_used(&self, review_id: Uuid) -> Result<(), ReviewError> {
        let mut requests = self.lock();
        let request = requests
            .get_mut(&review_id)
            .ok_or(ReviewError::NotFound(review_id))?;
        consume_token(request)
    }
}
