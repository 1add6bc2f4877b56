// service.rs — ReviewService: approve, reject and cancel review requests.
//
// Every resolution follows the same sequence:
//   1. load the request (NotFound)
//   2. policy check (review.approve / review.reject, scoped to the review's
//      tenant) and reviewer roles
//   3. compare-and-set from Pending; losing the race → AlreadyResolved
//   4. append the audit entry; on failure reopen the request and return
//      the audit error
// The audit entry is mandatory. A resolution without one never stands.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use uuid::Uuid;

use warden_audit::entry::actions;
use warden_audit::{ActionLogger, AuditLogEntry};
use warden_clock::Clock;
use warden_policy::{PolicyContext, PolicyEngine};

use crate::error::ReviewError;
use crate::request::{ReviewRequest, ReviewStatus, ReviewTransition};
use crate::store::ReviewStore;
use crate::token;

/// The outcome of an approval. `commit_token` is shown once and never stored.
#[derive(Debug, Clone)]
pub struct Approval {
    pub review: ReviewRequest,
    pub commit_token: String,
}

pub struct ReviewService {
    store: Arc<dyn ReviewStore>,
    policy: Arc<PolicyEngine>,
    logger: Arc<dyn ActionLogger>,
    clock: Arc<dyn Clock>,
}

impl ReviewService {
    pub fn new(
        store: Arc<dyn ReviewStore>,
        policy: Arc<PolicyEngine>,
        logger: Arc<dyn ActionLogger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            policy,
            logger,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<dyn ReviewStore> {
        &self.store
    }

    /// Approve a pending request and issue its commit token.
    pub fn approve(
        &self,
        review_id: Uuid,
        reviewer: &PolicyContext,
        note: Option<&str>,
    ) -> Result<Approval, ReviewError> {
        let review = self.load_for_reviewer(review_id, reviewer, "review.approve")?;
        let commit_token = token::generate();
        let transition = ReviewTransition::resolve(
            ReviewStatus::Approved,
            &reviewer.user_id,
            self.clock.now(),
            note,
        )
        .with_token_hash(token::hash(&commit_token));

        let review = self.resolve(&review, reviewer, transition, actions::REVIEW_APPROVED)?;
        tracing::info!(review_id = %review_id, reviewer = %reviewer.user_id, "review approved");
        Ok(Approval {
            review,
            commit_token,
        })
    }

    /// Reject a pending request.
    pub fn reject(
        &self,
        review_id: Uuid,
        reviewer: &PolicyContext,
        note: Option<&str>,
    ) -> Result<ReviewRequest, ReviewError> {
        let review = self.load_for_reviewer(review_id, reviewer, "review.reject")?;
        let transition = ReviewTransition::resolve(
            ReviewStatus::Rejected,
            &reviewer.user_id,
            self.clock.now(),
            note,
        );
        let review = self.resolve(&review, reviewer, transition, actions::REVIEW_REJECTED)?;
        tracing::info!(review_id = %review_id, reviewer = %reviewer.user_id, "review rejected");
        Ok(review)
    }

    /// Withdraw a pending request. Only the requesting user or an admin may.
    pub fn cancel(
        &self,
        review_id: Uuid,
        actor: &PolicyContext,
        note: Option<&str>,
    ) -> Result<ReviewRequest, ReviewError> {
        let review = self.load(review_id)?;
        self.policy
            .authorize(actor, "review.cancel", &review_params(&review))?;
        let is_requester = review.user_id.as_deref() == Some(actor.user_id.as_str());
        if !is_requester && !actor.has_role("admin") {
            return Err(ReviewError::CancelNotPermitted {
                review_id,
                user_id: actor.user_id.clone(),
            });
        }
        ensure_pending(&review)?;
        let transition = ReviewTransition::resolve(
            ReviewStatus::Cancelled,
            &actor.user_id,
            self.clock.now(),
            note,
        );
        self.resolve(&review, actor, transition, actions::REVIEW_CANCELLED)
    }

    fn load(&self, review_id: Uuid) -> Result<ReviewRequest, ReviewError> {
        self.store
            .get(review_id)?
            .ok_or(ReviewError::NotFound(review_id))
    }

    fn load_for_reviewer(
        &self,
        review_id: Uuid,
        reviewer: &PolicyContext,
        operation: &str,
    ) -> Result<ReviewRequest, ReviewError> {
        let review = self.load(review_id)?;

        self.policy
            .authorize(reviewer, operation, &review_params(&review))?;

        let role_ok = reviewer.has_role("admin")
            || review.reviewer_roles.is_empty()
            || review.reviewer_roles.iter().any(|r| reviewer.has_role(r));
        if !role_ok {
            return Err(ReviewError::NotAReviewer {
                review_id,
                user_id: reviewer.user_id.clone(),
                required: review.reviewer_roles.clone(),
            });
        }

        ensure_pending(&review)?;
        Ok(review)
    }

    fn resolve(
        &self,
        review: &ReviewRequest,
        actor: &PolicyContext,
        transition: ReviewTransition,
        action: &str,
    ) -> Result<ReviewRequest, ReviewError> {
        let review_id = review.review_id;
        let to = transition.to;
        transition.validate(review_id, ReviewStatus::Pending)?;

        if !self
            .store
            .compare_and_set(review_id, ReviewStatus::Pending, transition.clone())?
        {
            let status = self.load(review_id)?.status;
            tracing::info!(review_id = %review_id, %status, "lost resolution race");
            return Err(ReviewError::AlreadyResolved { review_id, status });
        }

        let entry = AuditLogEntry::new(&review.agent_id, &actor.user_id, action, self.clock.now())
            .with_input(json!({
                "reviewId": review_id,
                "permission": review.permission,
            }))
            .with_output(json!({
                "status": to,
                "note": transition.note,
            }))
            .with_tenant_opt(review.tenant_id.as_deref())
            .with_project_opt(review.project_id.as_deref());

        if let Err(e) = self.logger.append(entry) {
            tracing::warn!(review_id = %review_id, error = %e, "audit append failed, reopening review");
            match self
                .store
                .compare_and_set(review_id, to, ReviewTransition::reopen())
            {
                Ok(true) => {}
                Ok(false) => tracing::error!(review_id = %review_id, "review moved before it could be reopened"),
                Err(revert) => tracing::error!(review_id = %review_id, error = %revert, "failed to reopen review"),
            }
            return Err(ReviewError::Audit(e));
        }

        self.load(review_id)
    }
}

/// Policy parameters for acting on a review. The review's tenant is passed
/// as `clientId`, so a caller from another tenant is denied.
fn review_params(review: &ReviewRequest) -> Map<String, Value> {
    let mut params = Map::new();
    params.insert(
        "reviewId".to_string(),
        Value::String(review.review_id.to_string()),
    );
    if let Some(tenant) = review.tenant_id.as_deref() {
        params.insert("clientId".to_string(), Value::String(tenant.to_string()));
    }
    params
}

fn ensure_pending(review: &ReviewRequest) -> Result<(), ReviewError> {
    if review.status.is_resolved() {
        return Err(ReviewError::AlreadyResolved {
            review_id: review.review_id,
            status: review.status,
        });
    }
    Ok(())
}
