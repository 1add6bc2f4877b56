// engine.rs — Policy evaluation engine.
//
// `authorize()` walks a fixed decision tree. A `clientId` parameter that
// differs from the context's client is denied first, whatever the operation.
// After that, rule families are independent; each one that applies to the
// operation must pass:
//
// 1. review.approve / review.reject → caller holds `reviewer` or `admin`
// 2. customer_data.*                → `customer_data.read` permission,
//                                     a client context, recorded consent
// 3. phase.*                        → `phase.update` permission
// 4. premium.*                      → a paid license tier
//
// A passing decision carries `decision_hash`, the SHA-256 of
// {operation, userId, clientId, projectId}. Time is not an input, so the
// same request always hashes the same way and decisions can be replayed.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use warden_audit::hasher;
use warden_clock::Clock;

use crate::capability::CapabilityMap;
use crate::context::{ConsentStore, PermissionResolver, PolicyContext};
use crate::error::PolicyError;
use crate::redact::{redact_rows, RedactedResult};
use crate::sanitize::{sanitize_params, SanitizedParams};

/// Operations that resolve a pending review.
const REVIEW_OPERATIONS: &[&str] = &["review.approve", "review.reject"];

/// Roles allowed to resolve reviews.
const REVIEWER_ROLES: &[&str] = &["reviewer", "admin"];

const CUSTOMER_DATA_PREFIX: &str = "customer_data.";
const CUSTOMER_DATA_PERMISSION: &str = "customer_data.read";
const CUSTOMER_DATA_CONSENT_SCOPE: &str = "customer_data";

const PHASE_PREFIX: &str = "phase.";
const PHASE_PERMISSION: &str = "phase.update";

const PREMIUM_PREFIX: &str = "premium.";

/// License tier of the deployment; gates `premium.*` operations.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LicenseTier {
    #[default]
    Free,
    Pro,
    Enterprise,
}

impl LicenseTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseTier::Free => "free",
            LicenseTier::Pro => "pro",
            LicenseTier::Enterprise => "enterprise",
        }
    }
}

/// A successful authorization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub operation: String,
    /// The identity the decision was made for.
    pub context: PolicyContext,
    /// Conditions downstream code must keep honouring (e.g. the tenant).
    pub constraints: BTreeMap<String, Value>,
    pub timestamp: DateTime<Utc>,
    pub decision_hash: String,
}

/// The policy engine.
///
/// Role/permission resolution and consent are external; the engine only
/// holds handles to them. Construct once at startup and share.
pub struct PolicyEngine {
    resolver: Arc<dyn PermissionResolver>,
    consent: Arc<dyn ConsentStore>,
    clock: Arc<dyn Clock>,
    license: LicenseTier,
}

impl PolicyEngine {
    pub fn new(
        resolver: Arc<dyn PermissionResolver>,
        consent: Arc<dyn ConsentStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            resolver,
            consent,
            clock,
            license: LicenseTier::default(),
        }
    }

    /// Set the license tier and return self.
    pub fn with_license(mut self, license: LicenseTier) -> Self {
        self.license = license;
        self
    }

    pub fn license(&self) -> LicenseTier {
        self.license
    }

    /// Build a context for a user from the external permission resolver.
    pub fn resolve_context(
        &self,
        user_id: &str,
        client_id: Option<&str>,
        project_id: Option<&str>,
        agent_id: Option<&str>,
    ) -> PolicyContext {
        let identity = self.resolver.resolve(user_id, client_id);
        PolicyContext {
            user_id: user_id.to_string(),
            client_id: client_id.map(str::to_string),
            project_id: project_id.map(str::to_string),
            agent_id: agent_id.map(str::to_string),
            roles: identity.roles,
            permissions: identity.permissions,
        }
    }

    /// Decide whether `context` may perform `operation` with `params`.
    pub fn authorize(
        &self,
        context: &PolicyContext,
        operation: &str,
        params: &Map<String, Value>,
    ) -> Result<PolicyDecision, PolicyError> {
        let result = self.evaluate_rules(context, operation, params);
        match &result {
            Ok(_) => tracing::debug!(operation, user = %context.user_id, "policy allowed"),
            Err(e) => tracing::info!(operation, user = %context.user_id, code = %e.code(), "policy denied"),
        }
        let constraints = result?;

        Ok(PolicyDecision {
            allowed: true,
            operation: operation.to_string(),
            context: context.clone(),
            constraints,
            timestamp: self.clock.now(),
            decision_hash: Self::decision_hash(operation, context),
        })
    }

    /// Deterministic fingerprint of a decision. Never includes time.
    pub fn decision_hash(operation: &str, context: &PolicyContext) -> String {
        hasher::hash_json(&serde_json::json!({
            "operation": operation,
            "userId": context.user_id,
            "clientId": context.client_id,
            "projectId": context.project_id,
        }))
    }

    /// Validate and bound request parameters against the tenant's map.
    pub fn sanitize(
        &self,
        params: &Map<String, Value>,
        capabilities: &CapabilityMap,
        operation_id: &str,
    ) -> Result<SanitizedParams, PolicyError> {
        sanitize_params(params, capabilities, operation_id)
    }

    /// Strip denied fields, then project onto allowed fields.
    pub fn redact(
        &self,
        rows: Vec<Value>,
        capabilities: &CapabilityMap,
        operation_id: &str,
    ) -> Result<RedactedResult, PolicyError> {
        redact_rows(rows, capabilities, operation_id)
    }

    fn evaluate_rules(
        &self,
        context: &PolicyContext,
        operation: &str,
        params: &Map<String, Value>,
    ) -> Result<BTreeMap<String, Value>, PolicyError> {
        let mut constraints = BTreeMap::new();

        // Applies to every operation, ahead of the per-family rules.
        if let Some(client_id) = context.client_id.as_deref() {
            if let Some(requested) = requested_client(params) {
                if requested != client_id {
                    return Err(PolicyError::CrossTenantDenied {
                        operation: operation.to_string(),
                        context_client: client_id.to_string(),
                        requested_client: requested,
                    });
                }
            }
        }

        if REVIEW_OPERATIONS.contains(&operation)
            && !REVIEWER_ROLES.iter().any(|role| context.has_role(role))
        {
            return Err(PolicyError::RoleRequired {
                operation: operation.to_string(),
                required: REVIEWER_ROLES.iter().map(|r| r.to_string()).collect(),
            });
        }

        if operation.starts_with(CUSTOMER_DATA_PREFIX) {
            let client_id = self.check_customer_data(context, operation, params)?;
            constraints.insert("clientId".to_string(), Value::String(client_id));
        }

        if operation.starts_with(PHASE_PREFIX) && !context.has_permission(PHASE_PERMISSION) {
            return Err(PolicyError::PermissionDenied {
                operation: operation.to_string(),
                permission: PHASE_PERMISSION.to_string(),
            });
        }

        if operation.starts_with(PREMIUM_PREFIX) {
            if self.license == LicenseTier::Free {
                return Err(PolicyError::OperationNotAllowed {
                    operation: operation.to_string(),
                    detail: "premium operations require a pro or enterprise license".to_string(),
                });
            }
            constraints.insert(
                "licenseTier".to_string(),
                Value::String(self.license.as_str().to_string()),
            );
        }

        Ok(constraints)
    }

    /// Returns the tenant the operation is pinned to.
    fn check_customer_data(
        &self,
        context: &PolicyContext,
        operation: &str,
        params: &Map<String, Value>,
    ) -> Result<String, PolicyError> {
        if !context.has_permission(CUSTOMER_DATA_PERMISSION) {
            return Err(PolicyError::PermissionDenied {
                operation: operation.to_string(),
                permission: CUSTOMER_DATA_PERMISSION.to_string(),
            });
        }

        let client_id = match context.client_id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => {
                return Err(PolicyError::ClientIdMismatch {
                    operation: operation.to_string(),
                    detail: "a client id is required for customer data operations".to_string(),
                })
            }
        };

        if !self
            .consent
            .has_consent(client_id, CUSTOMER_DATA_CONSENT_SCOPE)
        {
            return Err(PolicyError::ConsentMissing {
                client_id: client_id.to_string(),
                scope: CUSTOMER_DATA_CONSENT_SCOPE.to_string(),
            });
        }

        Ok(client_id.to_string())
    }
}

/// The tenant a request's parameters address, if any.
///
/// Non-string values are rendered so `{"clientId": 42}` still compares
/// (and fails) against a string context id.
fn requested_client(params: &Map<String, Value>) -> Option<String> {
    ["clientId", "client_id"]
        .iter()
        .find_map(|key| params.get(*key))
        .filter(|value| !value.is_null())
        .map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
}
