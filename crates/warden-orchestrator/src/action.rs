// action.rs — What an agent asks to do, and the payload hash that binds an
// approval to it.
//
// The hash covers `{permission, toolCalls}` in canonical JSON (object keys
// sorted). The `reviewCommit` envelope is excluded: the agent adds it when
// committing, after the payload was approved.

use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use warden_audit::hasher;
use warden_gateway::ToolCall;
use warden_policy::PolicyContext;

/// Proof of approval attached to a commit attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewCommit {
    pub review_id: Uuid,
    pub commit_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IntendedAction {
    pub permission: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_commit: Option<ReviewCommit>,
}

impl IntendedAction {
    pub fn new(permission: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            permission: permission.into(),
            tool_calls,
            review_commit: None,
        }
    }

    /// Attach a commit envelope and return self.
    pub fn committing(mut self, review_id: Uuid, commit_token: impl Into<String>) -> Self {
        self.review_commit = Some(ReviewCommit {
            review_id,
            commit_token: commit_token.into(),
        });
        self
    }

    /// SHA-256 over the canonical `{permission, toolCalls}` of this action.
    pub fn payload_hash(&self) -> Result<String, serde_json::Error> {
        let body = json!({
            "permission": self.permission,
            "toolCalls": serde_json::to_value(&self.tool_calls)?,
        });
        Ok(hasher::hash_json(&body))
    }
}

/// Hash of a stored review payload, computed the same way.
///
/// A payload that does not parse as an action hashes its raw canonical
/// form, which can never equal a real action's hash.
pub fn stored_payload_hash(payload: &serde_json::Value) -> String {
    match serde_json::from_value::<IntendedAction>(payload.clone()) {
        Ok(action) => action
            .payload_hash()
            .unwrap_or_else(|_| hasher::hash_json(payload)),
        Err(_) => hasher::hash_json(payload),
    }
}

/// One orchestrator invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub agent_id: String,
    pub context: PolicyContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<IntendedAction>,
    /// ISO-8601 run time; defaults to the clock's now.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl RunRequest {
    pub fn new(agent_id: impl Into<String>, context: PolicyContext) -> Self {
        Self {
            agent_id: agent_id.into(),
            context,
            action: None,
            timestamp: None,
        }
    }

    pub fn with_action(mut self, action: IntendedAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn at(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }
}
