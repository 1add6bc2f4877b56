// entry.rs — Audit log entry data model.
//
// Every governed step (run bookkeeping, block, escalation, execution
// summary, review resolution, data query) is recorded as one AuditLogEntry.
// Entries are never updated or deleted here; retention is someone else's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Action names shared by more than one crate.
pub mod actions {
    /// A governance-bypass attempt, written next to the primary block entry.
    pub const ESCALATION: &str = "escalation";
    /// A policy error caught at a tool boundary (best-effort mirror).
    pub const POLICY_VIOLATION: &str = "policy.violation";
    /// A successful customer-data read.
    pub const DATA_QUERY: &str = "data.query";
    /// A review request was approved and a commit token issued.
    pub const REVIEW_APPROVED: &str = "review.approved";
    /// A review request was rejected.
    pub const REVIEW_REJECTED: &str = "review.rejected";
    /// A review request was withdrawn before resolution.
    pub const REVIEW_CANCELLED: &str = "review.cancelled";
}

/// A single audit entry — one line in the JSONL audit log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditLogEntry {
    /// Unique identifier for this entry.
    pub entry_id: Uuid,

    /// When the recorded step happened (from the caller's clock).
    pub timestamp: DateTime<Utc>,

    /// Which agent the step belongs to.
    pub agent_id: String,

    /// The human (or service) user on whose behalf the agent acted.
    pub user_id: String,

    /// Dotted action name, e.g. `agent.run` or `agent.blocked.payload_tamper`.
    pub action: String,

    /// Structured input of the step.
    #[serde(default)]
    pub input: serde_json::Value,

    /// Structured output of the step.
    #[serde(default)]
    pub output: serde_json::Value,

    /// Whether the step ended in a block.
    #[serde(default)]
    pub blocked: bool,

    /// Machine-readable reason, set for blocks and escalations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Tenant (client) the step ran under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    /// Project the step ran under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// Hash of the previous entry in a chained log. Set by the logger.
    #[serde(default)]
    pub previous_hash: Option<String>,
}

impl AuditLogEntry {
    /// Create an entry with empty input/output and a random id.
    pub fn new(
        agent_id: impl Into<String>,
        user_id: impl Into<String>,
        action: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            timestamp,
            agent_id: agent_id.into(),
            user_id: user_id.into(),
            action: action.into(),
            input: serde_json::Value::Null,
            output: serde_json::Value::Null,
            blocked: false,
            reason: None,
            tenant_id: None,
            project_id: None,
            previous_hash: None,
        }
    }

    /// Set the structured input and return self (builder pattern).
    pub fn with_input(mut self, input: serde_json::Value) -> Self {
        self.input = input;
        self
    }

    /// Set the structured output and return self.
    pub fn with_output(mut self, output: serde_json::Value) -> Self {
        self.output = output;
        self
    }

    /// Mark the entry as a block with the given reason.
    pub fn blocked(mut self, reason: impl Into<String>) -> Self {
        self.blocked = true;
        self.reason = Some(reason.into());
        self
    }

    /// Attach a reason without marking the entry blocked.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Set the tenant id.
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Set the tenant id if one is known.
    pub fn with_tenant_opt(mut self, tenant_id: Option<&str>) -> Self {
        self.tenant_id = tenant_id.map(str::to_string);
        self
    }

    /// Set the project id if one is known.
    pub fn with_project_opt(mut self, project_id: Option<&str>) -> Self {
        self.project_id = project_id.map(str::to_string);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entry_serialization_round_trip() {
        let entry = AuditLogEntry::new("agent-1", "user-1", "agent.run", Utc::now())
            .with_input(json!({"permission": "log.write"}))
            .with_tenant("client-a");

        let json = serde_json::to_string(&entry).expect("serialize");
        let restored: AuditLogEntry = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(entry, restored);
    }

    #[test]
    fn entry_ids_are_unique() {
        let now = Utc::now();
        let e1 = AuditLogEntry::new("agent", "user", "agent.run", now);
        let e2 = AuditLogEntry::new("agent", "user", "agent.run", now);
        assert_ne!(e1.entry_id, e2.entry_id);
    }

    #[test]
    fn blocked_sets_flag_and_reason() {
        let entry = AuditLogEntry::new("a", "u", "agent.blocked.payload_tamper", Utc::now())
            .blocked("payload_tamper");
        assert!(entry.blocked);
        assert_eq!(entry.reason.as_deref(), Some("payload_tamper"));
    }

    #[test]
    fn optional_ids_omitted_when_absent() {
        let entry = AuditLogEntry::new("a", "u", "agent.run", Utc::now());
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("tenant_id"));
        assert!(!json.contains("project_id"));
        assert!(!json.contains("\"reason\""));
    }
}
