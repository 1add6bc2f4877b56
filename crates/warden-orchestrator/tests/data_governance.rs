// data_governance.rs — Customer-data reads through a full run: tenant
// isolation, field rules and policy failures surfacing as blocked runs.

mod common;

use chrono::Duration;
use serde_json::{json, Map, Value};

use warden_audit::entry::actions;
use warden_gateway::ToolCall;
use warden_orchestrator::{BlockReason, IntendedAction, RunOutcome, RunRequest, RunState};
use warden_policy::{PolicyContext, PolicyEngine, PolicyErrorCode};

use common::{crm_map, fixture_rows, harness, Harness};

fn analyst() -> PolicyContext {
    PolicyContext::new("u-7")
        .with_client("client-a")
        .with_permissions(["customer_data.read"])
}

fn query(h: &Harness, context: PolicyContext, params: Value) -> RunOutcome {
    let action = IntendedAction::new(
        "customer_data.read",
        vec![ToolCall::new(
            "customer_data.query",
            json!({"operation": "customer_data.list", "params": params}),
        )],
    );
    h.orchestrator
        .run(&RunRequest::new("analyst", context).with_action(action))
        .unwrap()
}

fn policy_code(outcome: &RunOutcome) -> Option<PolicyErrorCode> {
    match &outcome.reason {
        Some(BlockReason::PolicyViolation { policy_code, .. }) => Some(*policy_code),
        _ => None,
    }
}

#[test]
fn query_returns_only_tenant_rows_without_deny_fields() {
    let h = harness();
    let outcome = query(&h, analyst(), json!({}));
    assert!(outcome.is_ok(), "{:?}", outcome.reason);

    let output = outcome.calls[0].result.output.clone().unwrap();
    assert_eq!(output["rowCount"], 2);
    assert_eq!(output["fieldsReturned"], json!(["id", "name", "status"]));
    for row in output["rows"].as_array().unwrap() {
        assert!(row.get("email").is_none());
        assert!(row.get("clientId").is_none());
    }
    assert_eq!(h.connector.count(), 1);

    let audited = h.logger.entries_for(actions::DATA_QUERY);
    assert_eq!(audited.len(), 1);
    assert_eq!(audited[0].input["params"]["clientId"], "client-a");
    assert_eq!(h.logger.entries_for("agent.executed").len(), 1);
}

#[test]
fn denied_field_fails_before_connector_call() {
    let h = harness();
    let outcome = query(&h, analyst(), json!({"fields": ["id", "email"]}));
    assert_eq!(outcome.state, RunState::Blocked);
    assert_eq!(outcome.reason_code(), Some("policy_violation"));
    assert_eq!(policy_code(&outcome), Some(PolicyErrorCode::ConstraintViolation));
    assert_eq!(h.connector.count(), 0);

    assert_eq!(h.logger.entries_for(actions::POLICY_VIOLATION).len(), 1);
    let block = h.logger.entries_for("agent.blocked.policy_violation");
    assert_eq!(block.len(), 1);
    assert_eq!(block[0].input["reason"]["policy_code"], "CONSTRAINT_VIOLATION");
    assert!(h.logger.entries_for("agent.executed").is_empty());
}

#[test]
fn foreign_client_id_is_cross_tenant_denied() {
    let h = harness();
    let outcome = query(&h, analyst(), json!({"clientId": "client-b"}));
    assert_eq!(policy_code(&outcome), Some(PolicyErrorCode::CrossTenantDenied));
    assert_eq!(h.connector.count(), 0);
    let mirrored = h.logger.entries_for(actions::POLICY_VIOLATION);
    assert_eq!(mirrored[0].reason.as_deref(), Some("CROSS_TENANT_DENIED"));
}

#[test]
fn raw_sql_is_sanitization_failed() {
    let h = harness();
    let outcome = query(&h, analyst(), json!({"status": "active; DROP TABLE customers"}));
    assert_eq!(policy_code(&outcome), Some(PolicyErrorCode::SanitizationFailed));
    assert_eq!(h.connector.count(), 0);
}

#[test]
fn context_without_permission_is_permission_denied() {
    let h = harness();
    let outcome = query(&h, PolicyContext::new("u-7").with_client("client-a"), json!({}));
    assert_eq!(policy_code(&outcome), Some(PolicyErrorCode::PermissionDenied));
}

#[test]
fn context_without_client_is_client_id_mismatch() {
    let h = harness();
    let outcome = query(&h, PolicyContext::new("u-7").with_permissions(["customer_data.read"]), json!({}));
    assert_eq!(policy_code(&outcome), Some(PolicyErrorCode::ClientIdMismatch));
}

#[test]
fn policy_violation_mirror_failure_does_not_change_the_outcome() {
    let h = harness();
    h.logger.fail_on(actions::POLICY_VIOLATION);
    let outcome = query(&h, analyst(), json!({"fields": ["email"]}));
    assert_eq!(policy_code(&outcome), Some(PolicyErrorCode::ConstraintViolation));
    assert!(h.logger.entries_for(actions::POLICY_VIOLATION).is_empty());
}

#[test]
fn decision_hash_is_stable_across_time() {
    let h = harness();
    let first = h.policy.authorize(&analyst(), "customer_data.list", &Map::new()).unwrap();
    h.clock.advance(Duration::hours(30));
    let second = h.policy.authorize(&analyst(), "customer_data.list", &Map::new()).unwrap();

    assert_ne!(first.timestamp, second.timestamp);
    assert_eq!(first.decision_hash, second.decision_hash);
    assert_eq!(
        first.decision_hash,
        PolicyEngine::decision_hash("customer_data.list", &analyst())
    );

    let other_tenant = analyst().with_client("client-b");
    assert_ne!(
        first.decision_hash,
        PolicyEngine::decision_hash("customer_data.list", &other_tenant)
    );
}

#[test]
fn redact_never_returns_deny_fields() {
    let h = harness();
    let mut rows = fixture_rows();
    rows.push(json!({"id": 9, "email": "x@example.com"}));
    rows.push(json!({"email": "only@example.com"}));

    let redacted = h.policy.redact(rows, &crm_map(), "customer_data.list").unwrap();
    assert_eq!(redacted.row_count, 5);
    assert!(redacted.rows.iter().all(|r| r.get("email").is_none()));
    assert!(!redacted.fields_returned.iter().any(|f| f == "email"));
}
