// customer_data.rs — `customer_data.query`: the governed read path.
//
// Input: `{"operation": "customer_data.list", "params": {...}}`.
//
// Pipeline, every step tenant-scoped:
//   authorize → capability lookup → sanitize → connector → redact → audit
//
// Policy errors become a failed ToolResult carrying the policy code, and are
// mirrored to the audit log as `policy.violation`. That mirror is a read-path
// diagnostic: if it cannot be written the caller still gets its answer.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use warden_audit::entry::actions;
use warden_audit::{ActionLogger, AuditLogEntry};
use warden_clock::Clock;
use warden_connectors::ConnectorRegistry;
use warden_policy::{CapabilityRegistry, PolicyContext, PolicyEngine, PolicyError};

use crate::router::{ToolFailure, ToolHandler, ToolResult};

pub struct CustomerDataQueryTool {
    policy: Arc<PolicyEngine>,
    capabilities: Arc<CapabilityRegistry>,
    connectors: Arc<ConnectorRegistry>,
    logger: Arc<dyn ActionLogger>,
    clock: Arc<dyn Clock>,
}

impl CustomerDataQueryTool {
    pub fn new(
        policy: Arc<PolicyEngine>,
        capabilities: Arc<CapabilityRegistry>,
        connectors: Arc<ConnectorRegistry>,
        logger: Arc<dyn ActionLogger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            policy,
            capabilities,
            connectors,
            logger,
            clock,
        }
    }

    fn entry(&self, context: &PolicyContext, action: &str) -> AuditLogEntry {
        AuditLogEntry::new(
            context.agent_id.as_deref().unwrap_or_default(),
            &context.user_id,
            action,
            self.clock.now(),
        )
        .with_tenant_opt(context.client_id.as_deref())
        .with_project_opt(context.project_id.as_deref())
    }

    /// Best-effort: a failed mirror is logged and dropped.
    fn mirror_violation(&self, context: &PolicyContext, operation: &str, error: &PolicyError) {
        let entry = self
            .entry(context, actions::POLICY_VIOLATION)
            .with_input(json!({ "operation": operation }))
            .with_output(error.to_json())
            .blocked(error.code().as_str());
        if let Err(e) = self.logger.append(entry) {
            tracing::warn!(operation, error = %e, "could not record policy violation");
        }
    }

    fn run(
        &self,
        context: &PolicyContext,
        operation: &str,
        params: &Map<String, Value>,
    ) -> Result<Result<Value, ToolFailure>, PolicyError> {
        let decision = self.policy.authorize(context, operation, params)?;

        // authorize() guarantees a client id for customer_data.* operations.
        let tenant = context.client_id.as_deref().unwrap_or_default();
        let source = self.capabilities.get_source_for_operation(tenant, operation)?;
        let map = self
            .capabilities
            .get_capabilities(tenant)
            .ok_or_else(|| PolicyError::CapabilityMissing {
                tenant: tenant.to_string(),
                operation: operation.to_string(),
                detail: "tenant has no capability map".to_string(),
            })?;

        let mut sanitized = self.policy.sanitize(params, map, operation)?;
        sanitized
            .params
            .insert("clientId".to_string(), Value::String(tenant.to_string()));

        let connector = match self.connectors.get_connector(tenant, source) {
            Ok(c) => c,
            Err(e) => return Ok(Err(ToolFailure::new(e.to_string()))),
        };
        let result = match connector.execute_read_model(operation, &sanitized.params, &sanitized.constraints) {
            Ok(r) => r,
            Err(e) => return Ok(Err(ToolFailure::new(e.to_string()))),
        };
        let latency_ms = result.execution_metrics.latency_ms;
        let redacted = self.policy.redact(result.data, map, operation)?;

        let entry = self
            .entry(context, actions::DATA_QUERY)
            .with_input(json!({
                "operation": operation,
                "params": sanitized.params,
                "constraints": sanitized.constraints,
                "decisionHash": decision.decision_hash,
            }))
            .with_output(json!({
                "rowCount": redacted.row_count,
                "fieldsReturned": redacted.fields_returned,
                "source": source,
            }));
        if let Err(e) = self.logger.append(entry) {
            tracing::warn!(operation, error = %e, "could not record data query");
        }

        Ok(Ok(json!({
            "rows": redacted.rows,
            "rowCount": redacted.row_count,
            "fieldsReturned": redacted.fields_returned,
            "decisionHash": decision.decision_hash,
            "latencyMs": latency_ms,
        })))
    }
}

impl ToolHandler for CustomerDataQueryTool {
    fn call(&self, context: &PolicyContext, input: &Value) -> ToolResult {
        let Some(operation) = input.get("operation").and_then(Value::as_str) else {
            return ToolResult::failure(ToolFailure::new("'operation' must be a string"));
        };
        let params = match input.get("params") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => return ToolResult::failure(ToolFailure::new("'params' must be an object")),
        };
        if !operation.starts_with("customer_data.") {
            return ToolResult::failure(ToolFailure::new(format!(
                "'{}' is not a customer data operation",
                operation
            )));
        }

        match self.run(context, operation, &params) {
            Ok(Ok(output)) => ToolResult::success(output),
            Ok(Err(failure)) => ToolResult::failure(failure),
            Err(policy_error) => {
                tracing::info!(operation, code = %policy_error.code(), "customer data query denied");
                self.mirror_violation(context, operation, &policy_error);
                ToolResult::failure(ToolFailure::from(&policy_error))
            }
        }
    }
}
