// logs.rs — `logs.append`: write a free-form agent note to the audit log.

use std::sync::Arc;

use serde_json::{json, Value};

use warden_audit::{ActionLogger, AuditLogEntry};
use warden_clock::Clock;
use warden_policy::PolicyContext;

use crate::router::{ToolFailure, ToolHandler, ToolResult};

/// Audit action written by this tool.
pub const AGENT_LOG: &str = "agent.log";

pub struct LogsAppendTool {
    logger: Arc<dyn ActionLogger>,
    clock: Arc<dyn Clock>,
}

impl LogsAppendTool {
    pub fn new(logger: Arc<dyn ActionLogger>, clock: Arc<dyn Clock>) -> Self {
        Self { logger, clock }
    }
}

impl ToolHandler for LogsAppendTool {
    fn call(&self, context: &PolicyContext, input: &Value) -> ToolResult {
        let Some(message) = input.get("message").and_then(Value::as_str) else {
            return ToolResult::failure(ToolFailure::new("'message' must be a string"));
        };
        let level = input.get("level").and_then(Value::as_str).unwrap_or("info");

        let entry = AuditLogEntry::new(
            context.agent_id.as_deref().unwrap_or_default(),
            &context.user_id,
            AGENT_LOG,
            self.clock.now(),
        )
        .with_input(json!({ "message": message, "level": level }))
        .with_tenant_opt(context.client_id.as_deref())
        .with_project_opt(context.project_id.as_deref());

        match self.logger.append(entry) {
            Ok(()) => ToolResult::success(json!({ "logged": true })),
            Err(e) => ToolResult::failure(ToolFailure::new(format!("log write failed: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use warden_audit::MemoryActionLogger;
    use warden_clock::ManualClock;

    fn tool(logger: Arc<MemoryActionLogger>) -> LogsAppendTool {
        LogsAppendTool::new(
            logger,
            Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())),
        )
    }

    #[test]
    fn appends_message() {
        let logger = Arc::new(MemoryActionLogger::new());
        let ctx = PolicyContext::new("u-1").with_agent("agent-1").with_client("client-a");
        let result = tool(logger.clone()).call(&ctx, &json!({"message": "hello"}));
        assert!(result.ok);

        let entries = logger.entries_for(AGENT_LOG);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].agent_id, "agent-1");
        assert_eq!(entries[0].input["level"], "info");
        assert_eq!(entries[0].tenant_id.as_deref(), Some("client-a"));
    }

    #[test]
    fn missing_message_fails_without_logging() {
        let logger = Arc::new(MemoryActionLogger::new());
        let result = tool(logger.clone()).call(&PolicyContext::new("u-1"), &json!({}));
        assert!(!result.ok);
        assert!(logger.entries().is_empty());
    }

    #[test]
    fn logger_failure_becomes_tool_failure() {
        let logger = Arc::new(MemoryActionLogger::new());
        logger.fail_on(AGENT_LOG);
        let result = tool(logger).call(&PolicyContext::new("u-1"), &json!({"message": "x"}));
        assert!(!result.ok);
        assert!(result.policy_code().is_none());
    }
}
