// router.rs — ToolRouter: profile-checked dispatch to registered tools.
//
// Each tool is registered once at startup with the permission it requires
// and its kind. `execute()` checks, in order:
//   1. the agent profile lists the tool          (else ToolNotAllowed)
//   2. a handler is registered under that name   (else UnknownTool)
//   3. the profile grants the tool's permission  (else PermissionNotGranted)
// and only then calls the handler. All three failures are fatal for the run.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use warden_policy::{PolicyContext, PolicyError, PolicyErrorCode};

use crate::error::RouterError;
use crate::profile::AgentProfile;

/// What running a tool means for the review gate.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// An ordinary side effect.
    #[default]
    Action,
    /// Produces a draft that can still be revised.
    Draft,
    /// Makes something final. Gated under `draft_only` review.
    Finalize,
}

/// One step of an intended action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub input: Value,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, input: Value) -> Self {
        Self {
            tool: tool.into(),
            input,
        }
    }
}

/// Why a tool call failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolFailure {
    pub message: String,
    /// Set when the failure came from the policy engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<PolicyErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ToolFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            remediation: None,
        }
    }
}

impl From<&PolicyError> for ToolFailure {
    fn from(e: &PolicyError) -> Self {
        Self {
            message: e.to_string(),
            code: Some(e.code()),
            remediation: Some(e.remediation().to_string()),
        }
    }
}

/// What a handler returns. Expected failures are values, never panics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolFailure>,
}

impl ToolResult {
    pub fn success(output: Value) -> Self {
        Self {
            ok: true,
            output: Some(output),
            error: None,
        }
    }

    pub fn failure(error: ToolFailure) -> Self {
        Self {
            ok: false,
            output: None,
            error: Some(error),
        }
    }

    /// The policy code, if this failure came from the policy engine.
    pub fn policy_code(&self) -> Option<PolicyErrorCode> {
        self.error.as_ref().and_then(|e| e.code)
    }
}

/// A tool implementation.
pub trait ToolHandler: Send + Sync {
    fn call(&self, context: &PolicyContext, input: &Value) -> ToolResult;

    /// Undo a successful call. Tools without side effects keep the default.
    fn compensate(
        &self,
        _context: &PolicyContext,
        _input: &Value,
        _output: Option<&Value>,
    ) -> Result<(), ToolFailure> {
        Ok(())
    }
}

/// An optional bundle of tools, registered explicitly at startup.
pub trait ToolProvider {
    fn name(&self) -> &str;
    fn register(&self, router: &mut ToolRouter);
}

struct RegisteredTool {
    permission: String,
    kind: ToolKind,
    handler: Arc<dyn ToolHandler>,
}

#[derive(Default)]
pub struct ToolRouter {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a tool.
    pub fn register(
        &mut self,
        tool: impl Into<String>,
        permission: impl Into<String>,
        kind: ToolKind,
        handler: Arc<dyn ToolHandler>,
    ) {
        let tool = tool.into();
        let permission = permission.into();
        tracing::debug!(tool = %tool, permission = %permission, ?kind, "tool registered");
        self.tools.insert(
            tool,
            RegisteredTool {
                permission,
                kind,
                handler,
            },
        );
    }

    pub fn register_provider(&mut self, provider: &dyn ToolProvider) {
        tracing::debug!(provider = provider.name(), "registering tool provider");
        provider.register(self);
    }

    pub fn kind_of(&self, tool: &str) -> Option<ToolKind> {
        self.tools.get(tool).map(|t| t.kind)
    }

    pub fn permission_of(&self, tool: &str) -> Option<&str> {
        self.tools.get(tool).map(|t| t.permission.as_str())
    }

    /// Registered tool names, sorted.
    pub fn tools(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn execute(
        &self,
        profile: &AgentProfile,
        context: &PolicyContext,
        call: &ToolCall,
    ) -> Result<ToolResult, RouterError> {
        if !profile.allows_tool(&call.tool) {
            return Err(RouterError::ToolNotAllowed {
                agent_id: profile.id.clone(),
                tool: call.tool.clone(),
            });
        }
        let registered = self
            .tools
            .get(&call.tool)
            .ok_or_else(|| RouterError::UnknownTool {
                tool: call.tool.clone(),
            })?;
        if !profile.has_permission(&registered.permission) {
            return Err(RouterError::PermissionNotGranted {
                agent_id: profile.id.clone(),
                tool: call.tool.clone(),
                permission: registered.permission.clone(),
            });
        }

        let result = registered.handler.call(context, &call.input);
        if !result.ok {
            tracing::info!(tool = %call.tool, agent = %profile.id, error = ?result.error, "tool call failed");
        }
        Ok(result)
    }

    /// Roll back a successful call.
    pub fn compensate(
        &self,
        context: &PolicyContext,
        call: &ToolCall,
        result: &ToolResult,
    ) -> Result<(), RouterError> {
        let registered = self
            .tools
            .get(&call.tool)
            .ok_or_else(|| RouterError::UnknownTool {
                tool: call.tool.clone(),
            })?;
        registered
            .handler
            .compensate(context, &call.input, result.output.as_ref())
            .map_err(|e| RouterError::CompensationFailed {
                tool: call.tool.clone(),
                message: e.message,
            })
    }
}
