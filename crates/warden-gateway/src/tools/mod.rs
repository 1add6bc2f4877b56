// tools/mod.rs — Built-in tools and the provider that registers them.
//
//   tool                 permission          kind
//   logs.append          log.write           action
//   drafts.create        draft.write         draft
//   drafts.finalize      draft.finalize      finalize
//   customer_data.query  customer_data.read  action

pub mod customer_data;
pub mod drafts;
pub mod logs;

use std::sync::Arc;

use warden_audit::ActionLogger;
use warden_clock::Clock;
use warden_connectors::ConnectorRegistry;
use warden_policy::{CapabilityRegistry, PolicyEngine};

use crate::router::{ToolKind, ToolProvider, ToolRouter};

pub use customer_data::CustomerDataQueryTool;
pub use drafts::{Draft, DraftStatus, DraftStore, DraftsCreateTool, DraftsFinalizeTool};
pub use logs::LogsAppendTool;

/// Registers every built-in tool.
pub struct BuiltinTools {
    pub policy: Arc<PolicyEngine>,
    pub capabilities: Arc<CapabilityRegistry>,
    pub connectors: Arc<ConnectorRegistry>,
    pub drafts: Arc<DraftStore>,
    pub logger: Arc<dyn ActionLogger>,
    pub clock: Arc<dyn Clock>,
}

impl ToolProvider for BuiltinTools {
    fn name(&self) -> &str {
        "builtin"
    }

    fn register(&self, router: &mut ToolRouter) {
        router.register(
            "logs.append",
            "log.write",
            ToolKind::Action,
            Arc::new(LogsAppendTool::new(self.logger.clone(), self.clock.clone())),
        );
        router.register(
            "drafts.create",
            "draft.write",
            ToolKind::Draft,
            Arc::new(DraftsCreateTool::new(self.drafts.clone(), self.clock.clone())),
        );
        router.register(
            "drafts.finalize",
            "draft.finalize",
            ToolKind::Finalize,
            Arc::new(DraftsFinalizeTool::new(self.drafts.clone(), self.clock.clone())),
        );
        router.register(
            "customer_data.query",
            "customer_data.read",
            ToolKind::Action,
            Arc::new(CustomerDataQueryTool::new(
                self.policy.clone(),
                self.capabilities.clone(),
                self.connectors.clone(),
                self.logger.clone(),
                self.clock.clone(),
            )),
        );
    }
}
