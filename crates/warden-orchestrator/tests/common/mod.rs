// common/mod.rs — In-memory wiring shared by the orchestrator integration
// tests: built-in tools, a manual clock and a failure-injectable logger.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use warden_audit::MemoryActionLogger;
use warden_clock::ManualClock;
use warden_connectors::{Connector, ConnectorError, ConnectorRegistry, ConnectorResult, InMemoryConnector};
use warden_gateway::tools::{BuiltinTools, DraftStore};
use warden_gateway::{AgentProfile, ReviewMode, ToolCall, ToolRouter, YamlProfileStore};
use warden_orchestrator::{IntendedAction, MemoryActivityStore, Orchestrator, RunOutcome, RunRequest};
use warden_policy::{
    CapabilityMap, CapabilityRegistry, OperationCapability, PolicyContext, PolicyEngine, QueryConstraints,
    StaticConsentStore, StaticPermissionResolver,
};
use warden_review::{MemoryReviewStore, ReviewService, ReviewStore};

/// Delegates to fixture rows and counts how often it was reached.
pub struct CountingConnector {
    inner: InMemoryConnector,
    pub calls: AtomicUsize,
}

impl CountingConnector {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Connector for CountingConnector {
    fn source_type(&self) -> &str {
        "counting"
    }

    fn execute_read_model(
        &self,
        operation_id: &str,
        params: &Map<String, Value>,
        constraints: &QueryConstraints,
    ) -> Result<ConnectorResult, ConnectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.execute_read_model(operation_id, params, constraints)
    }
}

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub logger: Arc<MemoryActionLogger>,
    pub reviews: Arc<MemoryReviewStore>,
    pub drafts: Arc<DraftStore>,
    pub policy: Arc<PolicyEngine>,
    pub connector: Arc<CountingConnector>,
    pub clock: Arc<ManualClock>,
}

pub fn profiles() -> YamlProfileStore {
    let mut profiles = YamlProfileStore::new();
    profiles.insert(
        AgentProfile::new("drafter")
            .with_tools(["drafts.create", "drafts.finalize", "logs.append"])
            .with_permissions(["draft.write", "draft.finalize", "log.write"])
            .with_review(ReviewMode::DraftOnly, &["reviewer"]),
    );
    profiles.insert(
        AgentProfile::new("publisher")
            .with_tools(["drafts.finalize"])
            .with_permissions(["draft.finalize"])
            .with_review(ReviewMode::Required, &["reviewer"]),
    );
    profiles.insert(
        AgentProfile::new("notifier")
            .with_tools(["logs.append"])
            .with_permissions(["log.write"])
            .with_review(ReviewMode::Required, &["reviewer"]),
    );
    profiles.insert(
        AgentProfile::new("direct")
            .with_tools(["drafts.create", "drafts.finalize"])
            .with_permissions(["draft.write", "draft.finalize"]),
    );
    profiles.insert(
        AgentProfile::new("analyst")
            .with_tools(["customer_data.query"])
            .with_permissions(["customer_data.read"]),
    );
    profiles.insert(
        AgentProfile::new("scribe")
            .with_tools(["logs.append", "drafts.create"])
            .with_permissions(["log.write"]),
    );
    profiles
}

pub fn crm_map() -> CapabilityMap {
    CapabilityMap::default().with_row_cap(10).with_operation(
        "customer_data.list",
        OperationCapability {
            source: Some("crm".into()),
            allowed_fields: Some(vec!["id".into(), "name".into(), "status".into()]),
            deny_fields: Some(vec!["email".into()]),
            params_schema: None,
        },
    )
}

pub fn fixture_rows() -> Vec<Value> {
    vec![
        json!({"id": 1, "clientId": "client-a", "name": "Ada", "email": "ada@example.com", "status": "active"}),
        json!({"id": 2, "clientId": "client-b", "name": "Bo", "email": "bo@example.com", "status": "active"}),
        json!({"id": 3, "clientId": "client-a", "name": "Cy", "email": "cy@example.com", "status": "lapsed"}),
    ]
}

pub fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()));
    let logger = Arc::new(MemoryActionLogger::new());
    let reviews = Arc::new(MemoryReviewStore::new());
    let drafts = Arc::new(DraftStore::in_memory());
    let policy = Arc::new(PolicyEngine::new(
        Arc::new(StaticPermissionResolver::new()),
        Arc::new(StaticConsentStore::new().granting("client-a", "customer_data")),
        clock.clone(),
    ));

    let mut capabilities = CapabilityRegistry::new();
    capabilities.register("client-a", crm_map());
    let connector = Arc::new(CountingConnector {
        inner: InMemoryConnector::new(fixture_rows()),
        calls: AtomicUsize::new(0),
    });
    let mut connectors = ConnectorRegistry::new();
    connectors.register("client-a", "crm", connector.clone());

    let mut router = ToolRouter::new();
    router.register_provider(&BuiltinTools {
        policy: policy.clone(),
        capabilities: Arc::new(capabilities),
        connectors: Arc::new(connectors),
        drafts: drafts.clone(),
        logger: logger.clone(),
        clock: clock.clone(),
    });

    let orchestrator = Orchestrator::new(
        Arc::new(profiles()),
        Arc::new(router),
        reviews.clone(),
        logger.clone(),
        Arc::new(MemoryActivityStore::new()),
        clock.clone(),
    );

    Harness {
        orchestrator,
        logger,
        reviews,
        drafts,
        policy,
        connector,
        clock,
    }
}

impl Harness {
    pub fn review_service(&self) -> ReviewService {
        let store: Arc<dyn ReviewStore> = self.reviews.clone();
        ReviewService::new(store, self.policy.clone(), self.logger.clone(), self.clock.clone())
    }

    /// Run `drafts.create` as the ungated `direct` agent and return the id.
    pub fn seed_draft(&self, title: &str) -> Uuid {
        let action = IntendedAction::new(
            "draft.write",
            vec![ToolCall::new("drafts.create", json!({"title": title, "body": "text"}))],
        );
        let outcome = self
            .orchestrator
            .run(&RunRequest::new("direct", user()).with_action(action))
            .unwrap();
        let id = outcome.calls[0].result.output.as_ref().unwrap()["draftId"].clone();
        serde_json::from_value(id).unwrap()
    }
}

pub fn user() -> PolicyContext {
    PolicyContext::new("u-1").with_client("client-a")
}

pub fn reviewer() -> PolicyContext {
    PolicyContext::new("rev-1").with_roles(["reviewer"])
}

pub fn log_message(message: &str) -> IntendedAction {
    IntendedAction::new(
        "log.write",
        vec![ToolCall::new("logs.append", json!({ "message": message }))],
    )
}

pub fn finalize(draft_id: Uuid) -> IntendedAction {
    IntendedAction::new(
        "draft.finalize",
        vec![ToolCall::new("drafts.finalize", json!({"draftId": draft_id}))],
    )
}

pub fn run(h: &Harness, agent: &str, action: IntendedAction) -> RunOutcome {
    h.orchestrator
        .run(&RunRequest::new(agent, user()).with_action(action))
        .unwrap()
}
