// state.rs — Everything a Warden process needs, assembled from WardenConfig.
//
// Built once at startup. Registries and stores are read-only afterwards and
// shared through `Arc`; nothing here is a global.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use warden_audit::{ActionLogger, JsonlActionLogger};
use warden_clock::{Clock, SystemClock};
use warden_connectors::{ConnectorRegistry, JsonlConnector};
use warden_policy::{CapabilityRegistry, PolicyEngine};
use warden_review::{JsonFileReviewStore, ReviewService, ReviewStore};

use crate::access::AccessFile;
use crate::config::WardenConfig;
use crate::error::GatewayError;
use crate::profile::YamlProfileStore;
use crate::router::ToolRouter;
use crate::tools::{BuiltinTools, DraftStore};

pub struct GatewayState {
    pub config: WardenConfig,
    pub clock: Arc<dyn Clock>,
    pub logger: Arc<dyn ActionLogger>,
    pub policy: Arc<PolicyEngine>,
    pub profiles: Arc<YamlProfileStore>,
    pub capabilities: Arc<CapabilityRegistry>,
    pub connectors: Arc<ConnectorRegistry>,
    pub reviews: Arc<dyn ReviewStore>,
    pub drafts: Arc<DraftStore>,
    pub router: Arc<ToolRouter>,
}

impl GatewayState {
    /// Initialize state from config with the system clock.
    pub fn new(config: WardenConfig) -> Result<Self, GatewayError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Initialize state from config. Creates directories and opens the log.
    pub fn with_clock(config: WardenConfig, clock: Arc<dyn Clock>) -> Result<Self, GatewayError> {
        let logger: Arc<dyn ActionLogger> = Arc::new(JsonlActionLogger::open(&config.audit_log)?);
        let access = AccessFile::load(&config.access_file)?;
        let policy = Arc::new(
            PolicyEngine::new(
                Arc::new(access.resolver()),
                Arc::new(access.consent_store()),
                clock.clone(),
            )
            .with_license(config.settings.license_tier),
        );
        let profiles = Arc::new(YamlProfileStore::load(&config.profiles_file)?);
        let capabilities = Arc::new(CapabilityRegistry::load_or_empty(&config.capabilities_file)?);
        let connectors = Arc::new(load_connectors(&config.connectors_dir)?);
        let reviews: Arc<dyn ReviewStore> = Arc::new(JsonFileReviewStore::new(&config.reviews_dir)?);
        let drafts = Arc::new(DraftStore::open(&config.drafts_dir)?);

        let mut router = ToolRouter::new();
        router.register_provider(&BuiltinTools {
            policy: policy.clone(),
            capabilities: capabilities.clone(),
            connectors: connectors.clone(),
            drafts: drafts.clone(),
            logger: logger.clone(),
            clock: clock.clone(),
        });

        tracing::info!(
            root = %config.project_root.display(),
            agents = profiles.agent_ids().len(),
            tenants = capabilities.tenants().len(),
            tools = router.tools().len(),
            "gateway state initialized"
        );

        Ok(Self {
            config,
            clock,
            logger,
            policy,
            profiles,
            capabilities,
            connectors,
            reviews,
            drafts,
            router: Arc::new(router),
        })
    }

    /// A review service sharing this state's store, policy and log.
    pub fn review_service(&self) -> ReviewService {
        ReviewService::new(
            self.reviews.clone(),
            self.policy.clone(),
            self.logger.clone(),
            self.clock.clone(),
        )
    }
}

/// Register `<dir>/<tenant>/<source>.jsonl` as JSONL connectors.
fn load_connectors(dir: &Path) -> Result<ConnectorRegistry, GatewayError> {
    let mut registry = ConnectorRegistry::new();
    if !dir.exists() {
        return Ok(registry);
    }
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| GatewayError::IoError { path, source }
    };
    for tenant_entry in fs::read_dir(dir).map_err(io_err(dir))? {
        let tenant_dir = tenant_entry.map_err(io_err(dir))?.path();
        if !tenant_dir.is_dir() {
            continue;
        }
        let Some(tenant) = tenant_dir.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        for source_entry in fs::read_dir(&tenant_dir).map_err(io_err(tenant_dir.as_path()))? {
            let path = source_entry.map_err(io_err(tenant_dir.as_path()))?.path();
            if path.extension().is_some_and(|ext| ext == "jsonl") {
                if let Some(source) = path.file_stem().and_then(|s| s.to_str()) {
                    registry.register(tenant.clone(), source.to_string(), Arc::new(JsonlConnector::new(&path)));
                }
            }
        }
    }
    Ok(registry)
}
