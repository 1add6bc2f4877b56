// registry.rs — Tenant → source → connector.
//
// The outer key is always the tenant. Two tenants may use the same source
// name ("crm") and still get different connectors; there is no lookup by
// source alone.

use std::collections::HashMap;
use std::sync::Arc;

use crate::connector::Connector;
use crate::error::ConnectorError;

#[derive(Default)]
pub struct ConnectorRegistry {
    tenants: HashMap<String, HashMap<String, Arc<dyn Connector>>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the connector for `(tenant, source)`.
    pub fn register(
        &mut self,
        tenant: impl Into<String>,
        source: impl Into<String>,
        connector: Arc<dyn Connector>,
    ) {
        let tenant = tenant.into();
        let source = source.into();
        tracing::debug!(tenant = %tenant, source = %source, kind = connector.source_type(), "connector registered");
        self.tenants
            .entry(tenant)
            .or_default()
            .insert(source, connector);
    }

    pub fn get_connector(&self, tenant: &str, source: &str) -> Result<Arc<dyn Connector>, ConnectorError> {
        let sources = self
            .tenants
            .get(tenant)
            .ok_or_else(|| ConnectorError::TenantNotRegistered {
                tenant: tenant.to_string(),
            })?;
        sources
            .get(source)
            .cloned()
            .ok_or_else(|| ConnectorError::SourceNotFound {
                tenant: tenant.to_string(),
                source_name: source.to_string(),
            })
    }

    /// Source names registered for a tenant, sorted.
    pub fn sources(&self, tenant: &str) -> Vec<&str> {
        let mut sources: Vec<&str> = self
            .tenants
            .get(tenant)
            .map(|s| s.keys().map(String::as_str).collect())
            .unwrap_or_default();
        sources.sort_unstable();
        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryConnector;
    use serde_json::{json, Map};
    use warden_policy::QueryConstraints;

    #[test]
    fn same_source_name_resolves_per_tenant() {
        let mut registry = ConnectorRegistry::new();
        registry.register("client-a", "crm", Arc::new(InMemoryConnector::new(vec![json!({"who": "a"})])));
        registry.register("client-b", "crm", Arc::new(InMemoryConnector::new(vec![json!({"who": "b"})])));

        let constraints = QueryConstraints { max_rows: 10, fields: None };
        let a = registry
            .get_connector("client-a", "crm")
            .unwrap()
            .execute_read_model("op", &Map::new(), &constraints)
            .unwrap();
        assert_eq!(a.data, vec![json!({"who": "a"})]);
    }

    #[test]
    fn missing_tenant_or_source_is_an_error() {
        let mut registry = ConnectorRegistry::new();
        registry.register("client-a", "crm", Arc::new(InMemoryConnector::default()));

        assert!(matches!(
            registry.get_connector("client-b", "crm"),
            Err(ConnectorError::TenantNotRegistered { .. })
        ));
        assert!(matches!(
            registry.get_connector("client-a", "warehouse"),
            Err(ConnectorError::SourceNotFound { .. })
        ));
        assert_eq!(registry.sources("client-a"), vec!["crm"]);
    }
}
