// capability.rs — Per-tenant capability maps and the registry that holds them.
//
// A capability map lists exactly which read operations a tenant exposes,
// which data source serves each one, and which fields may leave the source.
// If an operation is not in the tenant's map, it does not exist for that
// tenant.
//
// Maps are registered once at startup. After that the registry is shared
// read-only (behind an Arc) by the policy engine and the data tools.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, RegistryError};

fn default_row_cap() -> usize {
    100
}

/// Primitive JSON types a parameter may be declared as.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    pub fn matches(&self, value: &serde_json::Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
        }
    }
}

/// Declared shape of an operation's parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ParamsSchema {
    /// Parameters that must be present.
    #[serde(default)]
    pub required: Vec<String>,
    /// Declared types; undeclared parameters are passed through unchecked.
    #[serde(default)]
    pub properties: BTreeMap<String, ParamType>,
}

/// The rules for one operation within a tenant's map.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OperationCapability {
    /// Data source that serves the operation (e.g., "crm").
    #[serde(default)]
    pub source: Option<String>,
    /// Fields that may be returned. Empty or absent means "no projection".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_fields: Option<Vec<String>>,
    /// Fields that are always stripped, whatever else is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deny_fields: Option<Vec<String>>,
    /// Optional parameter schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params_schema: Option<ParamsSchema>,
}

impl OperationCapability {
    /// Allowed fields, or an empty slice when none are configured.
    pub fn allowed(&self) -> &[String] {
        self.allowed_fields.as_deref().unwrap_or(&[])
    }

    /// Denied fields, or an empty slice when none are configured.
    pub fn denied(&self) -> &[String] {
        self.deny_fields.as_deref().unwrap_or(&[])
    }
}

/// Everything one tenant may do with governed data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapabilityMap {
    /// operation id → rules.
    #[serde(default)]
    pub operations: BTreeMap<String, OperationCapability>,
    /// Hard ceiling on rows returned by any single operation.
    #[serde(default = "default_row_cap")]
    pub default_row_cap: usize,
}

impl Default for CapabilityMap {
    fn default() -> Self {
        Self {
            operations: BTreeMap::new(),
            default_row_cap: default_row_cap(),
        }
    }
}

impl CapabilityMap {
    /// Add an operation and return self (builder pattern).
    pub fn with_operation(mut self, operation_id: impl Into<String>, cap: OperationCapability) -> Self {
        self.operations.insert(operation_id.into(), cap);
        self
    }

    /// Set the row cap and return self.
    pub fn with_row_cap(mut self, cap: usize) -> Self {
        self.default_row_cap = cap;
        self
    }

    pub fn operation(&self, operation_id: &str) -> Option<&OperationCapability> {
        self.operations.get(operation_id)
    }
}

/// Tenant → capability map.
///
/// Lookups always start from the tenant key; there is no API that takes an
/// operation alone.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    tenants: HashMap<String, CapabilityMap>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a tenant's map.
    pub fn register(&mut self, tenant: impl Into<String>, map: CapabilityMap) {
        let tenant = tenant.into();
        tracing::debug!(tenant = %tenant, operations = map.operations.len(), "capabilities registered");
        self.tenants.insert(tenant, map);
    }

    pub fn get_capabilities(&self, tenant: &str) -> Option<&CapabilityMap> {
        self.tenants.get(tenant)
    }

    pub fn is_operation_allowed(&self, tenant: &str, operation_id: &str) -> bool {
        self.tenants
            .get(tenant)
            .is_some_and(|map| map.operations.contains_key(operation_id))
    }

    /// The data source serving `operation_id` for `tenant`.
    pub fn get_source_for_operation(&self, tenant: &str, operation_id: &str) -> Result<&str, PolicyError> {
        let missing = |detail: &str| PolicyError::CapabilityMissing {
            tenant: tenant.to_string(),
            operation: operation_id.to_string(),
            detail: detail.to_string(),
        };
        let map = self
            .tenants
            .get(tenant)
            .ok_or_else(|| missing("tenant has no capability map"))?;
        let cap = map
            .operations
            .get(operation_id)
            .ok_or_else(|| missing("operation is not registered"))?;
        cap.source
            .as_deref()
            .ok_or_else(|| missing("operation has no source mapping"))
    }

    /// Registered tenant ids, sorted.
    pub fn tenants(&self) -> Vec<&str> {
        let mut tenants: Vec<&str> = self.tenants.keys().map(String::as_str).collect();
        tenants.sort_unstable();
        tenants
    }

    /// Parse a YAML document mapping tenant id → capability map.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, RegistryError> {
        let tenants: HashMap<String, CapabilityMap> = serde_yaml::from_str(yaml)?;
        let mut registry = Self::new();
        for (tenant, map) in tenants {
            registry.register(tenant, map);
        }
        Ok(registry)
    }

    /// Load from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, RegistryError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Like [`from_yaml_file`](Self::from_yaml_file), but a missing file
    /// yields an empty registry.
    pub fn load_or_empty(path: &Path) -> Result<Self, RegistryError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        Self::from_yaml_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crm_map() -> CapabilityMap {
        CapabilityMap::default().with_operation(
            "customer_data.list",
            OperationCapability {
                source: Some("crm".to_string()),
                allowed_fields: Some(vec!["id".into(), "name".into()]),
                deny_fields: Some(vec!["email".into()]),
                params_schema: None,
            },
        )
    }

    #[test]
    fn registered_operation_is_allowed_only_for_its_tenant() {
        let mut registry = CapabilityRegistry::new();
        registry.register("client-a", crm_map());

        assert!(registry.is_operation_allowed("client-a", "customer_data.list"));
        assert!(!registry.is_operation_allowed("client-b", "customer_data.list"));
        assert!(!registry.is_operation_allowed("client-a", "customer_data.delete"));
    }

    #[test]
    fn source_lookup_resolves() {
        let mut registry = CapabilityRegistry::new();
        registry.register("client-a", crm_map());
        assert_eq!(
            registry.get_source_for_operation("client-a", "customer_data.list").unwrap(),
            "crm"
        );
    }

    #[test]
    fn source_lookup_fails_for_unknown_tenant_operation_or_source() {
        let mut registry = CapabilityRegistry::new();
        registry.register(
            "client-a",
            crm_map().with_operation("customer_data.orphan", OperationCapability::default()),
        );

        for (tenant, op) in [
            ("client-b", "customer_data.list"),
            ("client-a", "customer_data.nope"),
            ("client-a", "customer_data.orphan"),
        ] {
            let err = registry.get_source_for_operation(tenant, op).unwrap_err();
            assert!(matches!(err, PolicyError::CapabilityMissing { .. }), "{tenant}/{op}");
        }
    }

    #[test]
    fn yaml_loading_applies_defaults() {
        let yaml = r#"
client-a:
  default_row_cap: 25
  operations:
    customer_data.list:
      source: crm
      allowed_fields: [id, name, status, phone]
      deny_fields: [email]
client-b:
  operations:
    customer_data.count:
      source: warehouse
      params_schema:
        required: [segment]
        properties:
          segment: string
"#;
        let registry = CapabilityRegistry::from_yaml_str(yaml).unwrap();
        assert_eq!(registry.tenants(), vec!["client-a", "client-b"]);
        assert_eq!(registry.get_capabilities("client-a").unwrap().default_row_cap, 25);
        assert_eq!(registry.get_capabilities("client-b").unwrap().default_row_cap, 100);

        let schema = registry
            .get_capabilities("client-b")
            .unwrap()
            .operation("customer_data.count")
            .unwrap()
            .params_schema
            .clone()
            .unwrap();
        assert_eq!(schema.required, vec!["segment"]);
        assert_eq!(schema.properties["segment"], ParamType::String);
    }

    #[test]
    fn missing_file_yields_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = CapabilityRegistry::load_or_empty(&dir.path().join("nope.yaml")).unwrap();
        assert!(registry.tenants().is_empty());
    }
}
