// access.rs — User roles/permissions and tenant consent, read from YAML.
//
// Role storage and consent records belong to systems outside Warden. For a
// standalone deployment they can be declared in `.warden/access.yaml`:
//
// ```yaml
// users:
//   alice:
//     roles: [reviewer]
//     permissions: [customer_data.read]
//     tenants:
//       client-a:
//         roles: [admin]
//         permissions: [customer_data.read, phase.update]
// consents:
//   - client_id: client-a
//     scope: customer_data
// ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use warden_policy::{ResolvedIdentity, StaticConsentStore, StaticPermissionResolver};

use crate::error::GatewayError;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GrantSpec {
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

impl GrantSpec {
    fn identity(&self) -> ResolvedIdentity {
        ResolvedIdentity {
            roles: self.roles.clone(),
            permissions: self.permissions.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSpec {
    #[serde(flatten)]
    pub global: GrantSpec,
    /// Per-tenant grants; these replace the global grant for that tenant.
    #[serde(default)]
    pub tenants: BTreeMap<String, GrantSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsentSpec {
    pub client_id: String,
    pub scope: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessFile {
    #[serde(default)]
    pub users: BTreeMap<String, UserSpec>,
    #[serde(default)]
    pub consents: Vec<ConsentSpec>,
}

impl AccessFile {
    /// Load from a file; a missing file grants nothing.
    pub fn load(path: &Path) -> Result<Self, GatewayError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let yaml = std::fs::read_to_string(path).map_err(|source| GatewayError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&yaml).map_err(|source| GatewayError::YamlParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn resolver(&self) -> StaticPermissionResolver {
        let mut resolver = StaticPermissionResolver::new();
        for (user, spec) in &self.users {
            resolver = resolver.grant(user.clone(), spec.global.identity());
            for (tenant, grant) in &spec.tenants {
                resolver = resolver.grant_in_tenant(user.clone(), tenant.clone(), grant.identity());
            }
        }
        resolver
    }

    pub fn consent_store(&self) -> StaticConsentStore {
        self.consents
            .iter()
            .fold(StaticConsentStore::new(), |store, c| {
                store.granting(c.client_id.clone(), c.scope.clone())
            })
    }
}
