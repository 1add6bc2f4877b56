// context.rs — Caller identity for policy evaluation, and the external
// resolvers the engine consults.
//
// PolicyContext is built per call and never persisted. Role and consent
// storage live outside this crate; the engine only sees them through the
// PermissionResolver and ConsentStore traits.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Who is asking, on behalf of which tenant and project.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyContext {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

impl PolicyContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions.extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

/// Effective roles and permissions of a user within a tenant.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedIdentity {
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

/// Looks up a user's effective roles and permissions.
pub trait PermissionResolver: Send + Sync {
    fn resolve(&self, user_id: &str, client_id: Option<&str>) -> ResolvedIdentity;
}

/// Answers whether a client consented to processing in a data scope.
pub trait ConsentStore: Send + Sync {
    fn has_consent(&self, client_id: &str, scope: &str) -> bool;
}

/// A resolver backed by a fixed user → identity table.
///
/// Tenant-specific grants take precedence over the user's global grant.
#[derive(Debug, Clone, Default)]
pub struct StaticPermissionResolver {
    global: HashMap<String, ResolvedIdentity>,
    per_tenant: HashMap<(String, String), ResolvedIdentity>,
}

impl StaticPermissionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, user_id: impl Into<String>, identity: ResolvedIdentity) -> Self {
        self.global.insert(user_id.into(), identity);
        self
    }

    pub fn grant_in_tenant(
        mut self,
        user_id: impl Into<String>,
        client_id: impl Into<String>,
        identity: ResolvedIdentity,
    ) -> Self {
        self.per_tenant
            .insert((user_id.into(), client_id.into()), identity);
        self
    }
}

impl PermissionResolver for StaticPermissionResolver {
    fn resolve(&self, user_id: &str, client_id: Option<&str>) -> ResolvedIdentity {
        if let Some(client_id) = client_id {
            if let Some(identity) = self
                .per_tenant
                .get(&(user_id.to_string(), client_id.to_string()))
            {
                return identity.clone();
            }
        }
        self.global.get(user_id).cloned().unwrap_or_default()
    }
}

/// A consent store backed by a fixed set of `(client, scope)` grants.
#[derive(Debug, Clone, Default)]
pub struct StaticConsentStore {
    grants: HashSet<(String, String)>,
}

impl StaticConsentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn granting(mut self, client_id: impl Into<String>, scope: impl Into<String>) -> Self {
        self.grants.insert((client_id.into(), scope.into()));
        self
    }
}

impl ConsentStore for StaticConsentStore {
    fn has_consent(&self, client_id: &str, scope: &str) -> bool {
        self.grants
            .contains(&(client_id.to_string(), scope.to_string()))
    }
}
