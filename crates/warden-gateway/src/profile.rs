// profile.rs — Agent profiles: which tools and permissions an agent holds,
// and when its actions need human review.
//
// Profiles are declared in YAML, keyed by agent id:
//
// ```yaml
// drafter:
//   tools: [drafts.create, drafts.finalize, logs.append]
//   permissions: [draft.write, draft.finalize, log.write]
//   review:
//     mode: draft_only
//     reviewer_roles: [reviewer]
// ```
//
// A profile is loaded once at startup and never changes during a run.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// When an agent's actions must wait for a reviewer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReviewMode {
    /// Execute directly.
    #[default]
    None,
    /// Drafting runs directly; anything that finalizes needs review.
    DraftOnly,
    /// Every action needs review.
    Required,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviewPolicy {
    #[serde(default)]
    pub mode: ReviewMode,
    /// Roles that may resolve this agent's reviews.
    #[serde(default)]
    pub reviewer_roles: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentProfile {
    /// Filled from the YAML key when loaded from a file.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub tools: BTreeSet<String>,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    #[serde(default)]
    pub review: ReviewPolicy,
}

impl AgentProfile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools.extend(tools.into_iter().map(Into::into));
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

    pub fn with_review(mut self, mode: ReviewMode, reviewer_roles: &[&str]) -> Self {
        self.review = ReviewPolicy {
            mode,
            reviewer_roles: reviewer_roles.iter().map(|r| r.to_string()).collect(),
        };
        self
    }

    pub fn allows_tool(&self, tool: &str) -> bool {
        self.tools.contains(tool)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

/// Source of agent profiles.
pub trait ProfileStore: Send + Sync {
    fn get(&self, agent_id: &str) -> Option<AgentProfile>;
}

/// Profiles parsed from YAML once, then served read-only.
#[derive(Debug, Clone, Default)]
pub struct YamlProfileStore {
    profiles: HashMap<String, AgentProfile>,
}

impl YamlProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a profile.
    pub fn insert(&mut self, profile: AgentProfile) {
        self.profiles.insert(profile.id.clone(), profile);
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        let parsed: HashMap<String, AgentProfile> = serde_yaml::from_str(yaml)?;
        let profiles = parsed
            .into_iter()
            .map(|(id, mut profile)| {
                profile.id = id.clone();
                (id, profile)
            })
            .collect();
        Ok(Self { profiles })
    }

    /// Load profiles from a file; a missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self, GatewayError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let yaml = std::fs::read_to_string(path).map_err(|source| GatewayError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml).map_err(|source| GatewayError::YamlParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Agent ids, sorted.
    pub fn agent_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl ProfileStore for YamlProfileStore {
    fn get(&self, agent_id: &str) -> Option<AgentProfile> {
        self.profiles.get(agent_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
drafter:
  tools: [drafts.create, drafts.finalize]
  permissions: [draft.write, draft.finalize]
  review:
    mode: draft_only
    reviewer_roles: [reviewer]
logger:
  tools: [logs.append]
  permissions: [log.write]
"#;

    #[test]
    fn yaml_profiles_take_their_key_as_id() {
        let store = YamlProfileStore::from_yaml_str(YAML).unwrap();
        assert_eq!(store.agent_ids(), vec!["drafter", "logger"]);

        let drafter = store.get("drafter").unwrap();
        assert_eq!(drafter.id, "drafter");
        assert_eq!(drafter.review.mode, ReviewMode::DraftOnly);
        assert!(drafter.allows_tool("drafts.finalize"));
        assert!(drafter.has_permission("draft.write"));

        let logger = store.get("logger").unwrap();
        assert_eq!(logger.review.mode, ReviewMode::None);
        assert!(store.get("ghost").is_none());
    }

    #[test]
    fn unknown_review_mode_is_rejected() {
        let yaml = "x:\n  review:\n    mode: sometimes\n";
        assert!(YamlProfileStore::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = YamlProfileStore::load(&dir.path().join("profiles.yaml")).unwrap();
        assert!(store.agent_ids().is_empty());
    }

    #[test]
    fn builder_composes_profile() {
        let p = AgentProfile::new("a")
            .with_tools(["logs.append"])
            .with_permissions(["log.write"])
            .with_review(ReviewMode::Required, &["admin"]);
        assert!(p.allows_tool("logs.append"));
        assert_eq!(p.review.reviewer_roles, vec!["admin"]);
    }
}
