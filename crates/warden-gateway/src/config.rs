// config.rs — Warden configuration.
//
// WardenConfig determines where Warden keeps its state: the audit log,
// review records, drafts, agent activity, agent profiles, tenant capability
// maps, and connector data. `for_project()` lays everything out under a
// `.warden/` directory in the project root; `load()` additionally reads
// tunable settings from `.warden/warden.toml` when that file exists.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use warden_policy::LicenseTier;

use crate::error::GatewayError;

fn default_gap_threshold_minutes() -> i64 {
    50
}

/// Settings read from `.warden/warden.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Inactivity after which an agent's next run counts as a fresh session.
    #[serde(default = "default_gap_threshold_minutes")]
    pub gap_threshold_minutes: i64,

    /// Gates `premium.*` operations.
    #[serde(default)]
    pub license_tier: LicenseTier,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gap_threshold_minutes: default_gap_threshold_minutes(),
            license_tier: LicenseTier::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WardenConfig {
    /// Root directory of the project.
    pub project_root: PathBuf,

    /// Path to the hash-chained audit log.
    pub audit_log: PathBuf,

    /// Directory of review requests (one JSON file each).
    pub reviews_dir: PathBuf,

    /// Directory of drafts (one JSON file each).
    pub drafts_dir: PathBuf,

    /// Last-seen timestamp per agent.
    pub activity_file: PathBuf,

    /// Agent profiles (YAML).
    pub profiles_file: PathBuf,

    /// Tenant capability maps (YAML).
    pub capabilities_file: PathBuf,

    /// User roles/permissions and tenant consent (YAML).
    pub access_file: PathBuf,

    /// JSONL connector data: `<connectors_dir>/<tenant>/<source>.jsonl`.
    pub connectors_dir: PathBuf,

    /// Optional scope rules for the governance preflight (YAML).
    pub governance_file: PathBuf,

    #[serde(default)]
    pub settings: Settings,
}

impl WardenConfig {
    /// Create a config with the standard `.warden/` layout for a project.
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        let root = project_root.as_ref().to_path_buf();
        let dir = root.join(".warden");
        Self {
            project_root: root,
            audit_log: dir.join("audit.jsonl"),
            reviews_dir: dir.join("reviews"),
            drafts_dir: dir.join("drafts"),
            activity_file: dir.join("activity.json"),
            profiles_file: dir.join("profiles.yaml"),
            capabilities_file: dir.join("capabilities.yaml"),
            access_file: dir.join("access.yaml"),
            connectors_dir: dir.join("connectors"),
            governance_file: dir.join("governance.yaml"),
            settings: Settings::default(),
        }
    }

    /// Path of the optional settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.project_root.join(".warden").join("warden.toml")
    }

    /// `for_project()` plus settings from `.warden/warden.toml`, if present.
    pub fn load(project_root: impl AsRef<Path>) -> Result<Self, GatewayError> {
        let mut config = Self::for_project(project_root);
        let path = config.settings_file();
        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|source| GatewayError::IoError {
                path: path.clone(),
                source,
            })?;
            config.settings = toml::from_str(&content)
                .map_err(|source| GatewayError::ConfigParse { path, source })?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_project_lays_out_warden_dir() {
        let config = WardenConfig::for_project("/work/app");
        assert_eq!(config.audit_log, PathBuf::from("/work/app/.warden/audit.jsonl"));
        assert_eq!(config.reviews_dir, PathBuf::from("/work/app/.warden/reviews"));
        assert_eq!(config.settings.gap_threshold_minutes, 50);
        assert_eq!(config.settings.license_tier, LicenseTier::Free);
    }

    #[test]
    fn load_without_settings_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = WardenConfig::load(dir.path()).unwrap();
        assert_eq!(config.settings, Settings::default());
    }

    #[test]
    fn load_overlays_settings() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".warden")).unwrap();
        std::fs::write(
            dir.path().join(".warden/warden.toml"),
            "gap_threshold_minutes = 15\nlicense_tier = \"pro\"\n",
        )
        .unwrap();
        let config = WardenConfig::load(dir.path()).unwrap();
        assert_eq!(config.settings.gap_threshold_minutes, 15);
        assert_eq!(config.settings.license_tier, LicenseTier::Pro);
    }

    #[test]
    fn bad_settings_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".warden")).unwrap();
        std::fs::write(dir.path().join(".warden/warden.toml"), "gap_threshold_minutes = \"soon\"").unwrap();
        assert!(matches!(
            WardenConfig::load(dir.path()),
            Err(GatewayError::ConfigParse { .. })
        ));
    }
}
