// activity.rs — Last-seen timestamps per agent, for the inactivity-gap
// preflight.
//
// The file store keeps one JSON object `{agentId: timestamp}` and rewrites it
// through a temp file + rename, the same way the review store writes records.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("I/O error on {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("activity file {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Where agent activity is remembered between runs.
pub trait ActivityStore: Send + Sync {
    fn last_seen(&self, agent_id: &str) -> Result<Option<DateTime<Utc>>, ActivityError>;
    fn record(&self, agent_id: &str, at: DateTime<Utc>) -> Result<(), ActivityError>;
}

#[derive(Debug, Default)]
pub struct MemoryActivityStore {
    seen: Mutex<BTreeMap<String, DateTime<Utc>>>,
}

impl MemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ActivityStore for MemoryActivityStore {
    fn last_seen(&self, agent_id: &str) -> Result<Option<DateTime<Utc>>, ActivityError> {
        let seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        Ok(seen.get(agent_id).copied())
    }

    fn record(&self, agent_id: &str, at: DateTime<Utc>) -> Result<(), ActivityError> {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        seen.insert(agent_id.to_string(), at);
        Ok(())
    }
}

/// Activity persisted to a single JSON file.
#[derive(Debug)]
pub struct JsonFileActivityStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileActivityStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<BTreeMap<String, DateTime<Utc>>, ActivityError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let text = fs::read_to_string(&self.path).map_err(|source| ActivityError::IoError {
            path: self.path.clone(),
            source,
        })?;
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&text).map_err(|source| ActivityError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn write(&self, seen: &BTreeMap<String, DateTime<Utc>>) -> Result<(), ActivityError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| ActivityError::IoError { path, source }
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        let json = serde_json::to_string_pretty(seen).map_err(|source| ActivityError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err(&tmp))?;
        fs::rename(&tmp, &self.path).map_err(io_err(&self.path))?;
        Ok(())
    }
}

impl ActivityStore for JsonFileActivityStore {
    fn last_seen(&self, agent_id: &str) -> Result<Option<DateTime<Utc>>, ActivityError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.read()?.get(agent_id).copied())
    }

    fn record(&self, agent_id: &str, at: DateTime<Utc>) -> Result<(), ActivityError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut seen = self.read()?;
        seen.insert(agent_id.to_string(), at);
        self.write(&seen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn memory_store_remembers_latest() {
        let store = MemoryActivityStore::new();
        assert!(store.last_seen("a").unwrap().is_none());
        store.record("a", t(1)).unwrap();
        store.record("a", t(2)).unwrap();
        assert_eq!(store.last_seen("a").unwrap(), Some(t(2)));
        assert!(store.last_seen("b").unwrap().is_none());
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".warden").join("activity.json");
        {
            let store = JsonFileActivityStore::new(&path);
            store.record("a", t(3)).unwrap();
            store.record("b", t(4)).unwrap();
        }
        let reopened = JsonFileActivityStore::new(&path);
        assert_eq!(reopened.last_seen("a").unwrap(), Some(t(3)));
        assert_eq!(reopened.last_seen("b").unwrap(), Some(t(4)));
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity.json");
        fs::write(&path, "not json").unwrap();
        let store = JsonFileActivityStore::new(&path);
        assert!(matches!(store.last_seen("a"), Err(ActivityError::Corrupt { .. })));
    }
}
