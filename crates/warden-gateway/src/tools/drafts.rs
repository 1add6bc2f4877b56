// drafts.rs — Drafts and the two tools that manage them.
//
//   drafts.create   (draft kind)    → new draft in `draft` status
//   drafts.finalize (finalize kind) → draft → final; compensation reopens it
//
// DraftStore keeps drafts in memory and, when opened on a directory, mirrors
// each one to `<dir>/<draft_id>.json`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use warden_clock::Clock;
use warden_policy::PolicyContext;

use crate::router::{ToolFailure, ToolHandler, ToolResult};

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("draft not found: {0}")]
    NotFound(Uuid),

    #[error("draft {draft_id} is {status}, expected {expected}")]
    WrongStatus {
        draft_id: Uuid,
        status: DraftStatus,
        expected: DraftStatus,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    Draft,
    Final,
}

impl std::fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DraftStatus::Draft => write!(f, "draft"),
            DraftStatus::Final => write!(f, "final"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Draft {
    pub draft_id: Uuid,
    pub title: String,
    pub body: String,
    pub status: DraftStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalized_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct DraftStore {
    dir: Option<PathBuf>,
    drafts: Mutex<HashMap<Uuid, Draft>>,
}

impl DraftStore {
    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a directory-backed store, loading any drafts already there.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, DraftError> {
        let dir = dir.as_ref().to_path_buf();
        let io_err = |source| DraftError::IoError {
            path: dir.clone(),
            source,
        };
        fs::create_dir_all(&dir).map_err(io_err)?;

        let mut drafts = HashMap::new();
        for entry in fs::read_dir(&dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let json = fs::read_to_string(&path).map_err(|source| DraftError::IoError {
                    path: path.clone(),
                    source,
                })?;
                let draft: Draft = serde_json::from_str(&json)?;
                drafts.insert(draft.draft_id, draft);
            }
        }
        Ok(Self {
            dir: Some(dir),
            drafts: Mutex::new(drafts),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Draft>> {
        self.drafts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, draft: &Draft) -> Result<(), DraftError> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let path = dir.join(format!("{}.json", draft.draft_id));
        let json = serde_json::to_string_pretty(draft)?;
        fs::write(&path, json).map_err(|source| DraftError::IoError { path, source })
    }

    pub fn create(&self, draft: Draft) -> Result<Draft, DraftError> {
        self.persist(&draft)?;
        self.lock().insert(draft.draft_id, draft.clone());
        Ok(draft)
    }

    pub fn get(&self, draft_id: Uuid) -> Option<Draft> {
        self.lock().get(&draft_id).cloned()
    }

    /// All drafts, oldest first.
    pub fn list(&self) -> Vec<Draft> {
        let mut drafts: Vec<Draft> = self.lock().values().cloned().collect();
        drafts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        drafts
    }

    pub fn finalize(&self, draft_id: Uuid, at: DateTime<Utc>) -> Result<Draft, DraftError> {
        self.set_status(draft_id, DraftStatus::Draft, DraftStatus::Final, Some(at))
    }

    /// Undo a finalize.
    pub fn reopen(&self, draft_id: Uuid) -> Result<Draft, DraftError> {
        self.set_status(draft_id, DraftStatus::Final, DraftStatus::Draft, None)
    }

    /// Remove a draft; used to undo a create.
    pub fn discard(&self, draft_id: Uuid) -> Result<(), DraftError> {
        self.lock().remove(&draft_id).ok_or(DraftError::NotFound(draft_id))?;
        if let Some(dir) = &self.dir {
            let path = dir.join(format!("{}.json", draft_id));
            if path.exists() {
                fs::remove_file(&path).map_err(|source| DraftError::IoError { path, source })?;
            }
        }
        Ok(())
    }

    fn set_status(
        &self,
        draft_id: Uuid,
        expected: DraftStatus,
        to: DraftStatus,
        finalized_at: Option<DateTime<Utc>>,
    ) -> Result<Draft, DraftError> {
        let mut drafts = self.lock();
        let draft = drafts.get_mut(&draft_id).ok_or(DraftError::NotFound(draft_id))?;
        if draft.status != expected {
            return Err(DraftError::WrongStatus {
                draft_id,
                status: draft.status,
                expected,
            });
        }
        let mut updated = draft.clone();
        updated.status = to;
        updated.finalized_at = finalized_at;
        self.persist(&updated)?;
        *draft = updated.clone();
        Ok(updated)
    }
}

fn draft_id_from(value: Option<&Value>) -> Option<Uuid> {
    value.and_then(Value::as_str).and_then(|s| Uuid::parse_str(s).ok())
}

/// `drafts.create`
pub struct DraftsCreateTool {
    store: Arc<DraftStore>,
    clock: Arc<dyn Clock>,
}

impl DraftsCreateTool {
    pub fn new(store: Arc<DraftStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }
}

impl ToolHandler for DraftsCreateTool {
    fn call(&self, context: &PolicyContext, input: &Value) -> ToolResult {
        let Some(title) = input.get("title").and_then(Value::as_str) else {
            return ToolResult::failure(ToolFailure::new("'title' must be a string"));
        };
        let body = input.get("body").and_then(Value::as_str).unwrap_or_default();

        let draft = Draft {
            draft_id: Uuid::new_v4(),
            title: title.to_string(),
            body: body.to_string(),
            status: DraftStatus::Draft,
            tenant_id: context.client_id.clone(),
            created_by: context.user_id.clone(),
            created_at: self.clock.now(),
            finalized_at: None,
        };
        match self.store.create(draft) {
            Ok(d) => ToolResult::success(json!({ "draftId": d.draft_id, "status": d.status })),
            Err(e) => ToolResult::failure(ToolFailure::new(e.to_string())),
        }
    }

    fn compensate(
        &self,
        _context: &PolicyContext,
        _input: &Value,
        output: Option<&Value>,
    ) -> Result<(), ToolFailure> {
        let draft_id = draft_id_from(output.and_then(|o| o.get("draftId")))
            .ok_or_else(|| ToolFailure::new("no draftId in create output"))?;
        self.store
            .discard(draft_id)
            .map_err(|e| ToolFailure::new(e.to_string()))
    }
}

/// `drafts.finalize`
pub struct DraftsFinalizeTool {
    store: Arc<DraftStore>,
    clock: Arc<dyn Clock>,
}

impl DraftsFinalizeTool {
    pub fn new(store: Arc<DraftStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }
}

impl ToolHandler for DraftsFinalizeTool {
    fn call(&self, _context: &PolicyContext, input: &Value) -> ToolResult {
        let Some(draft_id) = draft_id_from(input.get("draftId")) else {
            return ToolResult::failure(ToolFailure::new("'draftId' must be a draft UUID"));
        };
        match self.store.finalize(draft_id, self.clock.now()) {
            Ok(d) => ToolResult::success(json!({ "draftId": d.draft_id, "status": d.status })),
            Err(e) => ToolResult::failure(ToolFailure::new(e.to_string())),
        }
    }

    fn compensate(
        &self,
        _context: &PolicyContext,
        input: &Value,
        _output: Option<&Value>,
    ) -> Result<(), ToolFailure> {
        let draft_id = draft_id_from(input.get("draftId"))
            .ok_or_else(|| ToolFailure::new("'draftId' must be a draft UUID"))?;
        self.store
            .reopen(draft_id)
            .map(|_| ())
            .map_err(|e| ToolFailure::new(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use warden_clock::ManualClock;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()))
    }

    fn ctx() -> PolicyContext {
        PolicyContext::new("u-1").with_client("client-a")
    }

    #[test]
    fn create_then_finalize_then_compensate() {
        let store = Arc::new(DraftStore::in_memory());
        let create = DraftsCreateTool::new(store.clone(), clock());
        let finalize = DraftsFinalizeTool::new(store.clone(), clock());

        let created = create.call(&ctx(), &json!({"title": "Q2 letter", "body": "..."}));
        assert!(created.ok);
        let draft_id = created.output.unwrap()["draftId"].clone();

        let input = json!({ "draftId": draft_id });
        let finalized = finalize.call(&ctx(), &input);
        assert!(finalized.ok);
        assert_eq!(finalized.output.as_ref().unwrap()["status"], "final");

        let again = finalize.call(&ctx(), &input);
        assert!(!again.ok);

        finalize.compensate(&ctx(), &input, finalized.output.as_ref()).unwrap();
        let id = Uuid::parse_str(draft_id.as_str().unwrap()).unwrap();
        assert_eq!(store.get(id).unwrap().status, DraftStatus::Draft);
        assert!(store.get(id).unwrap().finalized_at.is_none());
    }

    #[test]
    fn create_compensation_discards() {
        let store = Arc::new(DraftStore::in_memory());
        let create = DraftsCreateTool::new(store.clone(), clock());
        let created = create.call(&ctx(), &json!({"title": "t"}));
        create.compensate(&ctx(), &Value::Null, created.output.as_ref()).unwrap();
        assert!(store.list().is_empty());
    }

    #[test]
    fn bad_input_fails_softly() {
        let store = Arc::new(DraftStore::in_memory());
        assert!(!DraftsCreateTool::new(store.clone(), clock()).call(&ctx(), &json!({})).ok);
        assert!(!DraftsFinalizeTool::new(store, clock()).call(&ctx(), &json!({"draftId": "nope"})).ok);
    }

    #[test]
    fn directory_store_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = Arc::new(DraftStore::open(dir.path()).unwrap());
            let out = DraftsCreateTool::new(store.clone(), clock())
                .call(&ctx(), &json!({"title": "persisted"}))
                .output
                .unwrap();
            Uuid::parse_str(out["draftId"].as_str().unwrap()).unwrap()
        };
        let store = DraftStore::open(dir.path()).unwrap();
        let draft = store.get(id).unwrap();
        assert_eq!(draft.title, "persisted");
        assert_eq!(draft.tenant_id.as_deref(), Some("client-a"));
    }
}
