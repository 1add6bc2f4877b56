// file_store.rs — JsonFileReviewStore: one JSON file per review request.
//
// Layout: `<store_dir>/<review_id>.json`. Every read-modify-write runs
// under a single in-process mutex, so compare-and-set holds for all callers
// sharing this store instance. Writes go to a temp file and are renamed into
// place so a crash never leaves a half-written record.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use uuid::Uuid;

use crate::error::ReviewError;
use crate::request::{ReviewRequest, ReviewStatus, ReviewTransition};
use crate::store::{consume_token, sort_and_filter, CommitLookup, ReviewStore};

pub struct JsonFileReviewStore {
    store_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileReviewStore {
    /// Create a store backed by `store_dir`, creating the directory if needed.
    pub fn new(store_dir: impl AsRef<Path>) -> Result<Self, ReviewError> {
        let store_dir = store_dir.as_ref().to_path_buf();
        fs::create_dir_all(&store_dir).map_err(|source| ReviewError::IoError {
            path: store_dir.display().to_string(),
            source,
        })?;
        Ok(Self {
            store_dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    fn review_file(&self, review_id: Uuid) -> PathBuf {
        self.store_dir.join(format!("{}.json", review_id))
    }

    fn read(&self, review_id: Uuid) -> Result<Option<ReviewRequest>, ReviewError> {
        let path = self.review_file(review_id);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path).map_err(|source| ReviewError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn write(&self, request: &ReviewRequest) -> Result<(), ReviewError> {
        let path = self.review_file(request.review_id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(request)?;
        fs::write(&tmp, json).map_err(|source| ReviewError::IoError {
            path: tmp.display().to_string(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| ReviewError::IoError {
            path: path.display().to_string(),
            source,
        })
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Load, mutate and write back one record under the store lock.
    fn update<T>(
        &self,
        review_id: Uuid,
        f: impl FnOnce(&mut ReviewRequest) -> Result<(T, bool), ReviewError>,
    ) -> Result<T, ReviewError> {
        let _guard = self.guard();
        let mut request = self.read(review_id)?.ok_or(ReviewError::NotFound(review_id))?;
        let (out, changed) = f(&mut request)?;
        if changed {
            self.write(&request)?;
        }
        Ok(out)
    }
}

impl ReviewStore for JsonFileReviewStore {
    fn create(&self, request: ReviewRequest) -> Result<(), ReviewError> {
        let _guard = self.guard();
        if self.review_file(request.review_id).exists() {
            return Err(ReviewError::AlreadyExists(request.review_id));
        }
        self.write(&request)
    }

    fn get(&self, review_id: Uuid) -> Result<Option<ReviewRequest>, ReviewError> {
        self.read(review_id)
    }

    fn list(&self, status: Option<ReviewStatus>) -> Result<Vec<ReviewRequest>, ReviewError> {
        let io_err = |source| ReviewError::IoError {
            path: self.store_dir.display().to_string(),
            source,
        };
        let mut requests = Vec::new();
        for entry in fs::read_dir(&self.store_dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let json = fs::read_to_string(&path).map_err(|source| ReviewError::IoError {
                    path: path.display().to_string(),
                    source,
                })?;
                match serde_json::from_str::<ReviewRequest>(&json) {
                    Ok(request) => requests.push(request),
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable review file"),
                }
            }
        }
        Ok(sort_and_filter(requests, status))
    }

    fn compare_and_set(
        &self,
        review_id: Uuid,
        expected: ReviewStatus,
        transition: ReviewTransition,
    ) -> Result<bool, ReviewError> {
        self.update(review_id, |request| {
            let applied = request.apply(expected, &transition);
            Ok((applied, applied))
        })
    }

    fn get_approved_for_commit(&self, review_id: Uuid, token: &str) -> Result<CommitLookup, ReviewError> {
        Ok(CommitLookup::evaluate(self.read(review_id)?.as_ref(), token))
    }

    fn mark_token_used(&self, review_id: Uuid) -> Result<(), ReviewError> {
        self.update(review_id, |request| consume_token(request).map(|()| ((), true)))
    }
}
