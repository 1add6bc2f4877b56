// log.rs — Append-only JSONL action log with a hash chain.
//
// One JSON object per line. Each entry carries `previous_hash`, the SHA-256
// of the raw JSON line before it, so inserting, deleting or editing a line
// breaks the chain and `verify_chain` reports the first broken link.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::entry::AuditLogEntry;
use crate::error::AuditError;
use crate::hasher;
use crate::logger::ActionLogger;

struct ChainState {
    writer: BufWriter<File>,
    /// Hash of the last line written — becomes the next entry's `previous_hash`.
    last_hash: Option<String>,
}

/// An [`ActionLogger`] backed by a JSONL file.
pub struct JsonlActionLogger {
    path: PathBuf,
    state: Mutex<ChainState>,
}

impl JsonlActionLogger {
    /// Open (or create) a log at the given path.
    ///
    /// If the file already has entries, the chain continues from the last one.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| AuditError::OpenFailed {
                    path: path.clone(),
                    source,
                })?;
            }
        }

        let last_hash = if path.exists() {
            Self::read_last_hash(&path)?
        } else {
            None
        };

        // Append mode: existing lines are never rewritten.
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| AuditError::OpenFailed {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            state: Mutex::new(ChainState {
                writer: BufWriter::new(file),
                last_hash,
            }),
        })
    }

    /// Return the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all entries from a log file, oldest first. Blank lines are skipped.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<AuditLogEntry>, AuditError> {
        let reader = open_reader(path.as_ref())?;
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }
        Ok(entries)
    }

    /// The last `n` entries of a log file, oldest first.
    pub fn tail(path: impl AsRef<Path>, n: usize) -> Result<Vec<AuditLogEntry>, AuditError> {
        let mut entries = Self::read_all(path)?;
        let skip = entries.len().saturating_sub(n);
        Ok(entries.split_off(skip))
    }

    /// Verify the hash chain of a log file.
    ///
    /// Returns the number of entries checked, or `IntegrityViolation` at the
    /// first line whose `previous_hash` does not match its predecessor.
    pub fn verify_chain(path: impl AsRef<Path>) -> Result<usize, AuditError> {
        let reader = open_reader(path.as_ref())?;
        let mut previous_hash: Option<String> = None;
        let mut checked = 0;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: AuditLogEntry = serde_json::from_str(&line)?;
            if entry.previous_hash != previous_hash {
                return Err(AuditError::IntegrityViolation {
                    line: line_num + 1,
                    expected: previous_hash.unwrap_or_else(|| "None".to_string()),
                    actual: entry.previous_hash.unwrap_or_else(|| "None".to_string()),
                });
            }
            // Hash the raw line, not a re-serialization.
            previous_hash = Some(hasher::hash_str(&line));
            checked += 1;
        }

        Ok(checked)
    }

    fn read_last_hash(path: &Path) -> Result<Option<String>, AuditError> {
        let reader = open_reader(path)?;
        let mut last_line: Option<String> = None;
        for line in reader.lines() {
            let line = line?;
            if !line.trim().is_empty() {
                last_line = Some(line);
            }
        }
        Ok(last_line.map(|line| hasher::hash_str(&line)))
    }
}

impl ActionLogger for JsonlActionLogger {
    fn append(&self, mut entry: AuditLogEntry) -> Result<(), AuditError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        entry.previous_hash = state.last_hash.clone();
        let json = serde_json::to_string(&entry)?;

        writeln!(state.writer, "{}", json)?;
        state.writer.flush()?;

        // Only advance the chain once the line is on disk.
        state.last_hash = Some(hasher::hash_str(&json));
        tracing::debug!(action = %entry.action, agent = %entry.agent_id, "audit entry appended");
        Ok(())
    }
}

fn open_reader(path: &Path) -> Result<BufReader<File>, AuditError> {
    let file = File::open(path).map_err(|source| AuditError::OpenFailed {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}
