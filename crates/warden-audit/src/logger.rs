// logger.rs — The ActionLogger sink trait and an in-memory implementation.
//
// Callers decide whether a failed append is fatal. Write paths (review
// resolution, commit execution) abort and compensate; read-path diagnostics
// log a warning and move on.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::entry::AuditLogEntry;
use crate::error::AuditError;

/// Append-only audit sink.
///
/// `append` takes `&self` so a single logger can be shared (`Arc<dyn
/// ActionLogger>`) by the orchestrator, the review service and tool handlers.
pub trait ActionLogger: Send + Sync {
    /// Persist one entry. An `Err` means the entry was NOT recorded.
    fn append(&self, entry: AuditLogEntry) -> Result<(), AuditError>;
}

/// Keeps entries in memory. Used by tests and by dry runs.
///
/// Appends for actions registered with [`MemoryActionLogger::fail_on`] are
/// rejected, which lets tests exercise the mandatory-logging rollback paths.
#[derive(Debug, Default)]
pub struct MemoryActionLogger {
    entries: Mutex<Vec<AuditLogEntry>>,
    failing_actions: Mutex<HashSet<String>>,
}

impl MemoryActionLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every future append whose action equals `action`.
    pub fn fail_on(&self, action: impl Into<String>) {
        self.failing_actions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(action.into());
    }

    /// Snapshot of everything recorded so far, oldest first.
    pub fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Entries with the given action, oldest first.
    pub fn entries_for(&self, action: &str) -> Vec<AuditLogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.action == action)
            .collect()
    }

    /// The recorded actions in order.
    pub fn actions(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.action).collect()
    }
}

impl ActionLogger for MemoryActionLogger {
    fn append(&self, entry: AuditLogEntry) -> Result<(), AuditError> {
        let failing = self
            .failing_actions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&entry.action);
        if failing {
            return Err(AuditError::Rejected {
                action: entry.action,
                reason: "injected failure".to_string(),
            });
        }
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry);
        Ok(())
    }
}
