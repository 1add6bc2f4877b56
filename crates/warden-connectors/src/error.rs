// error.rs — Error types for data connectors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectorError {
    /// No connectors are registered for the tenant.
    #[error("no connectors registered for tenant '{tenant}'")]
    TenantNotRegistered { tenant: String },

    /// The tenant has connectors, but not for this source.
    #[error("tenant '{tenant}' has no connector for source '{source_name}'")]
    SourceNotFound { tenant: String, source_name: String },

    /// Reading the backing file failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A JSONL line did not parse.
    #[error("malformed row at {path}:{line}: {source}")]
    MalformedRow {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },

    /// The source holds something other than JSON objects.
    #[error("source '{source_name}' returned a non-object row")]
    NotAnObject { source_name: String },
}
