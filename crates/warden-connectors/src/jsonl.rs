// jsonl.rs — JsonlConnector: rows read from a JSON Lines file.
//
// The file is re-read on every call so external writers are picked up
// without a restart. Blank lines are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde_json::{Map, Value};

use warden_policy::QueryConstraints;

use crate::connector::{evaluate, Connector, ConnectorResult, ExecutionMetrics, ResultMetadata};
use crate::error::ConnectorError;

pub struct JsonlConnector {
    path: PathBuf,
}

impl JsonlConnector {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_rows(&self) -> Result<Vec<Value>, ConnectorError> {
        let io_err = |source| ConnectorError::Io {
            path: self.path.clone(),
            source,
        };
        let file = File::open(&self.path).map_err(io_err)?;
        let mut rows = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(io_err)?;
            if line.trim().is_empty() {
                continue;
            }
            let row = serde_json::from_str(&line).map_err(|source| ConnectorError::MalformedRow {
                path: self.path.clone(),
                line: index + 1,
                source,
            })?;
            rows.push(row);
        }
        Ok(rows)
    }
}

impl Connector for JsonlConnector {
    fn source_type(&self) -> &str {
        "jsonl"
    }

    fn execute_read_model(
        &self,
        operation_id: &str,
        params: &Map<String, Value>,
        constraints: &QueryConstraints,
    ) -> Result<ConnectorResult, ConnectorError> {
        let started = Instant::now();
        let rows = self.load_rows()?;
        let (data, fields_returned) = evaluate(rows, params, constraints, self.source_type())?;
        tracing::debug!(
            operation_id,
            path = %self.path.display(),
            rows = data.len(),
            "jsonl read model executed"
        );
        Ok(ConnectorResult {
            metadata: ResultMetadata {
                source_type: self.source_type().to_string(),
                row_count: data.len(),
                fields_returned,
            },
            data,
            execution_metrics: ExecutionMetrics {
                latency_ms: started.elapsed().as_millis() as u64,
            },
        })
    }
}
