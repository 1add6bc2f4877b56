// memory.rs — InMemoryConnector: fixture rows held in memory.

use std::time::Instant;

use serde_json::{Map, Value};

use warden_policy::QueryConstraints;

use crate::connector::{evaluate, Connector, ConnectorResult, ExecutionMetrics, ResultMetadata};
use crate::error::ConnectorError;

/// Serves every read model from one fixed set of rows.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConnector {
    rows: Vec<Value>,
}

impl InMemoryConnector {
    pub fn new(rows: Vec<Value>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Value] {
        &self.rows
    }
}

impl Connector for InMemoryConnector {
    fn source_type(&self) -> &str {
        "memory"
    }

    fn execute_read_model(
        &self,
        operation_id: &str,
        params: &Map<String, Value>,
        constraints: &QueryConstraints,
    ) -> Result<ConnectorResult, ConnectorError> {
        let started = Instant::now();
        let (data, fields_returned) =
            evaluate(self.rows.iter().cloned(), params, constraints, self.source_type())?;
        tracing::debug!(operation_id, rows = data.len(), "in-memory read model executed");
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
