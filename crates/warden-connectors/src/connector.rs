// connector.rs — The Connector trait and the shape of a read-model result.
//
// Connectors are read-only. The only entry point is `execute_read_model`,
// which receives parameters that already passed sanitization together with
// the constraints the policy engine derived from the tenant's capability map.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use warden_policy::QueryConstraints;

use crate::error::ConnectorError;

/// One read-only data source for one tenant.
pub trait Connector: Send + Sync {
    /// Short label for the kind of source ("memory", "jsonl", "crm", ...).
    fn source_type(&self) -> &str;

    /// Run a read model and return at most `constraints.max_rows` rows.
    fn execute_read_model(
        &self,
        operation_id: &str,
        params: &Map<String, Value>,
        constraints: &QueryConstraints,
    ) -> Result<ConnectorResult, ConnectorError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    pub source_type: String,
    pub row_count: usize,
    pub fields_returned: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionMetrics {
    pub latency_ms: u64,
}

/// Rows returned by a connector, before redaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorResult {
    pub data: Vec<Value>,
    pub metadata: ResultMetadata,
    pub execution_metrics: ExecutionMetrics,
}

/// Shared read-model evaluation for row-backed connectors.
///
/// Scalar parameters (string, number, bool) are equality filters on the
/// row field of the same name, so `clientId` pins rows to one tenant. Rows
/// lacking a filtered field never match. Non-scalar parameters are ignored.
/// The row cap is applied after filtering; a field projection, when given,
/// is applied last.
pub(crate) fn evaluate<I>(
    rows: I,
    params: &Map<String, Value>,
    constraints: &QueryConstraints,
    source_name: &str,
) -> Result<(Vec<Value>, Vec<String>), ConnectorError>
where
    I: IntoIterator<Item = Value>,
{
    let filters: Vec<(&String, &Value)> = params
        .iter()
        .filter(|(_, v)| v.is_string() || v.is_number() || v.is_boolean())
        .collect();

    let mut out = Vec::new();
    let mut fields = BTreeSet::new();

    for row in rows {
        if out.len() >= constraints.max_rows {
            break;
        }
        let Value::Object(object) = row else {
            return Err(ConnectorError::NotAnObject {
                source_name: source_name.to_string(),
            });
        };
        if !filters.iter().all(|(k, v)| object.get(*k) == Some(*v)) {
            continue;
        }
        let object = match &constraints.fields {
            Some(projection) => object
                .into_iter()
                .filter(|(k, _)| projection.contains(k))
                .collect(),
            None => object,
        };
        fields.extend(object.keys().cloned());
        out.push(Value::Object(object));
    }

    Ok((out, fields.into_iter().collect()))
}
