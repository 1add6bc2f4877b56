// sanitize.rs — Turn caller parameters into connector-safe parameters.
//
// Order matters:
//   1. Raw query-language input anywhere in the parameters → reject.
//   2. Operation not in the tenant's map → reject.
//   3. `limit` clamped to the tenant row cap.
//   4. Requested `fields` must avoid deny_fields and sit inside allowed_fields.
//   5. Declared params_schema checked.
// All of this happens before any connector is touched.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::capability::{CapabilityMap, OperationCapability};
use crate::error::PolicyError;

/// Parameter keys that carry free-form queries.
const RAW_QUERY_KEYS: &[&str] = &["sql", "query", "rawQuery", "raw_query", "raw"];

/// Parameters consumed by sanitization rather than passed through.
const RESERVED_KEYS: &[&str] = &["limit", "fields"];

/// Statements only count at the start of a value or after a `;`, so prose
/// such as "customers who select a plan from the page" passes.
fn query_markers() -> &'static Regex {
    static MARKERS: OnceLock<Regex> = OnceLock::new();
    MARKERS.get_or_init(|| {
        Regex::new(
            r"(?i)((^|;)\s*(select\b[\s\S]*\bfrom\b|(drop|truncate|alter)\s+table\b|insert\s+into\b|delete\s+from\b|update\s+\w+\s+set\b)|\bunion\s+(all\s+)?select\b|'\s*(;|--|or\s+'?\w+'?\s*=)|/\*[\s\S]*\*/)",
        )
        .expect("query marker pattern is valid")
    })
}

/// Limits handed to the connector alongside the parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryConstraints {
    /// Maximum rows the connector may return.
    pub max_rows: usize,
    /// Fields to return, when a projection applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

/// Parameters that passed sanitization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SanitizedParams {
    pub operation_id: String,
    /// Caller parameters minus the reserved `limit`/`fields` keys.
    pub params: Map<String, Value>,
    pub constraints: QueryConstraints,
}

pub(crate) fn sanitize_params(
    params: &Map<String, Value>,
    map: &CapabilityMap,
    operation_id: &str,
) -> Result<SanitizedParams, PolicyError> {
    if let Some(detail) = find_raw_query(&Value::Object(params.clone()), "") {
        return Err(PolicyError::SanitizationFailed {
            operation: operation_id.to_string(),
            detail,
        });
    }

    let cap = map
        .operation(operation_id)
        .ok_or_else(|| PolicyError::OperationNotAllowed {
            operation: operation_id.to_string(),
            detail: "operation is not in the tenant's capability map".to_string(),
        })?;

    let violation = |detail: String| PolicyError::ConstraintViolation {
        operation: operation_id.to_string(),
        detail,
    };

    let max_rows = match params.get("limit") {
        None | Some(Value::Null) => map.default_row_cap,
        Some(value) => match value.as_u64() {
            Some(0) | None => {
                return Err(violation(format!("limit must be a positive integer, got {}", value)))
            }
            Some(n) => (n as usize).min(map.default_row_cap),
        },
    };

    let fields = requested_fields(params, cap, &violation)?;

    if let Some(schema) = &cap.params_schema {
        for name in &schema.required {
            if !params.contains_key(name) {
                return Err(violation(format!("missing required parameter '{}'", name)));
            }
        }
        for (name, expected) in &schema.properties {
            if let Some(value) = params.get(name) {
                if !expected.matches(value) {
                    return Err(violation(format!(
                        "parameter '{}' must be of type {:?}",
                        name, expected
                    )));
                }
            }
        }
    }

    let passthrough = params
        .iter()
        .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Ok(SanitizedParams {
        operation_id: operation_id.to_string(),
        params: passthrough,
        constraints: QueryConstraints { max_rows, fields },
    })
}

fn requested_fields(
    params: &Map<String, Value>,
    cap: &OperationCapability,
    violation: &dyn Fn(String) -> PolicyError,
) -> Result<Option<Vec<String>>, PolicyError> {
    let allowed = cap.allowed();
    let requested = match params.get("fields") {
        None | Some(Value::Null) => {
            return Ok((!allowed.is_empty()).then(|| allowed.to_vec()));
        }
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| violation("fields must be a list of strings".to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(violation("fields must be a list of strings".to_string())),
    };

    if let Some(denied) = requested.iter().find(|f| cap.denied().contains(f)) {
        return Err(violation(format!("field '{}' is denied", denied)));
    }
    if !allowed.is_empty() {
        if let Some(outside) = requested.iter().find(|f| !allowed.contains(f)) {
            return Err(violation(format!("field '{}' is not in the allowed fields", outside)));
        }
    }
    Ok(Some(requested))
}

/// Locate raw query-language input; returns a description of the first hit.
fn find_raw_query(value: &Value, path: &str) -> Option<String> {
    match value {
        Value::Object(map) => map.iter().find_map(|(key, inner)| {
            let here = if path.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", path, key)
            };
            if RAW_QUERY_KEYS.contains(&key.as_str()) || key.starts_with('$') {
                return Some(format!("parameter '{}' carries a raw query", here));
            }
            find_raw_query(inner, &here)
        }),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .find_map(|(i, item)| find_raw_query(item, &format!("{}[{}]", path, i))),
        Value::String(s) if query_markers().is_match(s) => {
            Some(format!("parameter '{}' contains query-language markers", path))
        }
        _ => None,
    }
}
