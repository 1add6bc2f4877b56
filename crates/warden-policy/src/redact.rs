// redact.rs — Two-phase field filter over connector results.
//
// Phase 1 strips every deny_fields key from every row, unconditionally.
// Phase 2 projects onto allowed_fields when that list is non-empty.
// The order is fixed: a field that is both allowed and denied never leaves.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capability::CapabilityMap;
use crate::error::PolicyError;

/// Redacted rows plus what the audit trail needs to know about them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RedactedResult {
    pub rows: Vec<Value>,
    pub row_count: usize,
    /// Field names present in at least one returned row, sorted.
    pub fields_returned: Vec<String>,
}

pub(crate) fn redact_rows(
    rows: Vec<Value>,
    map: &CapabilityMap,
    operation_id: &str,
) -> Result<RedactedResult, PolicyError> {
    let cap = map
        .operation(operation_id)
        .ok_or_else(|| PolicyError::RedactionFailed {
            operation: operation_id.to_string(),
            detail: "operation is not in the tenant's capability map".to_string(),
        })?;
    let denied = cap.denied();
    let allowed = cap.allowed();

    let mut fields = BTreeSet::new();
    let mut out = Vec::with_capacity(rows.len());

    for (index, row) in rows.into_iter().enumerate() {
        let Value::Object(mut object) = row else {
            return Err(PolicyError::RedactionFailed {
                operation: operation_id.to_string(),
                detail: format!("row {} is not an object", index),
            });
        };

        object.retain(|key, _| !denied.contains(key));
        if !allowed.is_empty() {
            object.retain(|key, _| allowed.contains(key));
        }

        fields.extend(object.keys().cloned());
        out.push(Value::Object(object));
    }

    Ok(RedactedResult {
        row_count: out.len(),
        rows: out,
        fields_returned: fields.into_iter().collect(),
    })
}
