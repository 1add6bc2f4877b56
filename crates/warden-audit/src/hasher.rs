// hasher.rs — SHA-256 hashing utilities.
//
// All hashes in Warden are SHA-256, hex-encoded. Structured values are
// hashed through a canonical JSON rendering (object keys sorted at every
// depth, no whitespace) so the digest does not depend on map iteration
// order or on which feature flags serde_json was compiled with.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::AuditError;

/// Hash arbitrary bytes, returning a lowercase hex-encoded SHA-256 string.
///
/// This is deterministic: the same input always produces the same output.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    // `format!("{:x}", ...)` produces lowercase hex
    format!("{:x}", result)
}

/// Hash a UTF-8 string, returning a lowercase hex-encoded SHA-256 string.
pub fn hash_str(s: &str) -> String {
    hash_bytes(s.as_bytes())
}

/// Render a JSON value with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Keys are plain strings; serde_json handles the escaping.
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Hash a JSON value through its canonical rendering.
pub fn hash_json(value: &Value) -> String {
    hash_str(&canonical_json(value))
}

/// Serialize any value to JSON and hash its canonical rendering.
pub fn hash_serializable<T: Serialize>(value: &T) -> Result<String, AuditError> {
    let json = serde_json::to_value(value)?;
    Ok(hash_json(&json))
}
