// token.rs — Single-use commit tokens.
//
// A token is 32 random bytes, URL-safe base64 without padding. The raw
// token is handed to the approver exactly once; stores keep only the
// SHA-256 hex digest.

use base64::Engine;
use rand::Rng;

use warden_audit::hasher;

/// Generate a fresh commit token.
pub fn generate() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// The stored form of a token.
pub fn hash(token: &str) -> String {
    hasher::hash_str(token)
}

/// Whether `token` hashes to `stored_hash`.
pub fn matches(token: &str, stored_hash: &str) -> bool {
    hash(token) == stored_hash
}
