//! Request DTOs for the cache service API

use serde::Deserialize;
use serde_json::Value;

use crate::cache::Expiry;

/// Longest key accepted over HTTP
pub const MAX_KEY_LEN: usize = 256;

/// Request body for `PUT /cache`
///
/// `value` is any JSON document. Without `ttl` the backend's default expiry
/// applies; `ttl: 0` stores a value that is already expired.
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    pub value: Value,
    /// Optional lifetime in seconds
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LEN {
            return Some(format!(
                "Key exceeds maximum length of {} characters",
                MAX_KEY_LEN
            ));
        }
        None
    }

    /// Expiry to pass to the backend.
    pub fn expiry(&self) -> Expiry {
        self.ttl.map(Expiry::Seconds).unwrap_or_default()
    }
}
