//! Backend Contract
//!
//! The uniform interface every storage engine implements.

use serde_json::Value;

use crate::cache::Expiry;

// == Cache Backend ==
/// A concrete storage engine.
///
/// Implementations absorb their own storage faults: a failing read is a
/// miss and a failing write leaves the cache as if it never happened.
pub trait CacheBackend: Send + Sync {
    /// Short engine name used in logs.
    fn kind(&self) -> &'static str;

    /// Returns the live value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<Value>;

    /// Stores `value` under `key`, replacing any previous entry.
    fn set(&self, key: &str, value: Value, expiry: Expiry);

    /// Removes one key, or every entry when `key` is `None`.
    fn clear(&self, key: Option<&str>);

    /// Number of stored entries, when the engine can tell cheaply.
    fn len_hint(&self) -> Option<usize> {
        None
    }
}
