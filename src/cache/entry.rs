//! Cache Entry Module
//!
//! Defines the record held by the memory backend for each key.

use serde_json::Value;

// == Cache Entry ==
/// A single in-memory entry with expiry and recency metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored value
    pub value: Value,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
    /// Last access timestamp (Unix milliseconds)
    pub last_accessed_at: u64,
    /// Monotonic access tick, orders recency when timestamps tie
    pub access_tick: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry accessed at `now`.
    pub fn new(value: Value, expires_at: u64, now: u64, access_tick: u64) -> Self {
        Self {
            value,
            expires_at,
            last_accessed_at: now,
            access_tick,
        }
    }

    // == Is Expired ==
    /// An entry is expired once its deadline lies strictly in the past.
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expires_at < now
    }

    // == Touch ==
    /// Records an access at `now` with a fresh tick.
    pub fn touch(&mut self, now: u64, access_tick: u64) {
        self.last_accessed_at = now;
        self.access_tick = access_tick;
    }
}
