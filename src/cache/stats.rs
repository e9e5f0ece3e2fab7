//! Cache Statistics Module
//!
//! Counts lookups and writes made through a [`Cache`](crate::cache::Cache).

use serde::Serialize;

// == Cache Stats ==
/// Facade-level counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Lookups that found a live value
    pub hits: u64,
    /// Lookups that found nothing (absent, expired or unreadable)
    pub misses: u64,
    /// Values handed to the backend for storage
    pub writes: u64,
    /// Entries held by the default backend, when it can tell
    pub entries: Option<usize>,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Counts one lookup.
    pub fn record_lookup(&mut self, hit: bool) {
        if hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
    }

    pub fn record_write(&mut self) {
        self.writes += 1;
    }
}
