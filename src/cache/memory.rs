//! Memory Backend Module
//!
//! Bounded, TTL-aware process-local store. Entries live in a map while two
//! ordered indices track expiry order and recency order; all three are
//! mutated together under one mutex.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::cache::expiry::current_timestamp_ms;
use crate::cache::{CacheBackend, CacheEntry, Expiry, PriorityIndex};

/// Default capacity threshold
pub const DEFAULT_THRESHOLD: usize = 500;

/// Default expiry in seconds
pub const DEFAULT_EXPIRE: u64 = 300;

// == Memory State ==
#[derive(Debug, Default)]
struct MemoryState {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// (expires_at, key) tuples
    by_expiry: PriorityIndex,
    /// (access_tick, key) tuples
    by_access: PriorityIndex,
    /// Source of access ticks
    next_tick: u64,
    /// Entries removed to satisfy the threshold
    evictions: u64,
}

impl MemoryState {
    fn tick(&mut self) -> u64 {
        self.next_tick += 1;
        self.next_tick
    }

    /// Removes an entry together with both of its index tuples.
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.by_expiry.remove(entry.expires_at, key);
        self.by_access.remove(entry.access_tick, key);
        Some(entry)
    }

    /// Drops every entry whose deadline lies strictly in the past.
    fn prune_expired(&mut self, now: u64) {
        while let Some(expires_at) = self.by_expiry.peek().map(|(exp, _)| exp) {
            if expires_at >= now {
                break;
            }
            if let Some((_, key)) = self.by_expiry.pop() {
                if let Some(entry) = self.entries.remove(&key) {
                    self.by_access.remove(entry.access_tick, &key);
                }
            }
        }
    }

    /// Evicts least-recently-accessed entries until at most `capacity` remain.
    fn evict_to(&mut self, capacity: usize) {
        while self.entries.len() > capacity {
            let Some((_, key)) = self.by_access.pop() else {
                break;
            };
            if let Some(entry) = self.entries.remove(&key) {
                self.by_expiry.remove(entry.expires_at, &key);
                self.evictions += 1;
                debug!(key = %key, "evicted least recently used entry");
            }
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.by_expiry.clear();
        self.by_access.clear();
    }
}

// == Memory Backend ==
/// In-process cache with TTL expiry and an LRU capacity bound.
#[derive(Debug)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    /// Maximum number of entries held at once
    threshold: usize,
    /// Default expiry in seconds
    default_expire: u64,
    /// Prepended to every key
    prefix: String,
}

impl MemoryBackend {
    // == Constructor ==
    /// Creates a new MemoryBackend with the given capacity threshold and
    /// default expiry in seconds.
    pub fn new(threshold: usize, default_expire: u64) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            threshold,
            default_expire,
            prefix: String::new(),
        }
    }

    /// Sets the key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Returns the number of entries, expired or not.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries evicted to satisfy the threshold so far.
    pub fn evictions(&self) -> u64 {
        self.state.lock().evictions
    }

    /// Returns `(map, expiry index, access index)` sizes.
    #[cfg(test)]
    pub(crate) fn structure_sizes(&self) -> (usize, usize, usize) {
        let state = self.state.lock();
        (
            state.entries.len(),
            state.by_expiry.len(),
            state.by_access.len(),
        )
    }

    /// Returns true when the map and both indices hold the same key set.
    #[cfg(test)]
    pub(crate) fn structures_consistent(&self) -> bool {
        use std::collections::HashSet;

        let state = self.state.lock();
        let map_keys: HashSet<&str> = state.entries.keys().map(String::as_str).collect();
        let exp_keys: HashSet<&str> = state.by_expiry.keys().collect();
        let acc_keys: HashSet<&str> = state.by_access.keys().collect();
        state.by_expiry.len() == map_keys.len()
            && state.by_access.len() == map_keys.len()
            && map_keys == exp_keys
            && map_keys == acc_keys
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, DEFAULT_EXPIRE)
    }
}

impl CacheBackend for MemoryBackend {
    fn kind(&self) -> &'static str {
        "memory"
    }

    // == Get ==
    /// Expired entries read as a miss but stay in place until the next prune.
    fn get(&self, key: &str) -> Option<Value> {
        let key = self.prefixed(key);
        let now = current_timestamp_ms();
        let mut state = self.state.lock();

        let (expired, old_tick) = {
            let entry = state.entries.get(&key)?;
            (entry.is_expired_at(now), entry.access_tick)
        };
        if expired {
            return None;
        }

        let tick = state.tick();
        state.by_access.remove(old_tick, &key);
        state.by_access.insert(tick, &key);
        let entry = state.entries.get_mut(&key)?;
        entry.touch(now, tick);
        Some(entry.value.clone())
    }

    // == Set ==
    fn set(&self, key: &str, value: Value, expiry: Expiry) {
        let key = self.prefixed(key);
        let now = current_timestamp_ms();
        let expires_at = expiry.deadline_ms(self.default_expire, now);
        let mut state = self.state.lock();

        state.prune_expired(now);
        state.remove(&key);
        if self.threshold == 0 {
            debug!(key = %key, "zero-capacity cache, write dropped");
            return;
        }
        // Make room for the incoming entry so the threshold is never exceeded
        state.evict_to(self.threshold.saturating_sub(1));

        let tick = state.tick();
        state.by_expiry.insert(expires_at, &key);
        state.by_access.insert(tick, &key);
        state
            .entries
            .insert(key, CacheEntry::new(value, expires_at, now, tick));
    }

    // == Clear ==
    fn clear(&self, key: Option<&str>) {
        let mut state = self.state.lock();
        match key {
            Some(key) => {
                state.remove(&self.prefixed(key));
            }
            None => state.clear(),
        }
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.len())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_backend_new() {
        let backend = MemoryBackend::new(100, 300);
        assert!(backend.is_empty());
        assert_eq!(backend.structure_sizes(), (0, 0, 0));
    }

    #[test]
    fn test_set_and_get() {
        let backend = MemoryBackend::new(100, 300);

        backend.set("key1", json!("value1"), Expiry::Default);
        assert_eq!(backend.get("key1"), Some(json!("value1")));
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn test_get_nonexistent() {
        let backend = MemoryBackend::new(100, 300);
        assert_eq!(backend.get("nonexistent"), None);
    }

    #[test]
    fn test_overwrite_keeps_one_tuple_per_index() {
        let backend = MemoryBackend::new(100, 300);

        backend.set("key1", json!(1), Expiry::Seconds(10));
        backend.set("key1", json!(2), Expiry::Seconds(20));

        assert_eq!(backend.get("key1"), Some(json!(2)));
        assert_eq!(backend.structure_sizes(), (1, 1, 1));
        assert!(backend.structures_consistent());
    }

    #[test]
    fn test_expired_entry_is_a_miss_but_lingers() {
        let backend = MemoryBackend::new(100, 300);

        backend.set("key1", json!("v"), Expiry::Seconds(1));
        assert!(backend.get("key1").is_some());

        sleep(Duration::from_millis(1100));

        assert_eq!(backend.get("key1"), None);
        // Lazy expiry: still stored until the next prune
        assert_eq!(backend.len(), 1);

        backend.set("key2", json!("w"), Expiry::Default);
        assert_eq!(backend.len(), 1);
        assert!(backend.structures_consistent());
    }

    #[test]
    fn test_lru_eviction_scenario() {
        let backend = MemoryBackend::new(2, 300);

        backend.set("a", json!(1), Expiry::Seconds(100));
        backend.set("b", json!(2), Expiry::Seconds(100));
        backend.get("a");
        backend.set("c", json!(3), Expiry::Seconds(100));

        assert_eq!(backend.get("a"), Some(json!(1)));
        assert_eq!(backend.get("c"), Some(json!(3)));
        assert_eq!(backend.get("b"), None);
        assert_eq!(backend.len(), 2);
        assert_eq!(backend.evictions(), 1);
        assert!(backend.structures_consistent());
    }

    #[test]
    fn test_overwrite_at_capacity_does_not_evict() {
        let backend = MemoryBackend::new(2, 300);

        backend.set("a", json!(1), Expiry::Default);
        backend.set("b", json!(2), Expiry::Default);
        backend.set("a", json!(10), Expiry::Default);

        assert_eq!(backend.get("a"), Some(json!(10)));
        assert_eq!(backend.get("b"), Some(json!(2)));
        assert_eq!(backend.evictions(), 0);
    }

    #[test]
    fn test_zero_threshold_holds_nothing() {
        let backend = MemoryBackend::new(0, 300);

        backend.set("a", json!(1), Expiry::Default);
        backend.set("a", json!(2), Expiry::Default);

        assert_eq!(backend.len(), 0);
        assert_eq!(backend.get("a"), None);
        assert!(backend.structures_consistent());
    }

    #[test]
    fn test_expired_entries_go_before_live_ones() {
        let backend = MemoryBackend::new(2, 300);

        backend.set("short", json!(1), Expiry::Seconds(0));
        backend.set("long", json!(2), Expiry::Seconds(100));
        sleep(Duration::from_millis(20));
        // "short" is both expired and least recently used; only it goes
        backend.set("new", json!(3), Expiry::Seconds(100));

        assert_eq!(backend.len(), 2);
        assert_eq!(backend.get("long"), Some(json!(2)));
        assert_eq!(backend.evictions(), 0);
    }

    #[test]
    fn test_clear_single_key() {
        let backend = MemoryBackend::new(100, 300);

        backend.set("key1", json!(1), Expiry::Default);
        backend.set("key2", json!(2), Expiry::Default);
        backend.clear(Some("key1"));

        assert_eq!(backend.get("key1"), None);
        assert_eq!(backend.get("key2"), Some(json!(2)));
        assert_eq!(backend.structure_sizes(), (1, 1, 1));

        // Clearing an absent key is a no-op
        backend.clear(Some("missing"));
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn test_clear_all() {
        let backend = MemoryBackend::new(100, 300);

        backend.set("key1", json!(1), Expiry::Default);
        backend.set("key2", json!(2), Expiry::Default);
        backend.clear(None);

        assert!(backend.is_empty());
        assert_eq!(backend.structure_sizes(), (0, 0, 0));
    }

    #[test]
    fn test_prefix_is_invisible() {
        let backend = MemoryBackend::new(100, 300).with_prefix("app:");

        backend.set("key", json!("v"), Expiry::Default);
        assert_eq!(backend.get("key"), Some(json!("v")));
        backend.clear(Some("key"));
        assert_eq!(backend.get("key"), None);
    }

    #[test]
    fn test_instances_do_not_share_state() {
        let first = MemoryBackend::new(100, 300);
        let second = MemoryBackend::new(100, 300);

        first.set("key", json!(1), Expiry::Default);
        assert_eq!(second.get("key"), None);
    }
}
