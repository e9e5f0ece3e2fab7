//! Cache Facade Module
//!
//! Aggregates named backends behind one entry point. Every operation goes to
//! the default backend; the others stay reachable by name.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{CacheBackend, CacheStats, Expiry, MemoryBackend, Memoizer};
use crate::error::{CacheError, Result};

/// Name given to the backend created when none is registered
pub const DEFAULT_BACKEND_NAME: &str = "ram";

// == Typed Helpers ==
/// Reads and decodes a value; one that does not decode as `T` is a miss.
pub(crate) fn fetch<T: DeserializeOwned>(backend: &dyn CacheBackend, key: &str) -> Option<T> {
    let value = backend.get(key)?;
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            debug!(key = %key, error = %err, "cached value has an unexpected shape");
            None
        }
    }
}

/// Encodes and stores a value. Returns false if it could not be encoded.
pub(crate) fn store<T: Serialize>(
    backend: &dyn CacheBackend,
    key: &str,
    value: &T,
    expiry: Expiry,
) -> bool {
    match serde_json::to_value(value) {
        Ok(encoded) => {
            backend.set(key, encoded, expiry);
            true
        }
        Err(err) => {
            warn!(key = %key, error = %err, "value not cacheable, skipping write");
            false
        }
    }
}

/// Returns the cached value, or produces, stores and returns a fresh one.
///
/// Not atomic: two callers missing on the same key at the same time both
/// run `producer` and both write; the last write wins.
pub(crate) fn get_or_set_with<T, F>(
    backend: &dyn CacheBackend,
    key: &str,
    producer: F,
    expiry: Expiry,
) -> (T, bool)
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> T,
{
    if let Some(value) = fetch(backend, key) {
        return (value, true);
    }
    let value = producer();
    store(backend, key, &value, expiry);
    (value, false)
}

// == Cache ==
/// Uniform entry point over one or more named backends.
pub struct Cache {
    backends: Vec<(String, Arc<dyn CacheBackend>)>,
    default_name: String,
    default: Arc<dyn CacheBackend>,
    stats: Mutex<CacheStats>,
}

impl Cache {
    /// Starts building a cache.
    pub fn builder() -> CacheBuilder {
        CacheBuilder::default()
    }

    /// A cache with a single backend.
    pub fn with_backend(name: impl Into<String>, backend: impl CacheBackend + 'static) -> Self {
        let name = name.into();
        let backend: Arc<dyn CacheBackend> = Arc::new(backend);
        Self {
            backends: vec![(name.clone(), backend.clone())],
            default_name: name,
            default: backend,
            stats: Mutex::new(CacheStats::new()),
        }
    }

    /// Returns a backend by name.
    pub fn backend(&self, name: &str) -> Option<Arc<dyn CacheBackend>> {
        self.backends
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| b.clone())
    }

    /// Returns the default backend.
    pub fn default_backend(&self) -> &Arc<dyn CacheBackend> {
        &self.default
    }

    pub fn default_backend_name(&self) -> &str {
        &self.default_name
    }

    /// Registered backend names, in registration order.
    pub fn backend_names(&self) -> impl Iterator<Item = &str> {
        self.backends.iter().map(|(n, _)| n.as_str())
    }

    // == Get ==
    pub fn get(&self, key: &str) -> Option<Value> {
        let value = self.default.get(key);
        self.stats.lock().record_lookup(value.is_some());
        value
    }

    /// Reads a value and decodes it as `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = fetch(&*self.default, key);
        self.stats.lock().record_lookup(value.is_some());
        value
    }

    // == Set ==
    pub fn set(&self, key: &str, value: Value, expiry: impl Into<Expiry>) {
        self.default.set(key, value, expiry.into());
        self.stats.lock().record_write();
    }

    /// Encodes `value` and stores it; values that cannot be encoded are
    /// skipped.
    pub fn set_as<T: Serialize>(&self, key: &str, value: &T, expiry: impl Into<Expiry>) {
        if store(&*self.default, key, value, expiry.into()) {
            self.stats.lock().record_write();
        }
    }

    // == Get Or Set ==
    /// Returns the cached value under `key`, or calls `producer` once,
    /// caches its result and returns it.
    ///
    /// Concurrent callers missing on the same key may each call `producer`.
    pub fn get_or_set<T, F>(&self, key: &str, producer: F, expiry: impl Into<Expiry>) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        let (value, hit) = get_or_set_with(&*self.default, key, producer, expiry.into());
        let mut stats = self.stats.lock();
        stats.record_lookup(hit);
        if !hit {
            stats.record_write();
        }
        value
    }

    // == Clear ==
    pub fn clear(&self, key: Option<&str>) {
        self.default.clear(key);
    }

    // == Memoize ==
    /// Builds a memoizer storing into the default backend. Without a key,
    /// the wrapped function's path and call site form the key base.
    pub fn memoize(&self, key: Option<&str>, expiry: impl Into<Expiry>) -> Memoizer {
        Memoizer::new(self.default.clone(), key.map(str::to_string), expiry.into())
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.lock().clone();
        stats.entries = self.default.len_hint();
        stats
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::with_backend(DEFAULT_BACKEND_NAME, MemoryBackend::default())
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("backends", &self.backend_names().collect::<Vec<_>>())
            .field("default", &self.default_name)
            .finish()
    }
}

// == Cache Builder ==
/// Registers backends and picks the default.
#[derive(Default)]
pub struct CacheBuilder {
    backends: Vec<(String, Arc<dyn CacheBackend>)>,
    default_name: Option<String>,
}

impl CacheBuilder {
    /// Registers a backend; a repeated name replaces the earlier one.
    pub fn backend(self, name: impl Into<String>, backend: impl CacheBackend + 'static) -> Self {
        self.shared_backend(name, Arc::new(backend))
    }

    /// Registers a backend that is also held elsewhere.
    pub fn shared_backend(mut self, name: impl Into<String>, backend: Arc<dyn CacheBackend>) -> Self {
        let name = name.into();
        match self.backends.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = backend,
            None => self.backends.push((name, backend)),
        }
        self
    }

    /// Picks the default backend; otherwise the first registered one is used.
    pub fn default_backend(mut self, name: impl Into<String>) -> Self {
        self.default_name = Some(name.into());
        self
    }

    pub fn build(mut self) -> Result<Cache> {
        if self.backends.is_empty() {
            self.backends.push((
                DEFAULT_BACKEND_NAME.to_string(),
                Arc::new(MemoryBackend::default()),
            ));
        }

        let default_name = match self.default_name {
            Some(name) => name,
            None => self.backends[0].0.clone(),
        };
        let default = self
            .backends
            .iter()
            .find(|(n, _)| *n == default_name)
            .map(|(_, b)| b.clone())
            .ok_or_else(|| CacheError::UnknownBackend(default_name.clone()))?;

        debug!(
            backend = %default_name,
            kind = default.kind(),
            "cache facade ready"
        );
        Ok(Cache {
            backends: self.backends,
            default_name,
            default,
            stats: Mutex::new(CacheStats::new()),
        })
    }
}
