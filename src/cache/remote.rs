//! Remote Backend Module
//!
//! Thin adapter over a networked key-value store with native per-key
//! expiry. This layer only owns key prefixing and value encoding; expiry and
//! atomicity are the store's job, and no local lock is held.
//!
//! # Encoding
//! - integral numbers are stored as their decimal ASCII form
//! - everything else is stored as `b'!'` followed by the JSON encoding

use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{CacheBackend, Expiry};
use crate::error::{CacheError, Result, StorageFault};

/// Leading byte marking a JSON-encoded value
pub const VALUE_MARKER: u8 = b'!';

// == Value Encoding ==
/// Encodes a value for storage.
pub fn encode_value(value: &Value) -> std::result::Result<Vec<u8>, serde_json::Error> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(n.to_string().into_bytes()),
        other => {
            let mut out = vec![VALUE_MARKER];
            serde_json::to_writer(&mut out, other)?;
            Ok(out)
        }
    }
}

/// Decodes a stored value; anything undecodable reads as a miss.
pub fn decode_value(raw: &[u8]) -> Option<Value> {
    if let Some((&VALUE_MARKER, rest)) = raw.split_first() {
        return serde_json::from_slice(rest).ok();
    }
    let text = std::str::from_utf8(raw).ok()?;
    text.parse::<i64>()
        .map(Value::from)
        .or_else(|_| text.parse::<u64>().map(Value::from))
        .ok()
}

// == Key-Value Store ==
/// The commands the remote backend needs from its store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, StorageFault>;

    /// Writes `value` with a lifetime of `seconds`.
    fn set_ex(&self, key: &str, value: &[u8], seconds: u64) -> std::result::Result<(), StorageFault>;

    /// Lists keys matching a glob pattern.
    fn keys(&self, pattern: &str) -> std::result::Result<Vec<String>, StorageFault>;

    /// Deletes keys, returning how many existed.
    fn del(&self, keys: &[String]) -> std::result::Result<u64, StorageFault>;

    /// Deletes every key in the selected database.
    fn flush_db(&self) -> std::result::Result<(), StorageFault>;
}

// == Redis Store ==
/// Connection settings for [`RedisStore`].
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    /// Logical database index
    pub db: i64,
    /// Prepended to every key
    pub prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            db: 0,
            prefix: "cache:".to_string(),
        }
    }
}

impl RedisConfig {
    /// Builds the `redis://` connection URL.
    pub fn url(&self) -> String {
        let auth = self
            .password
            .as_deref()
            .map(|p| format!(":{}@", urlencoding::encode(p)))
            .unwrap_or_default();
        format!("redis://{}{}:{}/{}", auth, self.host, self.port, self.db)
    }
}

impl From<redis::RedisError> for StorageFault {
    fn from(err: redis::RedisError) -> Self {
        StorageFault::Remote(err.to_string())
    }
}

/// [`KeyValueStore`] backed by a Redis server.
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    /// Opens a client and checks the server answers `PING`.
    pub fn connect(config: &RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url())
            .map_err(|e| CacheError::unavailable("redis", e))?;
        let mut conn = client
            .get_connection()
            .map_err(|e| CacheError::unavailable("redis", e))?;
        let pong: String = redis::cmd("PING")
            .query(&mut conn)
            .map_err(|e| CacheError::unavailable("redis", e))?;
        if pong != "PONG" {
            return Err(CacheError::unavailable(
                "redis",
                format!("unexpected PING reply: {}", pong),
            ));
        }
        Ok(Self { client })
    }

    fn conn(&self) -> std::result::Result<redis::Connection, StorageFault> {
        Ok(self.client.get_connection()?)
    }
}

impl KeyValueStore for RedisStore {
    fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, StorageFault> {
        Ok(redis::cmd("GET").arg(key).query(&mut self.conn()?)?)
    }

    fn set_ex(&self, key: &str, value: &[u8], seconds: u64) -> std::result::Result<(), StorageFault> {
        redis::cmd("SETEX")
            .arg(key)
            .arg(seconds)
            .arg(value)
            .query::<()>(&mut self.conn()?)?;
        Ok(())
    }

    fn keys(&self, pattern: &str) -> std::result::Result<Vec<String>, StorageFault> {
        Ok(redis::cmd("KEYS").arg(pattern).query(&mut self.conn()?)?)
    }

    fn del(&self, keys: &[String]) -> std::result::Result<u64, StorageFault> {
        if keys.is_empty() {
            return Ok(0);
        }
        Ok(redis::cmd("DEL").arg(keys).query(&mut self.conn()?)?)
    }

    fn flush_db(&self) -> std::result::Result<(), StorageFault> {
        redis::cmd("FLUSHDB").query::<()>(&mut self.conn()?)?;
        Ok(())
    }
}

// == Remote Backend ==
/// Cache backend delegating storage and expiry to a [`KeyValueStore`].
///
/// **Warning:** `clear(None)` on a backend configured without a prefix
/// issues `FLUSHDB` and wipes the whole database, including keys this
/// cache never wrote.
pub struct RemoteBackend<S: KeyValueStore = RedisStore> {
    store: S,
    prefix: String,
    /// Default expiry in seconds
    default_expire: u64,
}

impl RemoteBackend<RedisStore> {
    /// Connects to Redis; failure to reach the server is fatal here.
    pub fn connect(config: &RedisConfig, default_expire: u64) -> Result<Self> {
        let store = RedisStore::connect(config)?;
        Ok(Self::with_store(store, config.prefix.clone(), default_expire))
    }
}

impl<S: KeyValueStore> RemoteBackend<S> {
    // == Constructor ==
    pub fn with_store(store: S, prefix: impl Into<String>, default_expire: u64) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            default_expire,
        }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn delete_matching(&self, pattern: &str) -> std::result::Result<u64, StorageFault> {
        let keys = self.store.keys(pattern)?;
        self.store.del(&keys)
    }
}

impl<S: KeyValueStore> CacheBackend for RemoteBackend<S> {
    fn kind(&self) -> &'static str {
        "remote"
    }

    // == Get ==
    fn get(&self, key: &str) -> Option<Value> {
        match self.store.get(&self.prefixed(key)) {
            Ok(raw) => raw.as_deref().and_then(decode_value),
            Err(err) => {
                warn!(key = %key, error = %err, "remote cache read failed");
                None
            }
        }
    }

    // == Set ==
    fn set(&self, key: &str, value: Value, expiry: Expiry) {
        let key = self.prefixed(key);
        let seconds = expiry.resolve(self.default_expire);
        let encoded = match encode_value(&value) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(key = %key, error = %err, "could not encode remote cache value");
                return;
            }
        };

        // SETEX rejects a zero lifetime; such an entry is dead on arrival
        let result = if seconds == 0 {
            self.store.del(&[key.clone()]).map(|_| ())
        } else {
            self.store.set_ex(&key, &encoded, seconds)
        };
        if let Err(err) = result {
            warn!(key = %key, error = %err, "dropped remote cache write");
        }
    }

    // == Clear ==
    fn clear(&self, key: Option<&str>) {
        let result = match key {
            Some(key) if key.ends_with('*') => self.delete_matching(&self.prefixed(key)),
            Some(key) => self.store.del(&[self.prefixed(key)]),
            None if !self.prefix.is_empty() => {
                self.delete_matching(&format!("{}*", self.prefix))
            }
            None => {
                warn!("clearing remote cache without a prefix flushes the whole database");
                self.store.flush_db().map(|_| 0)
            }
        };
        match result {
            Ok(removed) => debug!(removed, "cleared remote cache keys"),
            Err(err) => warn!(error = %err, "remote cache clear failed"),
        }
    }
}
