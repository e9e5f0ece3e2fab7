//! Configuration Module
//!
//! Loads cache and server settings from environment variables and turns them
//! into a ready [`Cache`].

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::info;

use crate::cache::{Cache, DiskBackend, MemoryBackend, RedisConfig, RemoteBackend};
use crate::error::{CacheError, Result};

// == Backend Kind ==
/// Which engine backs the default cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Memory,
    Disk,
    Redis,
}

impl FromStr for BackendKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "ram" => Ok(BackendKind::Memory),
            "disk" => Ok(BackendKind::Disk),
            "redis" => Ok(BackendKind::Redis),
            other => Err(CacheError::UnknownBackend(other.to_string())),
        }
    }
}

impl BackendKind {
    fn name(self) -> &'static str {
        match self {
            BackendKind::Memory => "ram",
            BackendKind::Disk => "disk",
            BackendKind::Redis => "redis",
        }
    }
}

/// Cache service configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Engine used for the default backend
    pub backend: BackendKind,
    /// Entry (memory) or file (disk) count threshold
    pub threshold: usize,
    /// Default expiry in seconds
    pub default_expire: u64,
    /// Key prefix for the memory backend
    pub prefix: String,
    /// Directory for the disk backend
    pub cache_dir: PathBuf,
    /// Connection settings for the Redis backend
    pub redis: RedisConfig,
    /// HTTP server port
    pub server_port: u16,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_BACKEND` - `memory`, `disk` or `redis` (default: memory)
    /// - `CACHE_THRESHOLD` - Entry/file count threshold (default: 500)
    /// - `CACHE_DEFAULT_EXPIRE` - Default expiry in seconds (default: 300)
    /// - `CACHE_PREFIX` - Memory backend key prefix (default: empty)
    /// - `CACHE_DIR` - Disk backend directory (default: cache)
    /// - `REDIS_HOST`, `REDIS_PORT`, `REDIS_PASSWORD`, `REDIS_DB`, `REDIS_PREFIX`
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    ///
    /// An unrecognized `CACHE_BACKEND` is an error rather than a silent
    /// fallback.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let backend = match env::var("CACHE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.backend,
        };

        Ok(Self {
            backend,
            threshold: env_or("CACHE_THRESHOLD", defaults.threshold),
            default_expire: env_or("CACHE_DEFAULT_EXPIRE", defaults.default_expire),
            prefix: env::var("CACHE_PREFIX").unwrap_or(defaults.prefix),
            cache_dir: env::var("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            redis: RedisConfig {
                host: env::var("REDIS_HOST").unwrap_or(defaults.redis.host),
                port: env_or("REDIS_PORT", defaults.redis.port),
                password: env::var("REDIS_PASSWORD").ok().filter(|p| !p.is_empty()),
                db: env_or("REDIS_DB", defaults.redis.db),
                prefix: env::var("REDIS_PREFIX").unwrap_or(defaults.redis.prefix),
            },
            server_port: env_or("SERVER_PORT", defaults.server_port),
        })
    }

    /// Constructs the configured backend and wraps it in a [`Cache`].
    ///
    /// Fails when the backend cannot reach what it needs (an unwritable
    /// directory, an unreachable Redis server).
    pub fn build_cache(&self) -> Result<Cache> {
        let name = self.backend.name();
        let builder = Cache::builder();
        let builder = match self.backend {
            BackendKind::Memory => builder.backend(
                name,
                MemoryBackend::new(self.threshold, self.default_expire).with_prefix(&self.prefix),
            ),
            BackendKind::Disk => builder.backend(
                name,
                DiskBackend::new(&self.cache_dir, self.threshold, self.default_expire)?,
            ),
            BackendKind::Redis => builder.backend(
                name,
                RemoteBackend::connect(&self.redis, self.default_expire)?,
            ),
        };
        info!(backend = name, "cache backend constructed");
        builder.build()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            threshold: 500,
            default_expire: 300,
            prefix: String::new(),
            cache_dir: PathBuf::from("cache"),
            redis: RedisConfig::default(),
            server_port: 3000,
        }
    }
}
