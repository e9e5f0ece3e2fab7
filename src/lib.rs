//! Polycache - pluggable caching with memory, disk and Redis backends
//!
//! Values are JSON documents stored under string keys with a lifetime.
//! A [`Cache`] routes operations to a named default backend and offers
//! typed helpers, `get_or_set` and memoization. Keys for memoized calls
//! come from a [`FingerprintBuilder`].

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod models;

pub use api::AppState;
pub use cache::{
    Cache, CacheBackend, CacheBuilder, DiskBackend, Expiry, MemoryBackend, Memoizer,
    RemoteBackend,
};
pub use config::Config;
pub use error::{CacheError, Result};
pub use fingerprint::FingerprintBuilder;
