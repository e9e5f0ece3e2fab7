//! Cache Module
//!
//! Backend contract, the memory, disk and remote engines, and the facade
//! that fronts them.

mod backend;
mod disk;
mod entry;
mod expiry;
pub(crate) mod facade;
mod index;
mod memoize;
mod memory;
mod remote;
mod stats;


// Re-export public types
pub use backend::CacheBackend;
pub use disk::{DiskBackend, TX_SUFFIX};
pub use entry::CacheEntry;
pub use expiry::{current_timestamp_ms, Expiry, NEVER_EXPIRE_SECS};
pub use facade::{Cache, CacheBuilder, DEFAULT_BACKEND_NAME};
pub use index::PriorityIndex;
pub use memoize::Memoizer;
pub use memory::{MemoryBackend, DEFAULT_EXPIRE, DEFAULT_THRESHOLD};
pub use remote::{
    decode_value, encode_value, KeyValueStore, RedisConfig, RedisStore, RemoteBackend,
    VALUE_MARKER,
};
pub use stats::CacheStats;
