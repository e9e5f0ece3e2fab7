//! Expiry Module
//!
//! Requested entry lifetimes and their normalization to concrete seconds.

use std::time::{SystemTime, UNIX_EPOCH};

/// Lifetime used for entries stored with [`Expiry::Never`] (one year).
pub const NEVER_EXPIRE_SECS: u64 = 60 * 60 * 24 * 365;

// == Expiry ==
/// How long an entry should live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiry {
    /// Use the backend's configured default expiry
    #[default]
    Default,
    /// Effectively non-expiring (one year)
    Never,
    /// Explicit lifetime in seconds
    Seconds(u64),
}

impl Expiry {
    /// Resolves to a concrete number of seconds.
    pub fn resolve(self, default_expire: u64) -> u64 {
        match self {
            Expiry::Default => default_expire,
            Expiry::Never => NEVER_EXPIRE_SECS,
            Expiry::Seconds(secs) => secs,
        }
    }

    /// Resolves to an absolute deadline in Unix milliseconds, counted from `now_ms`.
    pub fn deadline_ms(self, default_expire: u64, now_ms: u64) -> u64 {
        now_ms.saturating_add(self.resolve(default_expire).saturating_mul(1000))
    }
}

impl From<u64> for Expiry {
    fn from(secs: u64) -> Self {
        Expiry::Seconds(secs)
    }
}

impl From<Option<u64>> for Expiry {
    fn from(secs: Option<u64>) -> Self {
        secs.map_or(Expiry::Never, Expiry::Seconds)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
