//! Cache invalidation and clock ports

use std::fmt;

use serde::{Deserialize, Serialize};

/// Cached views refreshed after money moves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheScope {
    Station,
    Funding,
    Allocation,
    Wallet,
}

impl CacheScope {
    /// Every view touched by a balance change
    pub const BALANCE_VIEWS: [CacheScope; 4] = [
        CacheScope::Station,
        CacheScope::Funding,
        CacheScope::Allocation,
        CacheScope::Wallet,
    ];
}

impl fmt::Display for CacheScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CacheScope::Station => "station",
            CacheScope::Funding => "funding",
            CacheScope::Allocation => "allocation",
            CacheScope::Wallet => "wallet",
        };
        f.write_str(s)
    }
}

/// Fire-and-forget refresh signal
///
/// Implementations must not block; the core never waits on a refresh for
/// its own correctness.
pub trait CacheInvalidator: Send + Sync {
    fn invalidate(&self, scope: CacheScope);
}

/// Wall clock source, injectable for deterministic tests
pub trait Clock: Send + Sync {
    fn now_epoch_ms(&self) -> i64;
}
