//! Engine statistics.
//!
//! Decision counters live on the engine as relaxed atomics; storage probes
//! (entry count, byte footprint) are read at snapshot time.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Internal decision counters.
#[derive(Debug, Default)]
pub(crate) struct EngineCounters {
    pub hits: AtomicU64,
    pub stale_hits: AtomicU64,
    pub misses: AtomicU64,
    pub stores: AtomicU64,
    pub rejected_stores: AtomicU64,
    pub validations: AtomicU64,
    pub invalidations: AtomicU64,
}

impl EngineCounters {
    pub fn record(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_n(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Entries resident in the authoritative tier.
    pub entries: u64,
    /// Approximate byte footprint of the authoritative tier.
    pub bytes: u64,
    pub hits: u64,
    pub stale_hits: u64,
    pub misses: u64,
    pub stores: u64,
    pub rejected_stores: u64,
    pub validations: u64,
    pub invalidations: u64,
}

impl CacheStats {
    pub(crate) fn from_counters(counters: &EngineCounters, entries: u64, bytes: u64) -> Self {
        Self {
            entries,
            bytes,
            hits: counters.hits.load(Ordering::Relaxed),
            stale_hits: counters.stale_hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            stores: counters.stores.load(Ordering::Relaxed),
            rejected_stores: counters.rejected_stores.load(Ordering::Relaxed),
            validations: counters.validations.load(Ordering::Relaxed),
            invalidations: counters.invalidations.load(Ordering::Relaxed),
        }
    }
}
