//! Engine configuration.
//!
//! `CacheOptions` is a plain value: the engine has no environment, file, or
//! CLI configuration surface. Hosts construct it (usually from
//! `Default::default()` plus field overrides), and it is immutable once the
//! engine is built.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Whether the cache follows single-user (device) or multi-user (proxy)
/// semantics.
///
/// A shared cache refuses `private` responses and honors `s-maxage` and
/// `proxy-revalidate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    #[default]
    Private,
    Shared,
}

impl CacheType {
    pub fn is_shared(self) -> bool {
        matches!(self, CacheType::Shared)
    }
}

/// Victim-selection strategy for bounded tiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionStrategy {
    /// Evict the entry with the oldest last-access instant.
    #[default]
    Lru,
    /// Evict the entry with the smallest access count; ties broken by
    /// last-access instant.
    Lfu,
    /// Evict the entry with the smallest insertion order.
    Fifo,
    /// Evict the entry closest to (or past) the end of its freshness
    /// lifetime. Entries with no computable lifetime fall back to LRU
    /// ordering; the durable tier proxies this via creation order.
    Ttl,
}

/// Engine configuration.
///
/// All fields have defaults; see the field docs for the default values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheOptions {
    /// Byte bound for the volatile tier (default 10 MiB).
    #[serde(default = "default_max_memory_bytes")]
    pub max_memory_bytes: u64,

    /// Entry bound for the volatile tier (default 100).
    #[serde(default = "default_max_memory_entries")]
    pub max_memory_entries: usize,

    /// Byte bound for the durable tier (default 50 MiB).
    #[serde(default = "default_max_disk_bytes")]
    pub max_disk_bytes: u64,

    /// Entry bound for the durable tier (default 1000).
    #[serde(default = "default_max_disk_entries")]
    pub max_disk_entries: usize,

    /// Private or shared cache semantics (default private).
    #[serde(default)]
    pub cache_type: CacheType,

    /// Eviction strategy for both tiers (default LRU).
    #[serde(default)]
    pub eviction_strategy: EvictionStrategy,

    /// Whether a freshness lifetime may be derived heuristically when the
    /// response carries no explicit expiration (default true).
    #[serde(default = "default_true")]
    pub enable_heuristic_freshness: bool,

    /// Fraction of (Date − Last-Modified) used as the heuristic lifetime
    /// (default 0.10).
    #[serde(default = "default_heuristic_percentage")]
    pub heuristic_percentage: f64,

    /// Cap on the heuristic lifetime in seconds (default 7 days).
    #[serde(default = "default_max_heuristic_secs")]
    pub max_heuristic_duration_secs: i64,

    /// Whether `serve_stale` may hand out stale entries after an upstream
    /// failure (default true).
    #[serde(default = "default_true")]
    pub serve_stale_on_error: bool,

    /// Staleness bound in seconds for `serve_stale` (default 1 day).
    #[serde(default = "default_max_stale_secs")]
    pub max_stale_age_secs: i64,

    /// Partition cache keys by top-level site (default false).
    #[serde(default)]
    pub double_key_cache: bool,

    /// Path for the durable tier's SQLite database. Unset means an
    /// in-memory database: the L2 contract still holds, but nothing
    /// survives process restart.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Emit `tracing` events for cache decisions (default false).
    #[serde(default)]
    pub enable_logging: bool,
}

fn default_max_memory_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_max_memory_entries() -> usize {
    100
}

fn default_max_disk_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_max_disk_entries() -> usize {
    1000
}

fn default_heuristic_percentage() -> f64 {
    0.10
}

fn default_max_heuristic_secs() -> i64 {
    7 * 24 * 60 * 60
}

fn default_max_stale_secs() -> i64 {
    24 * 60 * 60
}

fn default_true() -> bool {
    true
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            max_memory_bytes: default_max_memory_bytes(),
            max_memory_entries: default_max_memory_entries(),
            max_disk_bytes: default_max_disk_bytes(),
            max_disk_entries: default_max_disk_entries(),
            cache_type: CacheType::Private,
            eviction_strategy: EvictionStrategy::Lru,
            enable_heuristic_freshness: true,
            heuristic_percentage: default_heuristic_percentage(),
            max_heuristic_duration_secs: default_max_heuristic_secs(),
            serve_stale_on_error: true,
            max_stale_age_secs: default_max_stale_secs(),
            double_key_cache: false,
            database_path: None,
            enable_logging: false,
        }
    }
}
