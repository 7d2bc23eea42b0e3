//! Storage tiers for cached entries.
//!
//! One contract, three implementations:
//!
//! - [`MemoryStorage`]: bounded in-process map (volatile L1)
//! - [`SqliteStorage`]: SQLite-backed persistent store (durable L2)
//! - [`TieredStorage`]: L1-then-L2 composition with read promotion
//!
//! Every operation may suspend and is safe under concurrent invocation.
//! Each tier serializes through its own mechanism (a mutex for L1, the
//! connection's command channel for L2); there is no global lock, so
//! transient divergence between tiers is accepted and resolved by the
//! next `put` on the same key.

pub mod memory;
mod migrations;
pub mod sqlite;
pub mod tiered;

use std::sync::Arc;

use async_trait::async_trait;

use crate::entry::CacheEntry;
use crate::error::Error;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;
pub use tiered::TieredStorage;

/// Predicate over stored entries for `clear_where`.
///
/// `Arc` so one predicate can be fanned out across tiers and moved into
/// the durable tier's connection closure.
pub type EntryPredicate = Arc<dyn Fn(&CacheEntry) -> bool + Send + Sync>;

/// Contract any cache backend must honor.
///
/// `put` returns `false` when the entry alone exceeds the tier's byte
/// bound; otherwise it stores after best-effort eviction and returns
/// `true`. All other failures are `Err`.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, Error>;

    async fn put(&self, key: &str, entry: CacheEntry) -> Result<bool, Error>;

    /// Remove one key. Returns whether it was present.
    async fn remove(&self, key: &str) -> Result<bool, Error>;

    async fn contains(&self, key: &str) -> Result<bool, Error>;

    async fn clear(&self) -> Result<(), Error>;

    /// Remove every entry the predicate selects. Returns the number
    /// removed.
    async fn clear_where(&self, predicate: EntryPredicate) -> Result<u64, Error>;

    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Entry count.
    async fn size(&self) -> Result<u64, Error>;

    /// Approximate storage footprint in bytes.
    async fn size_in_bytes(&self) -> Result<u64, Error>;

    async fn close(&self) -> Result<(), Error>;
}
