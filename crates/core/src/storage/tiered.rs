//! Tiered composition: volatile L1 over durable L2.
//!
//! Reads prefer L1 and promote L2 hits into it best-effort; writes go to
//! both tiers and succeed if either tier accepted the entry. The composer
//! never cross-checks tiers: L1 may transiently hold an older or newer
//! version than L2, and the next `put` on the key overwrites both.
//!
//! Count and byte probes report the durable tier, which is authoritative.

use async_trait::async_trait;

use super::{CacheStorage, EntryPredicate, MemoryStorage, SqliteStorage};
use crate::entry::CacheEntry;
use crate::error::Error;

/// Two-tier store: in-memory L1 in front of SQLite L2.
pub struct TieredStorage {
    l1: MemoryStorage,
    l2: SqliteStorage,
}

impl TieredStorage {
    pub fn new(l1: MemoryStorage, l2: SqliteStorage) -> Self {
        Self { l1, l2 }
    }
}

#[async_trait]
impl CacheStorage for TieredStorage {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, Error> {
        if let Some(entry) = self.l1.get(key).await? {
            return Ok(Some(entry));
        }

        let Some(entry) = self.l2.get(key).await? else {
            return Ok(None);
        };

        // Promotion is best-effort: a rejection (entry larger than the L1
        // bound) or failure never costs the caller the L2 hit.
        if let Err(e) = self.l1.put(key, entry.clone()).await {
            tracing::debug!(key, error = %e, "promotion to volatile tier failed");
        }

        Ok(Some(entry))
    }

    async fn put(&self, key: &str, entry: CacheEntry) -> Result<bool, Error> {
        let l1_stored = self.l1.put(key, entry.clone()).await?;
        let l2_stored = self.l2.put(key, entry).await?;
        Ok(l1_stored || l2_stored)
    }

    async fn remove(&self, key: &str) -> Result<bool, Error> {
        let l1_removed = self.l1.remove(key).await?;
        let l2_removed = self.l2.remove(key).await?;
        Ok(l1_removed || l2_removed)
    }

    async fn contains(&self, key: &str) -> Result<bool, Error> {
        if self.l1.contains(key).await? {
            return Ok(true);
        }
        self.l2.contains(key).await
    }

    async fn clear(&self) -> Result<(), Error> {
        self.l1.clear().await?;
        self.l2.clear().await
    }

    async fn clear_where(&self, predicate: EntryPredicate) -> Result<u64, Error> {
        self.l1.clear_where(predicate.clone()).await?;
        self.l2.clear_where(predicate).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        let mut keys = self.l2.keys().await?;
        for key in self.l1.keys().await? {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    async fn size(&self) -> Result<u64, Error> {
        self.l2.size().await
    }

    async fn size_in_bytes(&self) -> Result<u64, Error> {
        self.l2.size_in_bytes().await
    }

    async fn close(&self) -> Result<(), Error> {
        self.l1.close().await?;
        self.l2.close().await
    }
}
