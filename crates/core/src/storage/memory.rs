//! Volatile tier: bounded in-process storage.
//!
//! A mutex-guarded map with companion bookkeeping per slot (last access,
//! access count, insertion order). Eviction runs inside `put` while the
//! configured bounds are exceeded, selecting victims by the configured
//! strategy with insertion order as the tiebreak.
//!
//! Locking invariant: the `_locked` helpers assume the state mutex is
//! already held and never call back into the public (locking) methods.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{CacheStorage, EntryPredicate};
use crate::config::{CacheType, EvictionStrategy};
use crate::entry::CacheEntry;
use crate::error::Error;
use crate::freshness::{self, HeuristicPolicy};
use crate::http::cache_control::{CacheControl, DirectiveScope};

struct Slot {
    entry: CacheEntry,
    size: u64,
    last_access: DateTime<Utc>,
    access_count: u64,
    inserted: u64,
}

#[derive(Default)]
struct MemoryState {
    map: HashMap<String, Slot>,
    total_bytes: u64,
    next_seq: u64,
}

/// Bounded in-memory cache tier.
pub struct MemoryStorage {
    state: Mutex<MemoryState>,
    max_entries: usize,
    max_bytes: u64,
    strategy: EvictionStrategy,
}

impl MemoryStorage {
    pub fn new(max_entries: usize, max_bytes: u64, strategy: EvictionStrategy) -> Self {
        Self { state: Mutex::new(MemoryState::default()), max_entries, max_bytes, strategy }
    }

    /// Pick the eviction victim under the configured strategy.
    ///
    /// Assumes the state lock is held.
    fn select_victim_locked(&self, state: &MemoryState) -> Option<String> {
        let slots = state.map.iter();

        let victim = match self.strategy {
            EvictionStrategy::Lru => slots.min_by_key(|(_, s)| (s.last_access, s.inserted)),
            EvictionStrategy::Lfu => slots.min_by_key(|(_, s)| (s.access_count, s.last_access, s.inserted)),
            EvictionStrategy::Fifo => slots.min_by_key(|(_, s)| s.inserted),
            EvictionStrategy::Ttl => self.select_ttl_victim_locked(state),
        };

        victim.map(|(key, _)| key.clone())
    }

    /// TTL victim: the entry with the least remaining freshness, judged
    /// from its stored `cache-control`. Entries with no computable
    /// lifetime fall back to LRU ordering.
    ///
    /// Assumes the state lock is held.
    fn select_ttl_victim_locked<'a>(&self, state: &'a MemoryState) -> Option<(&'a String, &'a Slot)> {
        let now = Utc::now();
        let heuristics = HeuristicPolicy { enabled: false, ..Default::default() };

        let expiring = state
            .map
            .iter()
            .filter_map(|(key, slot)| {
                let cc = CacheControl::from_headers(&slot.entry.headers, DirectiveScope::Response);
                let lifetime = freshness::freshness_lifetime(&slot.entry, &cc, CacheType::Private, &heuristics)?;
                let remaining = lifetime - freshness::current_age(&slot.entry, now);
                Some((key, slot, remaining))
            })
            .min_by_key(|(_, slot, remaining)| (*remaining, slot.inserted));

        match expiring {
            Some((key, slot, _)) => Some((key, slot)),
            None => state.map.iter().min_by_key(|(_, s)| (s.last_access, s.inserted)),
        }
    }

    /// Remove one victim and reclaim its bytes. Returns false when the
    /// map is empty.
    ///
    /// Assumes the state lock is held.
    fn evict_one_locked(&self, state: &mut MemoryState) -> bool {
        let Some(victim) = self.select_victim_locked(state) else {
            return false;
        };
        if let Some(slot) = state.map.remove(&victim) {
            state.total_bytes -= slot.size;
            tracing::debug!(key = %victim, size = slot.size, "evicted from volatile tier");
        }
        true
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, Error> {
        let mut state = self.state.lock().await;
        match state.map.get_mut(key) {
            Some(slot) => {
                slot.last_access = Utc::now();
                slot.access_count += 1;
                Ok(Some(slot.entry.clone()))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, entry: CacheEntry) -> Result<bool, Error> {
        let size = entry.size_bytes();
        if size > self.max_bytes {
            return Ok(false);
        }

        let mut state = self.state.lock().await;

        // Replacing a key reclaims its old footprint before bounds are
        // enforced.
        if let Some(old) = state.map.remove(key) {
            state.total_bytes -= old.size;
        }

        while state.map.len() >= self.max_entries || state.total_bytes + size > self.max_bytes {
            if !self.evict_one_locked(&mut state) {
                break;
            }
        }

        let inserted = state.next_seq;
        state.next_seq += 1;
        state.total_bytes += size;
        state
            .map
            .insert(key.to_string(), Slot { entry, size, last_access: Utc::now(), access_count: 0, inserted });

        Ok(true)
    }

    async fn remove(&self, key: &str) -> Result<bool, Error> {
        let mut state = self.state.lock().await;
        match state.map.remove(key) {
            Some(slot) => {
                state.total_bytes -= slot.size;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn contains(&self, key: &str) -> Result<bool, Error> {
        let state = self.state.lock().await;
        Ok(state.map.contains_key(key))
    }

    async fn clear(&self) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        state.map.clear();
        state.total_bytes = 0;
        Ok(())
    }

    async fn clear_where(&self, predicate: EntryPredicate) -> Result<u64, Error> {
        let mut state = self.state.lock().await;
        let doomed: Vec<String> =
            state.map.iter().filter(|(_, slot)| predicate(&slot.entry)).map(|(key, _)| key.clone()).collect();

        let mut removed = 0;
        for key in doomed {
            if let Some(slot) = state.map.remove(&key) {
                state.total_bytes -= slot.size;
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        let state = self.state.lock().await;
        Ok(state.map.keys().cloned().collect())
    }

    async fn size(&self) -> Result<u64, Error> {
        let state = self.state.lock().await;
        Ok(state.map.len() as u64)
    }

    async fn size_in_bytes(&self) -> Result<u64, Error> {
        let state = self.state.lock().await;
        Ok(state.total_bytes)
    }

    async fn close(&self) -> Result<(), Error> {
        // Nothing external to release; drop the resident set.
        self.clear().await
    }
}
