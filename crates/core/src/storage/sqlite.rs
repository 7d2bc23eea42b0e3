//! Durable tier: SQLite-backed persistent storage.
//!
//! Wraps a tokio-rusqlite connection that runs database operations on a
//! background thread, serializing them per the per-tier contract. The
//! database is opened in WAL mode with NORMAL synchronous; schema is
//! managed by [`super::migrations`].
//!
//! Eviction uses the table's indexes: victims are selected by a single
//! `ORDER BY ... LIMIT 1` over `access_time`, `access_count`, or
//! `created_time` depending on the strategy. TTL has no stored lifetime
//! column and proxies via creation order.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_rusqlite::rusqlite::OptionalExtension;
use tokio_rusqlite::{Connection, params, rusqlite};

use super::{CacheStorage, EntryPredicate, migrations};
use crate::config::EvictionStrategy;
use crate::entry::CacheEntry;
use crate::error::Error;
use crate::http::Headers;

const ENTRY_COLUMNS: &str = "method, uri, status_code, headers_json, body, request_time, response_time, \
                             vary_json, is_incomplete, content_range, is_invalid";

/// SQLite-backed cache tier.
#[derive(Clone, Debug)]
pub struct SqliteStorage {
    conn: Connection,
    max_entries: usize,
    max_bytes: u64,
    strategy: EvictionStrategy,
}

/// Raw row shape fetched inside rusqlite closures; deserialized into a
/// [`CacheEntry`] outside them.
struct RawEntry {
    method: String,
    uri: String,
    status_code: i64,
    headers_json: String,
    body: Vec<u8>,
    request_time: String,
    response_time: String,
    vary_json: Option<String>,
    is_incomplete: i32,
    content_range: Option<String>,
    is_invalid: i32,
}

impl RawEntry {
    fn from_row(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            method: row.get(offset)?,
            uri: row.get(offset + 1)?,
            status_code: row.get(offset + 2)?,
            headers_json: row.get(offset + 3)?,
            body: row.get(offset + 4)?,
            request_time: row.get(offset + 5)?,
            response_time: row.get(offset + 6)?,
            vary_json: row.get(offset + 7)?,
            is_incomplete: row.get(offset + 8)?,
            content_range: row.get(offset + 9)?,
            is_invalid: row.get(offset + 10)?,
        })
    }

    fn into_entry(self) -> Result<CacheEntry, Error> {
        let headers: Headers = serde_json::from_str(&self.headers_json)?;
        let vary_headers = match self.vary_json {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        };

        Ok(CacheEntry {
            method: self.method,
            uri: self.uri,
            status_code: self.status_code as u16,
            headers,
            body: self.body.into(),
            request_time: parse_rfc3339(&self.request_time)?,
            response_time: parse_rfc3339(&self.response_time)?,
            vary_headers,
            is_incomplete: self.is_incomplete == 1,
            content_range: self.content_range,
            is_invalid: self.is_invalid == 1,
        })
    }
}

fn parse_rfc3339(value: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Serialization(format!("bad stored timestamp {value:?}: {e}")))
}

impl SqliteStorage {
    /// Open (or create) the cache database at `path` and bring its schema
    /// up to date.
    pub async fn open(
        path: impl AsRef<Path>, max_entries: usize, max_bytes: u64, strategy: EvictionStrategy,
    ) -> Result<Self, Error> {
        let conn = Connection::open(path).await.map_err(Error::from)?;
        let storage = Self { conn, max_entries, max_bytes, strategy };
        storage.prepare_schema().await?;
        Ok(storage)
    }

    /// Open an in-memory database.
    ///
    /// Satisfies the full L2 contract but survives nothing; used when no
    /// database path is configured, and in tests.
    pub async fn open_in_memory(max_entries: usize, max_bytes: u64, strategy: EvictionStrategy) -> Result<Self, Error> {
        let conn = Connection::open_in_memory().await.map_err(Error::from)?;
        let storage = Self { conn, max_entries, max_bytes, strategy };
        storage.prepare_schema().await?;
        Ok(storage)
    }

    /// Apply connection pragmas, then replay any pending migrations.
    async fn prepare_schema(&self) -> Result<(), Error> {
        self.conn
            .call(|conn| -> Result<(), Error> {
                // WAL keeps readers unblocked during eviction writes. The
                // journal_mode pragma reports the resulting mode, so it
                // runs as a query rather than a statement.
                let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
                conn.execute_batch("PRAGMA synchronous=NORMAL; PRAGMA temp_store=MEMORY;")?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        migrations::apply_pending(&self.conn).await
    }

    /// Eviction ordering clause for the configured strategy. Ties always
    /// fall back to creation order.
    fn eviction_order(&self) -> &'static str {
        match self.strategy {
            EvictionStrategy::Lru => "access_time ASC, created_time ASC",
            EvictionStrategy::Lfu => "access_count ASC, access_time ASC, created_time ASC",
            EvictionStrategy::Fifo | EvictionStrategy::Ttl => "created_time ASC",
        }
    }
}

#[async_trait]
impl CacheStorage for SqliteStorage {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, Error> {
        let key = key.to_string();
        let raw = self
            .conn
            .call(move |conn| -> Result<Option<RawEntry>, Error> {
                let mut stmt =
                    conn.prepare(&format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE cache_key = ?1"))?;
                let raw = stmt.query_row(params![key], |row| RawEntry::from_row(row, 0)).optional()?;

                if raw.is_some() {
                    conn.execute(
                        "UPDATE entries SET access_count = access_count + 1, access_time = ?2 WHERE cache_key = ?1",
                        params![key, Utc::now().to_rfc3339()],
                    )?;
                }

                Ok(raw)
            })
            .await
            .map_err(Error::from)?;

        raw.map(RawEntry::into_entry).transpose()
    }

    async fn put(&self, key: &str, entry: CacheEntry) -> Result<bool, Error> {
        let size = entry.size_bytes();
        if size > self.max_bytes {
            return Ok(false);
        }

        let key = key.to_string();
        let max_entries = self.max_entries as i64;
        let max_bytes = self.max_bytes as i64;
        let order = self.eviction_order();

        let headers_json = serde_json::to_string(&entry.headers)?;
        let vary_json = entry.vary_headers.as_ref().map(serde_json::to_string).transpose()?;

        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction().map_err(Error::from)?;

                // Replacing a key reclaims its footprint before bounds are
                // enforced.
                tx.execute("DELETE FROM entries WHERE cache_key = ?1", params![key])?;

                loop {
                    let (count, bytes): (i64, i64) = tx.query_row(
                        "SELECT COUNT(*), COALESCE(SUM(size), 0) FROM entries",
                        [],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )?;
                    if count < max_entries && bytes + size as i64 <= max_bytes {
                        break;
                    }

                    let victim: Option<String> = tx
                        .query_row(
                            &format!("SELECT cache_key FROM entries ORDER BY {order} LIMIT 1"),
                            [],
                            |row| row.get(0),
                        )
                        .optional()?;
                    match victim {
                        Some(victim) => {
                            tx.execute("DELETE FROM entries WHERE cache_key = ?1", params![victim])?;
                            tracing::debug!(key = %victim, "evicted from durable tier");
                        }
                        None => break,
                    }
                }

                let now = Utc::now().to_rfc3339();
                tx.execute(
                    "INSERT INTO entries (
                        cache_key, method, uri, status_code, headers_json, body,
                        request_time, response_time, vary_json, is_incomplete,
                        content_range, is_invalid, size, access_time, access_count, created_time
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, 0, ?15)",
                    params![
                        key,
                        entry.method,
                        entry.uri,
                        entry.status_code as i64,
                        headers_json,
                        entry.body.as_ref(),
                        entry.request_time.to_rfc3339(),
                        entry.response_time.to_rfc3339(),
                        vary_json,
                        entry.is_incomplete as i32,
                        entry.content_range,
                        entry.is_invalid as i32,
                        size as i64,
                        now,
                        now,
                    ],
                )?;

                tx.commit().map_err(Error::from)?;
                Ok(true)
            })
            .await
            .map_err(Error::from)
    }

    async fn remove(&self, key: &str) -> Result<bool, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let removed = conn.execute("DELETE FROM entries WHERE cache_key = ?1", params![key])?;
                Ok(removed > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn contains(&self, key: &str) -> Result<bool, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let present: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM entries WHERE cache_key = ?1)",
                    params![key],
                    |row| row.get(0),
                )?;
                Ok(present)
            })
            .await
            .map_err(Error::from)
    }

    async fn clear(&self) -> Result<(), Error> {
        self.conn
            .call(|conn| -> Result<(), Error> {
                conn.execute("DELETE FROM entries", [])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn clear_where(&self, predicate: EntryPredicate) -> Result<u64, Error> {
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let mut stmt = conn.prepare(&format!("SELECT cache_key, {ENTRY_COLUMNS} FROM entries"))?;
                let rows = stmt.query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, RawEntry::from_row(row, 1)?))
                })?;

                let mut doomed = Vec::new();
                for row in rows {
                    let (key, raw) = row.map_err(Error::from)?;
                    if predicate(&raw.into_entry()?) {
                        doomed.push(key);
                    }
                }
                drop(stmt);

                let mut removed = 0u64;
                for key in doomed {
                    removed += conn.execute("DELETE FROM entries WHERE cache_key = ?1", params![key])? as u64;
                }
                Ok(removed)
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT cache_key FROM entries")?;
                let keys = stmt.query_map([], |row| row.get(0))?.collect::<rusqlite::Result<Vec<String>>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    async fn size(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    async fn size_in_bytes(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let bytes: i64 = conn.query_row("SELECT COALESCE(SUM(size), 0) FROM entries", [], |row| row.get(0))?;
                Ok(bytes as u64)
            })
            .await
            .map_err(Error::from)
    }

    async fn close(&self) -> Result<(), Error> {
        self.conn.clone().close().await.map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    async fn storage() -> SqliteStorage {
        SqliteStorage::open_in_memory(1000, 50 * 1024 * 1024, EvictionStrategy::Lru).await.unwrap()
    }

    fn entry(uri: &str, body: &'static [u8]) -> CacheEntry {
        CacheEntry {
            method: "GET".to_string(),
            uri: uri.to_string(),
            status_code: 200,
            headers: [("Cache-Control", "max-age=300"), ("ETag", "\"v1\"")].into_iter().collect(),
            body: Bytes::from_static(body),
            request_time: Utc::now(),
            response_time: Utc::now(),
            vary_headers: None,
            is_incomplete: false,
            content_range: None,
            is_invalid: false,
        }
    }

    #[tokio::test]
    async fn test_put_and_get_round_trip() {
        let storage = storage().await;
        let mut stored = entry("https://example.com/a", b"hello");
        stored.vary_headers = Some(BTreeMap::from([("accept-language".to_string(), "en".to_string())]));
        stored.content_range = Some("bytes 0-4/10".to_string());
        stored.is_incomplete = true;

        assert!(storage.put("k1", stored.clone()).await.unwrap());

        let got = storage.get("k1").await.unwrap().unwrap();
        assert_eq!(got.body, stored.body);
        assert_eq!(got.headers, stored.headers);
        assert_eq!(got.vary_headers, stored.vary_headers);
        assert_eq!(got.content_range, stored.content_range);
        assert!(got.is_incomplete);
        assert_eq!(got.request_time.timestamp(), stored.request_time.timestamp());
    }

    #[tokio::test]
    async fn test_get_missing() {
        let storage = storage().await;
        assert!(storage.get("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let storage = storage().await;
        storage.put("k1", entry("https://example.com/a", b"old")).await.unwrap();
        storage.put("k1", entry("https://example.com/a", b"new!")).await.unwrap();

        let got = storage.get("k1").await.unwrap().unwrap();
        assert_eq!(got.body, Bytes::from_static(b"new!"));
        assert_eq!(storage.size().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_put_rejects_oversized_entry() {
        let storage = SqliteStorage::open_in_memory(1000, 10, EvictionStrategy::Lru).await.unwrap();
        let stored = storage.put("k1", entry("https://example.com/a", b"far too large")).await.unwrap();
        assert!(!stored);
        assert_eq!(storage.size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_entry_bound_evicts_lru() {
        let storage = SqliteStorage::open_in_memory(2, 50 * 1024 * 1024, EvictionStrategy::Lru).await.unwrap();
        storage.put("a", entry("https://example.com/a", b"a")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        storage.put("b", entry("https://example.com/b", b"b")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        // Touching "a" moves its access_time past "b"'s.
        storage.get("a").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        storage.put("c", entry("https://example.com/c", b"c")).await.unwrap();

        assert!(storage.contains("a").await.unwrap());
        assert!(!storage.contains("b").await.unwrap());
        assert!(storage.contains("c").await.unwrap());
    }

    #[tokio::test]
    async fn test_lfu_eviction_order() {
        let storage = SqliteStorage::open_in_memory(2, 50 * 1024 * 1024, EvictionStrategy::Lfu).await.unwrap();
        storage.put("a", entry("https://example.com/a", b"a")).await.unwrap();
        storage.put("b", entry("https://example.com/b", b"b")).await.unwrap();

        storage.get("a").await.unwrap();
        storage.get("a").await.unwrap();
        storage.get("b").await.unwrap();

        storage.put("c", entry("https://example.com/c", b"c")).await.unwrap();

        assert!(storage.contains("a").await.unwrap());
        assert!(!storage.contains("b").await.unwrap());
    }

    #[tokio::test]
    async fn test_byte_bound_eviction() {
        let a = entry("a", b"aaaaaaaa");
        let per_entry = a.size_bytes();
        let storage = SqliteStorage::open_in_memory(100, per_entry * 2, EvictionStrategy::Fifo).await.unwrap();

        storage.put("a", a).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        storage.put("b", entry("b", b"aaaaaaaa")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        storage.put("c", entry("c", b"aaaaaaaa")).await.unwrap();

        assert_eq!(storage.size().await.unwrap(), 2);
        assert!(!storage.contains("a").await.unwrap());
        assert!(storage.contains("c").await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_where() {
        let storage = storage().await;
        storage.put("a", entry("https://example.com/a", b"a")).await.unwrap();
        storage.put("b", entry("https://other.com/b", b"b")).await.unwrap();

        let removed = storage
            .clear_where(Arc::new(|e: &CacheEntry| e.uri.contains("example.com")))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(!storage.contains("a").await.unwrap());
        assert!(storage.contains("b").await.unwrap());
    }

    #[tokio::test]
    async fn test_keys_size_and_clear() {
        let storage = storage().await;
        storage.put("a", entry("https://example.com/a", b"a")).await.unwrap();
        storage.put("b", entry("https://example.com/b", b"b")).await.unwrap();

        let mut keys = storage.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(storage.size().await.unwrap(), 2);
        assert!(storage.size_in_bytes().await.unwrap() > 0);

        storage.clear().await.unwrap();
        assert_eq!(storage.size().await.unwrap(), 0);
        assert_eq!(storage.size_in_bytes().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_persists_across_connections() {
        let dir = std::env::temp_dir().join(format!("stratus-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cache.sqlite3");

        {
            let storage =
                SqliteStorage::open(&path, 1000, 50 * 1024 * 1024, EvictionStrategy::Lru).await.unwrap();
            storage.put("k1", entry("https://example.com/a", b"persisted")).await.unwrap();
            storage.close().await.unwrap();
        }

        let reopened = SqliteStorage::open(&path, 1000, 50 * 1024 * 1024, EvictionStrategy::Lru).await.unwrap();
        let got = reopened.get("k1").await.unwrap().unwrap();
        assert_eq!(got.body, Bytes::from_static(b"persisted"));

        reopened.close().await.unwrap();
        std::fs::remove_dir_all(&dir).ok();
    }
}
