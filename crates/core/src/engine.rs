//! The caching engine facade.
//!
//! `HttpCache` orchestrates the semantics layer over a storage backend:
//! reads run key derivation, freshness arithmetic, and the reusability
//! decider; writes run the storability gate, header filtering, and `Vary`
//! capture; 304s and HEADs freshen stored entries; unsafe methods
//! invalidate.
//!
//! An entry moves through `Absent -> Fresh -> Stale -> Absent` under the
//! engine's view; revalidation replaces a stale entry with a freshened
//! successor. The engine spawns no tasks and holds no lock across storage
//! calls; concurrent operations interleave at storage boundaries.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::CacheOptions;
use crate::decision::{self, Reusability, Storability};
use crate::entry::{CacheEntry, CachePolicy, CachedResponse};
use crate::error::Error;
use crate::freshness::{self, HeuristicPolicy};
use crate::http::cache_control::{CacheControl, DirectiveScope};
use crate::http::{Headers, uri};
use crate::invalidate;
use crate::key::{self, KeyGenerator};
use crate::stats::{CacheStats, EngineCounters};
use crate::storage::{CacheStorage, EntryPredicate, MemoryStorage, SqliteStorage, TieredStorage};
use crate::validator;

/// Browser-style HTTP response cache.
pub struct HttpCache {
    options: CacheOptions,
    storage: Arc<dyn CacheStorage>,
    keys: KeyGenerator,
    counters: EngineCounters,
}

impl HttpCache {
    /// Build an engine over the default tiered store (in-memory L1 plus
    /// SQLite L2 at `database_path`, or an in-memory database when unset).
    pub async fn new(options: CacheOptions) -> Result<Self, Error> {
        options.validate().map_err(|e| Error::InvalidInput(e.to_string()))?;

        let l1 = MemoryStorage::new(options.max_memory_entries, options.max_memory_bytes, options.eviction_strategy);
        let l2 = match &options.database_path {
            Some(path) => {
                SqliteStorage::open(path, options.max_disk_entries, options.max_disk_bytes, options.eviction_strategy)
                    .await?
            }
            None => {
                SqliteStorage::open_in_memory(
                    options.max_disk_entries,
                    options.max_disk_bytes,
                    options.eviction_strategy,
                )
                .await?
            }
        };

        Ok(Self::assemble(options, Arc::new(TieredStorage::new(l1, l2))))
    }

    /// Build an engine over a caller-supplied storage backend.
    pub fn with_storage(options: CacheOptions, storage: Arc<dyn CacheStorage>) -> Result<Self, Error> {
        options.validate().map_err(|e| Error::InvalidInput(e.to_string()))?;
        Ok(Self::assemble(options, storage))
    }

    fn assemble(options: CacheOptions, storage: Arc<dyn CacheStorage>) -> Self {
        let keys = KeyGenerator::new(options.double_key_cache);
        Self { options, storage, keys, counters: EngineCounters::default() }
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    fn heuristics(&self) -> HeuristicPolicy {
        HeuristicPolicy {
            enabled: self.options.enable_heuristic_freshness,
            percentage: self.options.heuristic_percentage,
            max_secs: self.options.max_heuristic_duration_secs,
        }
    }

    fn log(&self, event: &str, detail: &str) {
        if self.options.enable_logging {
            tracing::debug!(event, detail, "cache decision");
        }
    }

    /// Look up a cached response for a request.
    ///
    /// Returns `None` on a miss, a non-reusable entry, or when the policy
    /// forbids cache reads. Otherwise the result says whether the entry is
    /// stale and whether it must be revalidated before use.
    pub async fn get(
        &self, method: &str, request_uri: &str, request_headers: &Headers, policy: CachePolicy,
    ) -> Result<Option<CachedResponse>, Error> {
        self.get_with_site(method, request_uri, request_headers, policy, None).await
    }

    /// [`HttpCache::get`] with an explicit top-level-site partition for
    /// double-keyed caches.
    pub async fn get_with_site(
        &self, method: &str, request_uri: &str, request_headers: &Headers, policy: CachePolicy, site: Option<&str>,
    ) -> Result<Option<CachedResponse>, Error> {
        let method = method.to_ascii_uppercase();
        let request_uri = uri::canonicalize(request_uri);
        let request_cc = CacheControl::from_headers(request_headers, DirectiveScope::Request);

        let policy = if request_cc.only_if_cached { CachePolicy::CacheOnly } else { policy };
        if policy == CachePolicy::NetworkOnly {
            EngineCounters::record(&self.counters.misses);
            return Ok(None);
        }

        let primary = self.keys.primary(&method, &request_uri, site);
        let Some(entry) = self.storage.get(&primary).await? else {
            self.log("miss", &request_uri);
            EngineCounters::record(&self.counters.misses);
            return Ok(None);
        };

        let response_cc = CacheControl::from_headers(&entry.headers, DirectiveScope::Response);
        let now = Utc::now();
        let age = freshness::current_age(&entry, now);
        let lifetime = freshness::freshness_lifetime(&entry, &response_cc, self.options.cache_type, &self.heuristics());

        let mut fresh = freshness::is_fresh(age, lifetime);
        // Request-side narrowing: min-fresh demands remaining lifetime,
        // max-age caps the acceptable age.
        if fresh && !freshness::satisfies_min_fresh(&request_cc, age, lifetime) {
            fresh = false;
        }
        if fresh {
            if let Some(request_max_age) = request_cc.max_age {
                if age > request_max_age as i64 {
                    fresh = false;
                }
            }
        }

        let verdict =
            decision::can_reuse(&method, &request_uri, request_headers, &request_cc, &entry, &response_cc, fresh);

        match verdict {
            Reusability::NotReusable { reason } => {
                self.log("not-reusable", reason);
                EngineCounters::record(&self.counters.misses);
                Ok(None)
            }
            Reusability::Reusable => {
                self.log("hit", &request_uri);
                EngineCounters::record(&self.counters.hits);
                Ok(Some(CachedResponse { entry, age: age.max(0) as u64, is_stale: false, requires_validation: false }))
            }
            Reusability::RequiresValidation { reason } => {
                if !fresh && matches!(policy, CachePolicy::CacheFirst | CachePolicy::CacheOnly) {
                    self.log("stale-hit", &request_uri);
                    EngineCounters::record(&self.counters.stale_hits);
                    return Ok(Some(CachedResponse {
                        entry,
                        age: age.max(0) as u64,
                        is_stale: true,
                        requires_validation: false,
                    }));
                }

                self.log("requires-validation", reason);
                EngineCounters::record(&self.counters.validations);
                Ok(Some(CachedResponse {
                    entry,
                    age: age.max(0) as u64,
                    is_stale: !fresh,
                    requires_validation: true,
                }))
            }
        }
    }

    /// Store a response if the storability gate admits it.
    ///
    /// Returns whether the response was actually stored; rejections are
    /// logged with their reason and are not errors.
    #[allow(clippy::too_many_arguments)]
    pub async fn put(
        &self, method: &str, request_uri: &str, status_code: u16, request_headers: &Headers,
        response_headers: &Headers, body: bytes::Bytes, request_time: DateTime<Utc>, response_time: DateTime<Utc>,
    ) -> Result<bool, Error> {
        self.put_with_site(
            method,
            request_uri,
            status_code,
            request_headers,
            response_headers,
            body,
            request_time,
            response_time,
            None,
        )
        .await
    }

    /// [`HttpCache::put`] with an explicit top-level-site partition.
    #[allow(clippy::too_many_arguments)]
    pub async fn put_with_site(
        &self, method: &str, request_uri: &str, status_code: u16, request_headers: &Headers,
        response_headers: &Headers, body: bytes::Bytes, request_time: DateTime<Utc>, response_time: DateTime<Utc>,
        site: Option<&str>,
    ) -> Result<bool, Error> {
        if response_time < request_time {
            return Err(Error::InvalidInput("response_time precedes request_time".into()));
        }

        let method = method.to_ascii_uppercase();
        let request_uri = uri::canonicalize(request_uri);
        let request_cc = CacheControl::from_headers(request_headers, DirectiveScope::Request);
        let response_cc = CacheControl::from_headers(response_headers, DirectiveScope::Response);

        let verdict = decision::can_store(
            &method,
            status_code,
            request_headers,
            &request_cc,
            response_headers,
            &response_cc,
            self.options.cache_type,
        );
        if let Storability::Reject { reason } = verdict {
            self.log("store-rejected", reason);
            EngineCounters::record(&self.counters.rejected_stores);
            return Ok(false);
        }

        let mut headers = response_headers.clone();
        headers.strip_prohibited();

        let entry = CacheEntry {
            vary_headers: key::vary_snapshot(response_headers.get("vary"), request_headers),
            is_incomplete: status_code == 206,
            content_range: response_headers.get("content-range").map(str::to_string),
            method: method.clone(),
            uri: request_uri.clone(),
            status_code,
            headers,
            body,
            request_time,
            response_time,
            is_invalid: false,
        };

        let primary = self.keys.primary(&method, &request_uri, site);
        let stored = self.storage.put(&primary, entry).await?;
        if stored {
            self.log("stored", &request_uri);
            EngineCounters::record(&self.counters.stores);
        } else {
            self.log("store-rejected", "entry-exceeds-byte-bound");
            EngineCounters::record(&self.counters.rejected_stores);
        }
        Ok(stored)
    }

    /// Freshen a stored entry from a 304 response.
    ///
    /// Returns `false` when there is no stored entry or the 304's
    /// validators do not match (the caller then treats the 304 as an
    /// ordinary response). The freshened entry replaces the old one in
    /// both tiers.
    pub async fn update_from_304(
        &self, method: &str, request_uri: &str, response_headers: &Headers, request_time: DateTime<Utc>,
        response_time: DateTime<Utc>,
    ) -> Result<bool, Error> {
        self.update_from_304_with_site(method, request_uri, response_headers, request_time, response_time, None).await
    }

    /// [`HttpCache::update_from_304`] with an explicit partition.
    pub async fn update_from_304_with_site(
        &self, method: &str, request_uri: &str, response_headers: &Headers, request_time: DateTime<Utc>,
        response_time: DateTime<Utc>, site: Option<&str>,
    ) -> Result<bool, Error> {
        let method = method.to_ascii_uppercase();
        let request_uri = uri::canonicalize(request_uri);
        let primary = self.keys.primary(&method, &request_uri, site);

        let Some(entry) = self.storage.get(&primary).await? else {
            return Ok(false);
        };

        if !validator::validators_match(&entry, response_headers) {
            self.log("validator-mismatch", &request_uri);
            return Ok(false);
        }

        let merged = validator::merge_from_304(&entry, response_headers, request_time, response_time);
        let stored = self.storage.put(&primary, merged).await?;
        if stored {
            self.log("revalidated", &request_uri);
            EngineCounters::record(&self.counters.validations);
        }
        Ok(stored)
    }

    /// Freshen the stored GET for `request_uri` from a HEAD response.
    ///
    /// Applies when the HEAD's validators match and its `Content-Length`,
    /// if present on both sides, agrees.
    pub async fn freshen_from_head(
        &self, request_uri: &str, head_headers: &Headers, request_time: DateTime<Utc>, response_time: DateTime<Utc>,
    ) -> Result<bool, Error> {
        let request_uri = uri::canonicalize(request_uri);
        let primary = self.keys.primary("GET", &request_uri, None);

        let Some(entry) = self.storage.get(&primary).await? else {
            return Ok(false);
        };

        let Some(freshened) = validator::freshen_from_head(&entry, head_headers, request_time, response_time) else {
            self.log("head-freshen-mismatch", &request_uri);
            return Ok(false);
        };

        self.storage.put(&primary, freshened).await
    }

    /// Build conditional request headers for revalidating the stored
    /// entry, or `None` when nothing is stored.
    pub async fn generate_validation_headers(
        &self, method: &str, request_uri: &str, request_headers: &Headers,
    ) -> Result<Option<Headers>, Error> {
        let method = method.to_ascii_uppercase();
        let request_uri = uri::canonicalize(request_uri);
        let primary = self.keys.primary(&method, &request_uri, None);

        let Some(entry) = self.storage.get(&primary).await? else {
            return Ok(None);
        };

        Ok(Some(validator::conditional_headers(request_headers, &entry)))
    }

    /// Invalidate cached representations after an unsafe method succeeded.
    ///
    /// Completes before returning, so a caller finishing its unsafe
    /// request observes the purge.
    pub async fn invalidate_on_unsafe_method(
        &self, method: &str, request_uri: &str, status_code: u16, response_headers: &Headers,
    ) -> Result<(), Error> {
        let method = method.to_ascii_uppercase();
        let request_uri = uri::canonicalize(request_uri);

        let removed = invalidate::on_unsafe_method(
            self.storage.as_ref(),
            &self.keys,
            &method,
            &request_uri,
            status_code,
            response_headers,
            None,
        )
        .await?;

        if removed > 0 {
            self.log("invalidated", &request_uri);
            EngineCounters::record_n(&self.counters.invalidations, removed);
        }
        Ok(())
    }

    /// Drop every entry sharing an origin with `origin_uri`.
    pub async fn invalidate_origin(&self, origin_uri: &str) -> Result<u64, Error> {
        let removed = invalidate::origin(self.storage.as_ref(), origin_uri).await?;
        EngineCounters::record_n(&self.counters.invalidations, removed);
        Ok(removed)
    }

    /// Drop every entry the predicate selects.
    pub async fn invalidate_pattern(&self, predicate: EntryPredicate) -> Result<u64, Error> {
        let removed = self.storage.clear_where(predicate).await?;
        EngineCounters::record_n(&self.counters.invalidations, removed);
        Ok(removed)
    }

    /// Fallback read for a failed upstream fetch: return a stale entry
    /// when configuration and the response grammar permit serving it.
    pub async fn serve_stale(
        &self, method: &str, request_uri: &str, request_headers: &Headers,
    ) -> Result<Option<CachedResponse>, Error> {
        if !self.options.serve_stale_on_error {
            return Ok(None);
        }

        let method = method.to_ascii_uppercase();
        let request_uri = uri::canonicalize(request_uri);
        let request_cc = CacheControl::from_headers(request_headers, DirectiveScope::Request);
        let primary = self.keys.primary(&method, &request_uri, None);

        let Some(entry) = self.storage.get(&primary).await? else {
            return Ok(None);
        };

        let response_cc = CacheControl::from_headers(&entry.headers, DirectiveScope::Response);
        let now = Utc::now();
        let age = freshness::current_age(&entry, now);
        let lifetime = freshness::freshness_lifetime(&entry, &response_cc, self.options.cache_type, &self.heuristics());
        let fresh = freshness::is_fresh(age, lifetime);

        match decision::can_reuse(&method, &request_uri, request_headers, &request_cc, &entry, &response_cc, fresh) {
            Reusability::NotReusable { .. } => Ok(None),
            Reusability::Reusable => {
                EngineCounters::record(&self.counters.hits);
                Ok(Some(CachedResponse { entry, age: age.max(0) as u64, is_stale: false, requires_validation: false }))
            }
            Reusability::RequiresValidation { .. } => {
                let staleness = (age - lifetime.unwrap_or(0)).max(0);
                let allowed = freshness::may_serve_stale(
                    &response_cc,
                    &request_cc,
                    self.options.cache_type,
                    true,
                    staleness,
                ) && staleness <= self.options.max_stale_age_secs;

                if !allowed {
                    return Ok(None);
                }

                self.log("stale-on-error", &request_uri);
                EngineCounters::record(&self.counters.stale_hits);
                Ok(Some(CachedResponse { entry, age: age.max(0) as u64, is_stale: true, requires_validation: false }))
            }
        }
    }

    /// Drop everything.
    pub async fn clear(&self) -> Result<(), Error> {
        self.storage.clear().await
    }

    /// Drop every entry past its freshness lifetime (or with none).
    pub async fn clear_expired(&self) -> Result<u64, Error> {
        let cache_type = self.options.cache_type;
        let heuristics = self.heuristics();

        let predicate: EntryPredicate = Arc::new(move |entry| {
            let cc = CacheControl::from_headers(&entry.headers, DirectiveScope::Response);
            let age = freshness::current_age(entry, Utc::now());
            let lifetime = freshness::freshness_lifetime(entry, &cc, cache_type, &heuristics);
            !freshness::is_fresh(age, lifetime)
        });

        self.storage.clear_where(predicate).await
    }

    /// Decision counters combined with the storage probes.
    pub async fn stats(&self) -> Result<CacheStats, Error> {
        let entries = self.storage.size().await?;
        let bytes = self.storage.size_in_bytes().await?;
        Ok(CacheStats::from_counters(&self.counters, entries, bytes))
    }

    /// Close the storage tiers. The engine is unusable afterwards.
    pub async fn close(&self) -> Result<(), Error> {
        self.storage.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::date::format_http_date;
    use bytes::Bytes;

    async fn engine() -> HttpCache {
        HttpCache::new(CacheOptions::default()).await.unwrap()
    }

    async fn engine_with(options: CacheOptions) -> HttpCache {
        HttpCache::new(options).await.unwrap()
    }

    fn response_headers(cache_control: &str) -> Headers {
        let mut headers = Headers::new();
        headers.insert("Cache-Control", cache_control);
        headers.insert("Date", format_http_date(Utc::now()));
        headers
    }

    async fn store(cache: &HttpCache, uri: &str, response_headers: Headers, body: &'static [u8]) -> bool {
        let now = Utc::now();
        cache
            .put("GET", uri, 200, &Headers::new(), &response_headers, Bytes::from_static(body), now, now)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_miss_on_empty_cache() {
        let cache = engine().await;
        let result =
            cache.get("GET", "https://example.com/a", &Headers::new(), CachePolicy::Standard).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_put_then_fresh_get() {
        let cache = engine().await;
        assert!(store(&cache, "https://example.com/a", response_headers("max-age=300"), b"body").await);

        let result = cache
            .get("GET", "https://example.com/a", &Headers::new(), CachePolicy::Standard)
            .await
            .unwrap()
            .unwrap();
        assert!(!result.is_stale);
        assert!(!result.requires_validation);
        assert_eq!(result.entry.body, Bytes::from_static(b"body"));
        assert_eq!(result.x_cache(), "HIT");
    }

    #[tokio::test]
    async fn test_method_case_and_fragment_normalization() {
        let cache = engine().await;
        assert!(store(&cache, "https://example.com/a", response_headers("max-age=300"), b"body").await);

        let result = cache
            .get("get", "https://example.com/a#section", &Headers::new(), CachePolicy::Standard)
            .await
            .unwrap();
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn test_stale_entry_requires_validation() {
        let cache = engine().await;
        let mut headers = response_headers("max-age=0");
        headers.insert("ETag", "\"v1\"");
        assert!(store(&cache, "https://example.com/a", headers, b"body").await);

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

        let result = cache
            .get("GET", "https://example.com/a", &Headers::new(), CachePolicy::Standard)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_stale);
        assert!(result.requires_validation);
    }

    #[tokio::test]
    async fn test_cache_first_serves_stale() {
        let cache = engine().await;
        assert!(store(&cache, "https://example.com/a", response_headers("max-age=0"), b"body").await);

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

        let result = cache
            .get("GET", "https://example.com/a", &Headers::new(), CachePolicy::CacheFirst)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_stale);
        assert!(!result.requires_validation);
        assert_eq!(result.x_cache(), "HIT-STALE");
    }

    #[tokio::test]
    async fn test_network_only_skips_cache() {
        let cache = engine().await;
        assert!(store(&cache, "https://example.com/a", response_headers("max-age=300"), b"body").await);

        let result = cache
            .get("GET", "https://example.com/a", &Headers::new(), CachePolicy::NetworkOnly)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_only_if_cached_forces_cache_only() {
        let cache = engine().await;
        let request: Headers = [("Cache-Control", "only-if-cached")].into_iter().collect();

        // Miss: nothing to serve, the caller answers 504.
        let result = cache.get("GET", "https://example.com/a", &request, CachePolicy::Standard).await.unwrap();
        assert!(result.is_none());

        // A stale entry is still served under the forced cache-only policy.
        assert!(store(&cache, "https://example.com/a", response_headers("max-age=0"), b"body").await);
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        let result = cache
            .get("GET", "https://example.com/a", &request, CachePolicy::Standard)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_stale);
        assert!(!result.requires_validation);
    }

    #[tokio::test]
    async fn test_no_store_response_not_stored() {
        let cache = engine().await;
        assert!(!store(&cache, "https://example.com/a", response_headers("no-store"), b"body").await);

        let result =
            cache.get("GET", "https://example.com/a", &Headers::new(), CachePolicy::Standard).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_no_cache_hit_requires_validation() {
        let cache = engine().await;
        assert!(store(&cache, "https://example.com/a", response_headers("no-cache, max-age=300"), b"body").await);

        let result = cache
            .get("GET", "https://example.com/a", &Headers::new(), CachePolicy::Standard)
            .await
            .unwrap()
            .unwrap();
        assert!(result.requires_validation);
        assert!(!result.is_stale);
    }

    #[tokio::test]
    async fn test_post_entry_never_reused() {
        let cache = engine().await;
        let now = Utc::now();
        cache
            .put(
                "POST",
                "https://example.com/a",
                200,
                &Headers::new(),
                &response_headers("max-age=300"),
                Bytes::from_static(b"created"),
                now,
                now,
            )
            .await
            .unwrap();

        let result =
            cache.get("POST", "https://example.com/a", &Headers::new(), CachePolicy::Standard).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_vary_mismatch_is_miss() {
        let cache = engine().await;
        let mut headers = response_headers("max-age=300");
        headers.insert("Vary", "Accept-Language");

        let now = Utc::now();
        let en: Headers = [("Accept-Language", "en")].into_iter().collect();
        cache
            .put("GET", "https://example.com/a", 200, &en, &headers, Bytes::from_static(b"english"), now, now)
            .await
            .unwrap();

        let fr: Headers = [("Accept-Language", "fr")].into_iter().collect();
        let result = cache.get("GET", "https://example.com/a", &fr, CachePolicy::Standard).await.unwrap();
        assert!(result.is_none());

        let result = cache.get("GET", "https://example.com/a", &en, CachePolicy::Standard).await.unwrap();
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn test_min_fresh_narrows_freshness() {
        let cache = engine().await;
        assert!(store(&cache, "https://example.com/a", response_headers("max-age=60"), b"body").await);

        let request: Headers = [("Cache-Control", "min-fresh=3000")].into_iter().collect();
        let result = cache
            .get("GET", "https://example.com/a", &request, CachePolicy::Standard)
            .await
            .unwrap()
            .unwrap();
        assert!(result.requires_validation);
    }

    #[tokio::test]
    async fn test_update_from_304_freshens() {
        let cache = engine().await;
        let mut headers = response_headers("max-age=0");
        headers.insert("ETag", "\"v1\"");
        assert!(store(&cache, "https://example.com/a", headers, b"body").await);
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

        let stale = cache
            .get("GET", "https://example.com/a", &Headers::new(), CachePolicy::Standard)
            .await
            .unwrap()
            .unwrap();
        assert!(stale.requires_validation);

        let now = Utc::now();
        let mut not_modified = Headers::new();
        not_modified.insert("ETag", "\"v1\"");
        not_modified.insert("Cache-Control", "max-age=600");
        not_modified.insert("Date", format_http_date(now));

        assert!(cache.update_from_304("GET", "https://example.com/a", &not_modified, now, now).await.unwrap());

        let freshened = cache
            .get("GET", "https://example.com/a", &Headers::new(), CachePolicy::Standard)
            .await
            .unwrap()
            .unwrap();
        assert!(!freshened.is_stale);
        assert!(!freshened.requires_validation);
        assert_eq!(freshened.entry.body, Bytes::from_static(b"body"));
    }

    #[tokio::test]
    async fn test_update_from_304_validator_mismatch() {
        let cache = engine().await;
        let mut headers = response_headers("max-age=300");
        headers.insert("ETag", "\"v1\"");
        assert!(store(&cache, "https://example.com/a", headers, b"body").await);

        let now = Utc::now();
        let mismatched: Headers = [("ETag", "\"v2\"")].into_iter().collect();
        assert!(!cache.update_from_304("GET", "https://example.com/a", &mismatched, now, now).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalidate_on_unsafe_method() {
        let cache = engine().await;
        assert!(store(&cache, "https://example.com/a", response_headers("max-age=3600"), b"body").await);

        cache
            .invalidate_on_unsafe_method("POST", "https://example.com/a", 201, &Headers::new())
            .await
            .unwrap();

        let result =
            cache.get("GET", "https://example.com/a", &Headers::new(), CachePolicy::Standard).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_generate_validation_headers() {
        let cache = engine().await;
        let mut headers = response_headers("max-age=300");
        headers.insert("ETag", "\"v1\"");
        assert!(store(&cache, "https://example.com/a", headers, b"body").await);

        let conditional = cache
            .generate_validation_headers("GET", "https://example.com/a", &Headers::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conditional.get("if-none-match"), Some("\"v1\""));

        let none = cache
            .generate_validation_headers("GET", "https://example.com/missing", &Headers::new())
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_freshen_from_head() {
        let cache = engine().await;
        let mut headers = response_headers("max-age=0");
        headers.insert("ETag", "\"v1\"");
        assert!(store(&cache, "https://example.com/a", headers, b"body").await);

        let now = Utc::now();
        let mut head = Headers::new();
        head.insert("ETag", "\"v1\"");
        head.insert("Cache-Control", "max-age=900");
        head.insert("Date", format_http_date(now));

        assert!(cache.freshen_from_head("https://example.com/a", &head, now, now).await.unwrap());

        let result = cache
            .get("GET", "https://example.com/a", &Headers::new(), CachePolicy::Standard)
            .await
            .unwrap()
            .unwrap();
        assert!(!result.is_stale);
        assert_eq!(result.entry.body, Bytes::from_static(b"body"));
    }

    #[tokio::test]
    async fn test_serve_stale_after_upstream_failure() {
        let cache = engine().await;
        assert!(store(&cache, "https://example.com/a", response_headers("max-age=0"), b"body").await);
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

        let result = cache.serve_stale("GET", "https://example.com/a", &Headers::new()).await.unwrap().unwrap();
        assert!(result.is_stale);
        assert!(!result.requires_validation);
    }

    #[tokio::test]
    async fn test_serve_stale_respects_must_revalidate() {
        let cache = engine().await;
        assert!(
            store(&cache, "https://example.com/a", response_headers("max-age=0, must-revalidate"), b"body").await
        );
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

        let result = cache.serve_stale("GET", "https://example.com/a", &Headers::new()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_serve_stale_disabled_by_config() {
        let cache = engine_with(CacheOptions { serve_stale_on_error: false, ..Default::default() }).await;
        assert!(store(&cache, "https://example.com/a", response_headers("max-age=0"), b"body").await);

        let result = cache.serve_stale("GET", "https://example.com/a", &Headers::new()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_clear_expired() {
        let cache = engine().await;
        assert!(store(&cache, "https://example.com/stale", response_headers("max-age=0"), b"old").await);
        assert!(store(&cache, "https://example.com/fresh", response_headers("max-age=3600"), b"new").await);
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

        let removed = cache.clear_expired().await.unwrap();
        assert_eq!(removed, 1);

        assert!(
            cache
                .get("GET", "https://example.com/fresh", &Headers::new(), CachePolicy::Standard)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_stats_track_decisions() {
        let cache = engine().await;
        cache.get("GET", "https://example.com/a", &Headers::new(), CachePolicy::Standard).await.unwrap();
        assert!(store(&cache, "https://example.com/a", response_headers("max-age=300"), b"body").await);
        cache.get("GET", "https://example.com/a", &Headers::new(), CachePolicy::Standard).await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.stores, 1);
        assert_eq!(stats.entries, 1);
        assert!(stats.bytes > 0);
    }

    #[tokio::test]
    async fn test_put_rejects_inverted_times() {
        let cache = engine().await;
        let now = Utc::now();
        let result = cache
            .put(
                "GET",
                "https://example.com/a",
                200,
                &Headers::new(),
                &response_headers("max-age=300"),
                Bytes::new(),
                now,
                now - chrono::Duration::seconds(5),
            )
            .await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_double_keying_partitions_reads() {
        let cache = engine_with(CacheOptions { double_key_cache: true, ..Default::default() }).await;
        let now = Utc::now();
        cache
            .put_with_site(
                "GET",
                "https://cdn.example.com/lib.js",
                200,
                &Headers::new(),
                &response_headers("max-age=300"),
                Bytes::from_static(b"js"),
                now,
                now,
                Some("https://site-a.com"),
            )
            .await
            .unwrap();

        let hit = cache
            .get_with_site(
                "GET",
                "https://cdn.example.com/lib.js",
                &Headers::new(),
                CachePolicy::Standard,
                Some("https://site-a.com"),
            )
            .await
            .unwrap();
        assert!(hit.is_some());

        let other_site = cache
            .get_with_site(
                "GET",
                "https://cdn.example.com/lib.js",
                &Headers::new(),
                CachePolicy::Standard,
                Some("https://site-b.com"),
            )
            .await
            .unwrap();
        assert!(other_site.is_none());
    }

    #[tokio::test]
    async fn test_custom_storage_backend() {
        let storage = Arc::new(MemoryStorage::new(10, 1024 * 1024, crate::config::EvictionStrategy::Lru));
        let cache = HttpCache::with_storage(CacheOptions::default(), storage).unwrap();

        assert!(store(&cache, "https://example.com/a", response_headers("max-age=300"), b"body").await);
        let result = cache
            .get("GET", "https://example.com/a", &Headers::new(), CachePolicy::Standard)
            .await
            .unwrap();
        assert!(result.is_some());
    }
}
