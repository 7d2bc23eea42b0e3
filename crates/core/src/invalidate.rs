//! Invalidation on unsafe methods.
//!
//! A successful POST/PUT/DELETE/PATCH drops cached representations of its
//! target URI, plus `Location` / `Content-Location` referents when they are
//! same-origin with the target. This is a best-effort purge by key, not a
//! full scan: a small set of `Vary`-probe keys derived from common
//! nominating headers is dropped alongside the primary keys.

use crate::error::Error;
use crate::http::headers::{self, Headers};
use crate::http::uri;
use crate::key::KeyGenerator;
use crate::storage::CacheStorage;

/// Methods whose stored entries are dropped for an invalidated URI.
const INVALIDATED_METHODS: &[&str] = &["GET", "HEAD", "POST"];

/// Common `Vary`-nominating fields probed during invalidation.
const VARY_PROBE_FIELDS: &[&str] = &["accept", "accept-encoding", "accept-language"];

/// Invalidate cached entries after an unsafe method succeeded.
///
/// No-op unless the method is unsafe and the status is in 200..=399.
/// Returns the number of entries actually removed.
pub async fn on_unsafe_method(
    storage: &dyn CacheStorage, keys: &KeyGenerator, method: &str, target_uri: &str, status: u16,
    response_headers: &Headers, site: Option<&str>,
) -> Result<u64, Error> {
    if !headers::is_unsafe_method(method) || !(200..400).contains(&status) {
        return Ok(0);
    }

    let mut targets = vec![target_uri.to_string()];
    for field in ["location", "content-location"] {
        if let Some(reference) = response_headers.get(field) {
            if let Some(resolved) = uri::resolve_reference(target_uri, reference) {
                // Cross-origin referents are never invalidated.
                if uri::same_origin(target_uri, &resolved) && !targets.contains(&resolved) {
                    targets.push(resolved);
                }
            }
        }
    }

    let mut removed = 0u64;
    for target in &targets {
        for method in INVALIDATED_METHODS {
            let primary = keys.primary(method, target, site);
            if storage.remove(&primary).await? {
                removed += 1;
            }

            for field in VARY_PROBE_FIELDS {
                let probe = keys.vary_qualified(&primary, field, &Headers::new());
                if storage.remove(&probe).await? {
                    removed += 1;
                }
            }
        }
    }

    Ok(removed)
}

/// Drop every entry whose URI shares an origin with `origin_uri`.
pub async fn origin(storage: &dyn CacheStorage, origin_uri: &str) -> Result<u64, Error> {
    let origin_uri = origin_uri.to_string();
    storage
        .clear_where(std::sync::Arc::new(move |entry| uri::same_origin(&origin_uri, &entry.uri)))
        .await
}
