//! Stored response snapshots and engine read results.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::http::Headers;

/// One stored response snapshot.
///
/// Entries are immutable after creation: revalidation produces a new entry
/// with merged headers and fresh times rather than mutating in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Uppercase-normalized request method.
    pub method: String,
    /// Absolute URI with the fragment stripped.
    pub uri: String,
    /// Final response status (never 1xx).
    pub status_code: u16,
    /// Response headers, prohibited fields already removed.
    pub headers: Headers,
    /// Opaque response body.
    pub body: Bytes,
    /// When the request that produced this response was sent.
    pub request_time: DateTime<Utc>,
    /// When the response was received; never earlier than `request_time`.
    pub response_time: DateTime<Utc>,
    /// Request values nominated by the response's `Vary`, captured at
    /// storage time. `{"*": "*"}` marks a response that never matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vary_headers: Option<BTreeMap<String, String>>,
    /// A partial (206) response was stored; reusable only by callers that
    /// understand ranges.
    #[serde(default)]
    pub is_incomplete: bool,
    /// The `Content-Range` value of a partial response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_range: Option<String>,
    /// Soft tombstone: present but not reusable. Kept so validators can
    /// still be derived from the entry.
    #[serde(default)]
    pub is_invalid: bool,
}

impl CacheEntry {
    /// Deterministic byte accounting: body, header names and values, URI,
    /// method, and the vary snapshot if present.
    pub fn size_bytes(&self) -> u64 {
        let vary_bytes: u64 = self
            .vary_headers
            .as_ref()
            .map(|m| m.iter().map(|(k, v)| (k.len() + v.len()) as u64).sum())
            .unwrap_or(0);

        self.body.len() as u64 + self.headers.byte_len() + self.uri.len() as u64 + self.method.len() as u64 + vary_bytes
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// The entity tag stored with this entry, if any.
    pub fn etag(&self) -> Option<&str> {
        self.headers.get("etag")
    }

    /// The `Last-Modified` value stored with this entry, if any.
    pub fn last_modified(&self) -> Option<&str> {
        self.headers.get("last-modified")
    }
}

/// Per-request cache intent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CachePolicy {
    /// Normal HTTP caching semantics.
    #[default]
    Standard,
    /// Skip cache reads entirely.
    NetworkOnly,
    /// Serve from cache even when stale; fetch only on miss.
    CacheFirst,
    /// Serve from cache or nothing (the `only-if-cached` behavior).
    CacheOnly,
    /// Prefer the network; the cache is a fallback for the caller.
    NetworkFirst,
}

/// What the engine hands back on a cache read.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub entry: CacheEntry,
    /// Current age in seconds at serve time.
    pub age: u64,
    /// The entry is past its freshness lifetime.
    pub is_stale: bool,
    /// The entry must be revalidated before use.
    pub requires_validation: bool,
}

impl CachedResponse {
    /// The `x-cache` value adapters propagate for this result.
    pub fn x_cache(&self) -> &'static str {
        if self.is_stale { "HIT-STALE" } else { "HIT" }
    }
}
