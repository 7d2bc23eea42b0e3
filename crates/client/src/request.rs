//! Value objects bundling request and response shapes.
//!
//! Adapters for concrete HTTP libraries construct these instead of calling
//! the engine's primitive-args API directly.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use stratus_core::{CachePolicy, Headers};

/// A request about to go through the cache.
#[derive(Debug, Clone)]
pub struct CachedRequest {
    pub method: String,
    pub uri: String,
    pub headers: Headers,
    pub policy: CachePolicy,
    /// Top-level site for double-keyed caches; ignored otherwise.
    pub top_level_site: Option<String>,
    /// Whether the caller understands partial (206) responses. Incomplete
    /// entries are only served when set.
    pub allow_incomplete: bool,
}

impl CachedRequest {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            headers: Headers::new(),
            policy: CachePolicy::Standard,
            top_level_site: None,
            allow_incomplete: false,
        }
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn site(&self) -> Option<&str> {
        self.top_level_site.as_deref()
    }
}

/// What the network returned for a request.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
    /// When the request was sent.
    pub request_time: DateTime<Utc>,
    /// When the response was received.
    pub response_time: DateTime<Utc>,
}

/// A response ready to hand to the application, with cache headers
/// (`age`, `warning`, `x-cache`) already applied.
#[derive(Debug, Clone)]
pub struct ServedResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

impl ServedResponse {
    /// The `x-cache` value applied to this response.
    pub fn x_cache(&self) -> Option<&str> {
        self.headers.get("x-cache")
    }
}
