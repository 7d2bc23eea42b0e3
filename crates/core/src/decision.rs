//! Storability and reusability decisions.
//!
//! Both deciders return a reason code with every rejection; the engine
//! logs them and the stats counters bucket on them. Reason strings are
//! stable identifiers, not display text.

use crate::config::CacheType;
use crate::entry::CacheEntry;
use crate::http::cache_control::CacheControl;
use crate::http::headers::{self, Headers};
use crate::key;

/// Whether a response may be written into the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storability {
    Store,
    Reject { reason: &'static str },
}

impl Storability {
    pub fn is_storable(&self) -> bool {
        matches!(self, Storability::Store)
    }
}

/// Whether a stored entry may answer a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reusability {
    Reusable,
    RequiresValidation { reason: &'static str },
    NotReusable { reason: &'static str },
}

/// Gate a response on its way into storage.
///
/// All conditions must hold: cacheable method, final status, no `no-store`
/// on either side, `private` only in private caches, an `Authorization`
/// request vouched for by the response, and at least one storage indicator.
pub fn can_store(
    method: &str, status: u16, request_headers: &Headers, request_cc: &CacheControl, response_headers: &Headers,
    response_cc: &CacheControl, cache_type: CacheType,
) -> Storability {
    if !headers::is_cacheable_method(method) {
        return Storability::Reject { reason: "method-not-cacheable" };
    }
    if !headers::is_final_status(status) {
        return Storability::Reject { reason: "status-not-final" };
    }
    if response_cc.no_store {
        return Storability::Reject { reason: "response-no-store" };
    }
    if request_cc.no_store {
        return Storability::Reject { reason: "request-no-store" };
    }
    if cache_type.is_shared() && response_cc.private {
        return Storability::Reject { reason: "private-response-in-shared-cache" };
    }

    if request_headers.contains("authorization")
        && !(response_cc.public || response_cc.must_revalidate || response_cc.s_maxage.is_some())
    {
        return Storability::Reject { reason: "authorization-not-vouched" };
    }

    let has_indicator = response_cc.public
        || (!cache_type.is_shared() && response_cc.private)
        || response_headers.contains("expires")
        || response_cc.max_age.is_some()
        || (cache_type.is_shared() && response_cc.s_maxage.is_some())
        || headers::is_heuristically_cacheable_status(status);

    if !has_indicator {
        return Storability::Reject { reason: "no-storage-indicator" };
    }

    Storability::Store
}

/// Gate a stored entry against an incoming request.
///
/// `fresh` is the engine's freshness verdict for this request (already
/// narrowed by `min-fresh`).
pub fn can_reuse(
    method: &str, uri: &str, request_headers: &Headers, request_cc: &CacheControl, entry: &CacheEntry,
    response_cc: &CacheControl, fresh: bool,
) -> Reusability {
    if entry.is_invalid {
        return Reusability::NotReusable { reason: "entry-invalidated" };
    }
    if !headers::is_safe_reusable_method(method) {
        return Reusability::NotReusable { reason: "method-not-safe" };
    }
    if entry.uri != uri {
        return Reusability::NotReusable { reason: "uri-mismatch" };
    }

    if let Some(vary) = &entry.vary_headers {
        if vary.contains_key(key::VARY_ASTERISK) {
            return Reusability::NotReusable { reason: "vary-asterisk" };
        }
        if !key::vary_matches(vary, request_headers) {
            return Reusability::NotReusable { reason: "vary-mismatch" };
        }
    }

    if response_cc.no_cache || request_cc.no_cache {
        return Reusability::RequiresValidation { reason: "no-cache" };
    }
    if !fresh {
        return Reusability::RequiresValidation { reason: "stale" };
    }

    Reusability::Reusable
}
