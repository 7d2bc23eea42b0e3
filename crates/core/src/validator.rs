//! Conditional requests and 304 handling.
//!
//! Validators are `ETag` (compared byte-exactly, weak prefix included) and
//! `Last-Modified` (compared after stripping `W/` prefixes). A 304 whose
//! validators match freshens a stored entry by replacing a fixed set of
//! headers and both timestamps; the body never changes.

use chrono::{DateTime, Utc};

use crate::entry::CacheEntry;
use crate::http::date::{format_http_date, parse_http_date};
use crate::http::Headers;

/// Headers replaced on the stored entry by a matching 304 (or HEAD).
const REFRESHED_HEADERS: &[&str] = &["cache-control", "date", "etag", "expires", "vary", "warning"];

/// Build the conditional headers for revalidating an entry: the current
/// request headers plus `If-None-Match` / `If-Modified-Since` derived from
/// the stored validators.
pub fn conditional_headers(request_headers: &Headers, entry: &CacheEntry) -> Headers {
    let mut conditional = request_headers.clone();

    if let Some(etag) = entry.etag() {
        conditional.insert("If-None-Match", etag);
    }
    if let Some(last_modified) = entry.last_modified() {
        // Re-emit as IMF-fixdate when the stored value parses; otherwise
        // forward it verbatim.
        let value = match parse_http_date(last_modified) {
            Some(instant) => format_http_date(instant),
            None => last_modified.to_string(),
        };
        conditional.insert("If-Modified-Since", value);
    }

    conditional
}

/// Whether a 304's validators match the stored entry.
///
/// Strong match on byte-equal `ETag`s; weak match on `Last-Modified` after
/// stripping `W/` prefixes. When neither side carries any validator the
/// 304 is conservatively accepted.
pub fn validators_match(entry: &CacheEntry, response_headers: &Headers) -> bool {
    let stored_etag = entry.etag();
    let new_etag = response_headers.get("etag");
    if let (Some(stored), Some(new)) = (stored_etag, new_etag) {
        return stored == new;
    }

    let stored_lm = entry.last_modified();
    let new_lm = response_headers.get("last-modified");
    if let (Some(stored), Some(new)) = (stored_lm, new_lm) {
        return strip_weak(stored) == strip_weak(new);
    }

    stored_etag.is_none() && new_etag.is_none() && stored_lm.is_none() && new_lm.is_none()
}

/// Produce the freshened entry for a matching 304.
///
/// A defined header set is replaced from the 304, the timestamps move to
/// the validation round's times, and body, method, URI, and status stay.
pub fn merge_from_304(
    entry: &CacheEntry, response_headers: &Headers, request_time: DateTime<Utc>, response_time: DateTime<Utc>,
) -> CacheEntry {
    let mut merged = entry.clone();

    for name in REFRESHED_HEADERS {
        if let Some(value) = response_headers.get(name) {
            merged.headers.insert(*name, value);
        }
    }

    merged.request_time = request_time;
    merged.response_time = response_time;
    merged.is_invalid = false;
    merged
}

/// Freshen a stored GET from a HEAD response.
///
/// Applies the 304 merge rules when the HEAD's validators match and its
/// `Content-Length`, if present on both sides, agrees. Returns `None`
/// when the HEAD does not describe the stored body.
pub fn freshen_from_head(
    entry: &CacheEntry, head_headers: &Headers, request_time: DateTime<Utc>, response_time: DateTime<Utc>,
) -> Option<CacheEntry> {
    if !validators_match(entry, head_headers) {
        return None;
    }

    if let (Some(stored), Some(head)) = (entry.header("content-length"), head_headers.get("content-length")) {
        if stored != head {
            return None;
        }
    }

    Some(merge_from_304(entry, head_headers, request_time, response_time))
}

fn strip_weak(validator: &str) -> &str {
    validator.strip_prefix("W/").unwrap_or(validator)
}
