//! Outbound header decoration.
//!
//! Responses served from the cache carry `age`, `x-cache`, and, when
//! stale or revalidation failed, a `warning` appended to any existing
//! value.

use stratus_core::Headers;

/// `Warning` value for a stale response served anyway.
pub const WARNING_STALE: &str = "110 - \"Response is Stale\"";

/// `Warning` value for a response served after revalidation failed.
pub const WARNING_REVALIDATION_FAILED: &str = "111 - \"Revalidation Failed\"";

/// Apply cache headers to a response served from a stored entry.
pub fn decorate_hit(headers: &mut Headers, age: u64, stale: bool) {
    headers.insert("age", age.to_string());
    headers.insert("x-cache", if stale { "HIT-STALE" } else { "HIT" });
    if stale {
        headers.append("warning", WARNING_STALE);
    }
}

/// Apply cache headers to a stale response served because revalidation
/// (or the network) failed.
pub fn decorate_revalidation_failure(headers: &mut Headers, age: u64) {
    headers.insert("age", age.to_string());
    headers.insert("x-cache", "HIT-STALE");
    headers.append("warning", WARNING_REVALIDATION_FAILED);
}

/// Mark a response that went to the network.
pub fn decorate_miss(headers: &mut Headers) {
    headers.insert("x-cache", "MISS");
}
