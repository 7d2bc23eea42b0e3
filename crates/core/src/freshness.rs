//! Age arithmetic and freshness lifetimes.
//!
//! Age follows the RFC 9111 algorithm: the larger of the apparent age and
//! the corrected `Age` header value, plus resident time. Freshness lifetime
//! resolution order is `s-maxage` (shared caches), `max-age`,
//! `Expires − Date`, then the heuristic.

use chrono::{DateTime, Utc};

use crate::config::CacheType;
use crate::entry::CacheEntry;
use crate::http::cache_control::{CacheControl, MaxStale};
use crate::http::date::parse_http_date;

/// Lifetime granted to a heuristically cacheable status when no
/// `Last-Modified` is available to scale from.
const HEURISTIC_FALLBACK_SECS: i64 = 5 * 60;

/// Heuristic freshness settings, extracted from the engine options.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicPolicy {
    pub enabled: bool,
    /// Fraction of (Date − Last-Modified) granted as lifetime.
    pub percentage: f64,
    /// Cap on the heuristic lifetime, in seconds.
    pub max_secs: i64,
}

impl Default for HeuristicPolicy {
    fn default() -> Self {
        Self { enabled: true, percentage: 0.10, max_secs: 7 * 24 * 60 * 60 }
    }
}

/// The value of the `Date` header, defaulting to the response time when the
/// header is absent or unparseable.
pub fn date_value(entry: &CacheEntry) -> DateTime<Utc> {
    entry.header("date").and_then(parse_http_date).unwrap_or(entry.response_time)
}

/// Current age of an entry in seconds, at `now`.
pub fn current_age(entry: &CacheEntry, now: DateTime<Utc>) -> i64 {
    let date = date_value(entry);

    let apparent_age = (entry.response_time - date).num_seconds().max(0);
    let response_delay = (entry.response_time - entry.request_time).num_seconds().max(0);

    let age_header: i64 = entry.header("age").and_then(|v| v.trim().parse::<i64>().ok()).unwrap_or(0).max(0);
    let corrected_age_value = age_header + response_delay;

    let corrected_initial_age = apparent_age.max(corrected_age_value);
    let resident_time = (now - entry.response_time).num_seconds().max(0);

    corrected_initial_age + resident_time
}

/// Freshness lifetime in seconds, or `None` when the entry is never fresh.
pub fn freshness_lifetime(
    entry: &CacheEntry, response_cc: &CacheControl, cache_type: CacheType, heuristics: &HeuristicPolicy,
) -> Option<i64> {
    if cache_type.is_shared() {
        if let Some(s_maxage) = response_cc.s_maxage {
            return Some(s_maxage as i64);
        }
    }

    if let Some(max_age) = response_cc.max_age {
        return Some(max_age as i64);
    }

    if let Some(expires) = entry.header("expires") {
        // An unparseable Expires means already expired.
        return match parse_http_date(expires) {
            Some(expires) => Some((expires - date_value(entry)).num_seconds().max(0)),
            None => Some(0),
        };
    }

    heuristic_lifetime(entry, response_cc, heuristics)
}

fn heuristic_lifetime(entry: &CacheEntry, response_cc: &CacheControl, heuristics: &HeuristicPolicy) -> Option<i64> {
    let status_eligible = crate::http::headers::is_heuristically_cacheable_status(entry.status_code);

    if !heuristics.enabled || response_cc.no_cache || response_cc.no_store {
        return None;
    }
    if !response_cc.public && !status_eligible {
        return None;
    }

    let date = date_value(entry);
    if let Some(last_modified) = entry.header("last-modified").and_then(parse_http_date) {
        if last_modified <= date {
            let scaled = ((date - last_modified).num_seconds() as f64 * heuristics.percentage) as i64;
            return Some(scaled.min(heuristics.max_secs));
        }
    }

    if status_eligible { Some(HEURISTIC_FALLBACK_SECS) } else { None }
}

/// Fresh iff the current age is within the freshness lifetime.
pub fn is_fresh(age: i64, lifetime: Option<i64>) -> bool {
    matches!(lifetime, Some(lifetime) if age <= lifetime)
}

/// `min-fresh=Δ` demands at least Δ seconds of remaining lifetime.
pub fn satisfies_min_fresh(request_cc: &CacheControl, age: i64, lifetime: Option<i64>) -> bool {
    match request_cc.min_fresh {
        None => true,
        Some(min_fresh) => match lifetime {
            Some(lifetime) => lifetime - age >= min_fresh as i64,
            None => false,
        },
    }
}

/// Whether an otherwise-stale entry may be served.
///
/// Requires the response grammar to permit it (`must-revalidate` absent;
/// for shared caches also `proxy-revalidate`), and either a disconnected
/// caller or a `max-stale` allowance covering the staleness.
pub fn may_serve_stale(
    response_cc: &CacheControl, request_cc: &CacheControl, cache_type: CacheType, disconnected: bool, staleness: i64,
) -> bool {
    if response_cc.must_revalidate {
        return false;
    }
    if cache_type.is_shared() && response_cc.proxy_revalidate {
        return false;
    }

    if disconnected {
        return true;
    }

    match request_cc.max_stale {
        Some(MaxStale::Unlimited) => true,
        Some(MaxStale::Limit(limit)) => staleness <= limit as i64,
        None => false,
    }
}
