//! HTTP date parsing and formatting.
//!
//! Accepts the full HTTP-date grammar (IMF-fixdate, RFC 850, asctime) plus
//! RFC 2822 and ISO-8601/RFC 3339 strings. Output is always IMF-fixdate.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Parse an HTTP date header value.
///
/// Returns `None` for anything unrecognized; callers treat that as the
/// header being absent (or, for `Expires`, as already expired).
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    // IMF-fixdate and the wider RFC 2822 grammar, e.g.
    // "Sun, 06 Nov 1994 08:49:37 GMT".
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }

    // ISO-8601 / RFC 3339, e.g. "1994-11-06T08:49:37Z".
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    // Obsolete RFC 850 format, e.g. "Sunday, 06-Nov-94 08:49:37 GMT".
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%A, %d-%b-%y %H:%M:%S GMT") {
        return Some(dt.and_utc());
    }

    // ANSI C asctime() format, e.g. "Sun Nov  6 08:49:37 1994".
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%a %b %e %H:%M:%S %Y") {
        return Some(dt.and_utc());
    }

    None
}

/// Format an instant as IMF-fixdate, e.g. for `If-Modified-Since`.
pub fn format_http_date(instant: DateTime<Utc>) -> String {
    instant.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
