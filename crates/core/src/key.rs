//! Cache key generation.
//!
//! Primary keys are SHA-256 digests of `METHOD:uri` (fragment already
//! stripped by the caller). When double-keying is enabled, a caller-supplied
//! top-level site identifier is prefixed before hashing, partitioning the
//! cache across sites.
//!
//! `Vary`-qualified keys fold the nominated request-header values into the
//! digest; `Vary: *` hashes a sentinel that no lookup ever produces.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::http::Headers;

/// Sentinel stored in a vary map for `Vary: *`: such an entry never
/// matches any request.
pub const VARY_ASTERISK: &str = "*";

/// Deterministic key derivation for both tiers.
#[derive(Debug, Clone, Copy)]
pub struct KeyGenerator {
    double_key: bool,
}

impl KeyGenerator {
    pub fn new(double_key: bool) -> Self {
        Self { double_key }
    }

    /// Primary cache key for a method/URI pair.
    ///
    /// `site` is folded in only when double-keying is enabled.
    pub fn primary(&self, method: &str, uri: &str, site: Option<&str>) -> String {
        let mut hasher = Sha256::new();
        if self.double_key {
            if let Some(site) = site {
                hasher.update(site.as_bytes());
                hasher.update(b"\n");
            }
        }
        hasher.update(method.as_bytes());
        hasher.update(b":");
        hasher.update(uri.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// `Vary`-qualified key for a response that nominated request fields.
    ///
    /// An absent or empty `Vary` yields the primary key unchanged;
    /// `Vary: *` yields a sentinel key that no lookup matches.
    pub fn vary_qualified(&self, primary: &str, vary: &str, request_headers: &Headers) -> String {
        let fields = vary_field_names(vary);
        if fields.is_empty() {
            return primary.to_string();
        }

        let mut hasher = Sha256::new();
        hasher.update(primary.as_bytes());
        hasher.update(b"vary:");

        if fields.iter().any(|f| f == VARY_ASTERISK) {
            hasher.update(b"*");
        } else {
            let serialized = fields
                .iter()
                .map(|name| {
                    let value = request_headers.get(name).map(normalize_field_value).unwrap_or_default();
                    format!("{name}:{value}")
                })
                .collect::<Vec<_>>()
                .join("|");
            hasher.update(serialized.as_bytes());
        }

        hex::encode(hasher.finalize())
    }
}

/// Capture the request values a response's `Vary` nominates, at storage
/// time. Returns `None` when the response has no `Vary`; `Vary: *` yields
/// the `{"*": "*"}` sentinel map.
pub fn vary_snapshot(vary: Option<&str>, request_headers: &Headers) -> Option<BTreeMap<String, String>> {
    let fields = vary_field_names(vary?);
    if fields.is_empty() {
        return None;
    }

    if fields.iter().any(|f| f == VARY_ASTERISK) {
        return Some(BTreeMap::from([(VARY_ASTERISK.to_string(), VARY_ASTERISK.to_string())]));
    }

    Some(
        fields
            .into_iter()
            .map(|name| {
                let value = request_headers.get(&name).map(normalize_field_value).unwrap_or_default();
                (name, value)
            })
            .collect(),
    )
}

/// Whether a stored vary snapshot matches the current request.
///
/// The `Vary: *` sentinel never matches. An absent request field compares
/// as the empty string, so "absent then" matches "absent now".
pub fn vary_matches(stored: &BTreeMap<String, String>, request_headers: &Headers) -> bool {
    if stored.contains_key(VARY_ASTERISK) {
        return false;
    }

    stored.iter().all(|(name, stored_value)| {
        let current = request_headers.get(name).map(normalize_field_value).unwrap_or_default();
        current == *stored_value
    })
}

/// Collapse internal whitespace runs to one space and trim the ends.
pub fn normalize_field_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Sorted, lowercased, deduplicated field names from a `Vary` value.
fn vary_field_names(vary: &str) -> Vec<String> {
    let mut fields: Vec<String> = vary
        .split(',')
        .map(|f| f.trim().to_ascii_lowercase())
        .filter(|f| !f.is_empty())
        .collect();
    fields.sort();
    fields.dedup();
    fields
}
