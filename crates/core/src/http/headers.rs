//! Case-insensitive header container and classification tables.
//!
//! `Headers` stores the original field casing for serialization but looks
//! up by lowercase name. Multiple values for one field are represented by
//! their comma-joined concatenation (`append`).

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Request methods whose cached entries may answer later reads.
const SAFE_REUSABLE_METHODS: &[&str] = &["GET", "HEAD"];

/// Request methods whose responses may be stored at all. POST entries are
/// stored only to support Location-referenced freshening; they never answer
/// a subsequent read.
const CACHEABLE_METHODS: &[&str] = &["GET", "HEAD", "POST"];

/// Methods that mutate server state and invalidate cached representations.
const UNSAFE_METHODS: &[&str] = &["POST", "PUT", "DELETE", "PATCH"];

/// Status codes that are cacheable without explicit freshness information.
const HEURISTICALLY_CACHEABLE_STATUSES: &[u16] = &[200, 203, 204, 206, 300, 301, 304, 404, 405, 410, 414, 501];

/// Fields never written into storage.
const PROHIBITED_STORED_HEADERS: &[&str] =
    &["connection", "proxy-authentication-info", "proxy-authorization", "proxy-authenticate"];

/// Hop-by-hop fields, stripped when preparing a stored response for
/// downstream reuse.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "proxy-authentication-info",
    "proxy-authorization",
    "proxy-authenticate",
    "keep-alive",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Case-insensitive header map.
///
/// Keyed internally by the lowercased field name; each slot keeps the
/// original casing from the first write so round-trips through storage
/// preserve names byte-exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: BTreeMap<String, (String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any existing value. The stored casing is the
    /// casing given here.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        self.inner.insert(name.to_ascii_lowercase(), (name, value));
    }

    /// Add a value to a field, comma-joining with any existing value.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let key = name.to_ascii_lowercase();
        match self.inner.get_mut(&key) {
            Some((_, existing)) => {
                existing.push_str(", ");
                existing.push_str(&value);
            }
            None => {
                self.inner.insert(key, (name, value));
            }
        }
    }

    /// Look up a field value, case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner.get(&name.to_ascii_lowercase()).map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(&name.to_ascii_lowercase())
    }

    /// Remove a field. Returns whether it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        self.inner.remove(&name.to_ascii_lowercase()).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterate as (original-cased name, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.values().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Sum of name and value byte lengths, for entry size accounting.
    pub fn byte_len(&self) -> u64 {
        self.inner.values().map(|(n, v)| (n.len() + v.len()) as u64).sum()
    }

    /// Drop fields that must never be written into storage.
    pub fn strip_prohibited(&mut self) {
        for name in PROHIBITED_STORED_HEADERS {
            self.inner.remove(*name);
        }
    }

    /// Drop hop-by-hop fields before handing a response downstream.
    pub fn strip_hop_by_hop(&mut self) {
        for name in HOP_BY_HOP_HEADERS {
            self.inner.remove(*name);
        }
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

impl Serialize for Headers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.inner.len()))?;
        for (name, value) in self.inner.values() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Headers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HeadersVisitor;

        impl<'de> Visitor<'de> for HeadersVisitor {
            type Value = Headers;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of header names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Headers, A::Error> {
                let mut headers = Headers::new();
                while let Some((name, value)) = access.next_entry::<String, String>()? {
                    headers.insert(name, value);
                }
                Ok(headers)
            }
        }

        deserializer.deserialize_map(HeadersVisitor)
    }
}

/// Whether a stored entry for this method may answer later reads.
/// Expects an uppercase-normalized method.
pub fn is_safe_reusable_method(method: &str) -> bool {
    SAFE_REUSABLE_METHODS.contains(&method)
}

/// Whether responses to this method may be stored at all.
pub fn is_cacheable_method(method: &str) -> bool {
    CACHEABLE_METHODS.contains(&method)
}

/// Whether this method invalidates cached representations of its target.
pub fn is_unsafe_method(method: &str) -> bool {
    UNSAFE_METHODS.contains(&method)
}

/// Whether this status is cacheable without explicit freshness information.
pub fn is_heuristically_cacheable_status(status: u16) -> bool {
    HEURISTICALLY_CACHEABLE_STATUSES.contains(&status)
}

/// Whether this status is final (never 1xx).
pub fn is_final_status(status: u16) -> bool {
    status >= 200
}
