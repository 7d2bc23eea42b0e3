//! HTTP semantics primitives.
//!
//! This module owns everything below the cache decision layer:
//!
//! - Case-insensitive header container preserving original field casing
//! - `Cache-Control` directive parsing
//! - HTTP date parsing (IMF-fixdate, RFC 850, asctime, RFC 2822, ISO-8601)
//! - URI canonicalization (fragment strip, lowercase host)
//! - Method and status classification tables

pub mod cache_control;
pub mod date;
pub mod headers;
pub mod uri;

pub use cache_control::{CacheControl, DirectiveScope, MaxStale};
pub use headers::Headers;
