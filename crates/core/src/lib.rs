//! Browser-style HTTP response caching engine.
//!
//! This crate provides:
//! - HTTP caching semantics: `Cache-Control` parsing, age and freshness
//!   arithmetic, storability/reusability decisions, validators, `Vary`
//!   fan-out, unsafe-method invalidation
//! - A two-tier store: bounded in-memory L1 over a SQLite L2, with
//!   pluggable eviction and a storage trait for custom backends
//! - The [`HttpCache`] engine facade orchestrating both

pub mod config;
pub mod decision;
pub mod engine;
pub mod entry;
pub mod error;
pub mod freshness;
pub mod http;
pub mod invalidate;
pub mod key;
pub mod stats;
pub mod storage;
pub mod validator;

pub use config::{CacheOptions, CacheType, ConfigError, EvictionStrategy};
pub use engine::HttpCache;
pub use entry::{CacheEntry, CachePolicy, CachedResponse};
pub use error::Error;
pub use http::{CacheControl, DirectiveScope, Headers, MaxStale};
pub use stats::CacheStats;
pub use storage::{CacheStorage, EntryPredicate, MemoryStorage, SqliteStorage, TieredStorage};
