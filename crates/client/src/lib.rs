//! Interceptor toolkit for stratus.
//!
//! This crate is the seam between a concrete HTTP client and the caching
//! engine. Adapters translate their library's request/response types into
//! the value objects here, ask [`plan_request`] what to do, and hand
//! upstream results back through [`complete_request`]. No HTTP transport
//! lives here.

pub mod decorate;
pub mod intercept;
pub mod request;

pub use intercept::{FetchPlan, complete_request, complete_with_error, plan_request};
pub use request::{CachedRequest, ServedResponse, UpstreamResponse};
