//! The interceptor flow: plan a request, complete it with the upstream
//! result.
//!
//! [`plan_request`] consults the engine before the network;
//! [`complete_request`] stores, freshens, or invalidates afterwards.
//! Adapters match [`FetchPlan`] exhaustively; there is no catch-all
//! variant and none should be added.

use stratus_core::{CachePolicy, CachedResponse, DirectiveScope, Error, Headers, HttpCache, validator};
use stratus_core::http::cache_control::CacheControl;
use stratus_core::http::headers::is_unsafe_method;

use crate::decorate;
use crate::request::{CachedRequest, ServedResponse, UpstreamResponse};

/// What the adapter should do for a request.
#[derive(Debug)]
pub enum FetchPlan {
    /// Hand this response to the application; no network involved.
    Serve(ServedResponse),
    /// Send a conditional request with these headers, then call
    /// [`complete_request`] with the result.
    Revalidate { conditional_headers: Headers, cached: CachedResponse },
    /// Fetch from the network, then call [`complete_request`].
    Fetch,
    /// The policy forbids the network and the cache cannot answer;
    /// adapters conventionally answer 504.
    Unsatisfiable,
}

/// Decide how to satisfy a request.
pub async fn plan_request(cache: &HttpCache, request: &CachedRequest) -> Result<FetchPlan, Error> {
    let cached = cache
        .get_with_site(&request.method, &request.uri, &request.headers, request.policy, request.site())
        .await?;

    let cache_only = is_cache_only(request);

    let Some(cached) = cached else {
        return Ok(if cache_only { FetchPlan::Unsatisfiable } else { FetchPlan::Fetch });
    };

    if cached.entry.is_incomplete && !request.allow_incomplete {
        // The stored 206 is only useful to range-aware callers.
        return Ok(if cache_only { FetchPlan::Unsatisfiable } else { FetchPlan::Fetch });
    }

    if cached.requires_validation {
        if cache_only {
            return Ok(FetchPlan::Unsatisfiable);
        }
        let conditional_headers = validator::conditional_headers(&request.headers, &cached.entry);
        return Ok(FetchPlan::Revalidate { conditional_headers, cached });
    }

    Ok(FetchPlan::Serve(serve_from_cache(&cached)))
}

/// Fold an upstream response back through the cache and produce the
/// response to hand to the application.
pub async fn complete_request(
    cache: &HttpCache, request: &CachedRequest, upstream: &UpstreamResponse,
) -> Result<ServedResponse, Error> {
    let method = request.method.to_ascii_uppercase();

    if upstream.status == 304 {
        let updated = cache
            .update_from_304_with_site(
                &method,
                &request.uri,
                &upstream.headers,
                upstream.request_time,
                upstream.response_time,
                request.site(),
            )
            .await?;

        if updated {
            // Re-read the freshened entry; CacheFirst tolerates an entry
            // that is somehow still stale.
            if let Some(cached) = cache
                .get_with_site(&method, &request.uri, &request.headers, CachePolicy::CacheFirst, request.site())
                .await?
            {
                return Ok(serve_from_cache(&cached));
            }
        }

        // No stored entry or mismatched validators: the 304 passes
        // through and the caller refetches.
        tracing::debug!(uri = %request.uri, "304 did not match a stored entry");
        return Ok(pass_through(upstream));
    }

    if is_unsafe_method(&method) {
        cache
            .invalidate_on_unsafe_method(&method, &request.uri, upstream.status, &upstream.headers)
            .await?;
        return Ok(pass_through(upstream));
    }

    if method == "HEAD" {
        cache
            .freshen_from_head(&request.uri, &upstream.headers, upstream.request_time, upstream.response_time)
            .await?;
        return Ok(pass_through(upstream));
    }

    cache
        .put_with_site(
            &method,
            &request.uri,
            upstream.status,
            &request.headers,
            &upstream.headers,
            upstream.body.clone(),
            upstream.request_time,
            upstream.response_time,
            request.site(),
        )
        .await?;

    Ok(pass_through(upstream))
}

/// Fallback after the network failed: serve a stale entry when the engine
/// permits, marked with `warning: 111`.
pub async fn complete_with_error(
    cache: &HttpCache, request: &CachedRequest,
) -> Result<Option<ServedResponse>, Error> {
    let Some(cached) = cache.serve_stale(&request.method, &request.uri, &request.headers).await? else {
        return Ok(None);
    };

    if cached.entry.is_incomplete && !request.allow_incomplete {
        return Ok(None);
    }

    let mut headers = cached.entry.headers.clone();
    headers.strip_hop_by_hop();
    decorate::decorate_revalidation_failure(&mut headers, cached.age);

    Ok(Some(ServedResponse { status: cached.entry.status_code, headers, body: cached.entry.body.clone() }))
}

fn serve_from_cache(cached: &CachedResponse) -> ServedResponse {
    let mut headers = cached.entry.headers.clone();
    headers.strip_hop_by_hop();
    decorate::decorate_hit(&mut headers, cached.age, cached.is_stale);

    ServedResponse { status: cached.entry.status_code, headers, body: cached.entry.body.clone() }
}

fn pass_through(upstream: &UpstreamResponse) -> ServedResponse {
    let mut headers = upstream.headers.clone();
    decorate::decorate_miss(&mut headers);
    ServedResponse { status: upstream.status, headers, body: upstream.body.clone() }
}

fn is_cache_only(request: &CachedRequest) -> bool {
    request.policy == CachePolicy::CacheOnly
        || CacheControl::from_headers(&request.headers, DirectiveScope::Request).only_if_cached
}
