//! Generic read-through response cache middleware.
//!
//! Wraps side-effect-free GET routes: a hit is served verbatim without
//! running the handler; on a miss the handler runs and a `200` JSON body is
//! stored under the computed key before the response is returned. Bodies over
//! the buffering limit are passed through uncached.

use std::sync::Arc;

use axum::{
    body::{Body, HttpBody},
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, instrument, warn};

use super::service::CacheService;

/// Upper bound on a response body buffered for caching.
const MAX_CACHED_BODY: usize = 1024 * 1024;

pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// Computes the cache key for a request; `None` bypasses the cache.
pub type KeyFn = Arc<dyn Fn(&Request<Body>) -> Option<String> + Send + Sync>;

#[derive(Clone)]
pub struct ReadThroughState {
    cache: CacheService,
    key_fn: KeyFn,
    ttl_seconds: Option<u64>,
}

impl ReadThroughState {
    pub fn new<F>(cache: CacheService, key_fn: F, ttl_seconds: Option<u64>) -> Self
    where
        F: Fn(&Request<Body>) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            cache,
            key_fn: Arc::new(key_fn),
            ttl_seconds,
        }
    }

    /// Same key for every request.
    pub fn literal(cache: CacheService, key: impl Into<String>, ttl_seconds: Option<u64>) -> Self {
        let key = key.into();
        Self::new(cache, move |_| Some(key.clone()), ttl_seconds)
    }
}

#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn read_through_layer(
    State(state): State<ReadThroughState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let Some(key) = (state.key_fn)(&request) else {
        return next.run(request).await;
    };

    if let Some(cached) = state.cache.get_raw(&key).await {
        debug!(key = %key, outcome = "hit", "serving cached response");
        return cached_response(cached);
    }

    let response = next.run(request).await;
    if response.status() != StatusCode::OK || !is_json(&response) {
        return response;
    }
    if !fits_in_cache(&response) {
        debug!(key = %key, "response body too large or unbounded; not caching");
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_CACHED_BODY).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(key = %key, error = %err, "failed to buffer response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match std::str::from_utf8(&bytes) {
        Ok(text) => {
            let ttl = state.ttl_seconds.unwrap_or(state.cache.default_ttl());
            let stored = state.cache.set_raw(&key, text.to_string(), ttl).await;
            debug!(key = %key, outcome = "miss", stored, "response captured");
        }
        Err(_) => debug!(key = %key, "skipping non utf-8 body"),
    }

    parts
        .headers
        .insert(CACHE_STATUS_HEADER, HeaderValue::from_static("miss"));
    Response::from_parts(parts, Body::from(bytes))
}

/// Only bodies with a known size under the limit are buffered.
fn fits_in_cache(response: &Response) -> bool {
    response
        .body()
        .size_hint()
        .upper()
        .is_some_and(|upper| upper <= MAX_CACHED_BODY as u64)
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}

fn cached_response(body: String) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .header(CACHE_STATUS_HEADER, "hit")
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
