//! # Middleware Module
//!
//! Global request rate limiting.
//!
//! `TRELLIS_RATE_LIMIT` sets the allowed requests per second (default 100,
//! `0` disables the limiter).

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use std::sync::Arc;

// =============================================================================
// RATE LIMITER
// =============================================================================

/// Environment variable holding the limit.
pub const RATE_LIMIT_ENV: &str = "TRELLIS_RATE_LIMIT";

/// Requests per second when nothing is configured.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

/// Limiter shared by every route.
pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Limiter admitting `requests_per_second`. Zero falls back to the default.
pub fn create_rate_limiter(requests_per_second: u32) -> GlobalRateLimiter {
    let rps = NonZeroU32::new(requests_per_second)
        .or(NonZeroU32::new(DEFAULT_RATE_LIMIT))
        .unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_second(rps)))
}

/// Configured limit. Unparseable values use the default.
pub fn get_rate_limit_from_env() -> u32 {
    parse_rate_limit(std::env::var(RATE_LIMIT_ENV).ok().as_deref())
}

fn parse_rate_limit(raw: Option<&str>) -> u32 {
    match raw.map(str::trim).map(str::parse::<u32>) {
        Some(Ok(limit)) => limit,
        Some(Err(_)) => {
            tracing::warn!("{} is not a number, using {}", RATE_LIMIT_ENV, DEFAULT_RATE_LIMIT);
            DEFAULT_RATE_LIMIT
        }
        None => DEFAULT_RATE_LIMIT,
    }
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

/// Answer 429 once the global quota is spent.
pub async fn rate_limit_middleware(
    State(limiter): State<GlobalRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    if limiter.check().is_err() {
        tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
        return Err((StatusCode::TOO_MANY_REQUESTS, "Too Many Requests"));
    }
    Ok(next.run(request).await)
}

// =============================================================================
// TESTS
// =============================================================================
