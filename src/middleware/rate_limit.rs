use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use crate::api::handlers::AppState;

pub type AdminRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

pub fn build_rate_limiter(requests: u32, per_seconds: u64) -> Arc<AdminRateLimiter> {
    let quota = Quota::with_period(Duration::from_secs(per_seconds))
        .unwrap()
        .allow_burst(NonZeroU32::new(requests).unwrap());
    Arc::new(RateLimiter::direct(quota))
}

/// Rate limiting middleware for the admin scope
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    match state.rate_limiter.check() {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => Err((
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded. Please try again later.",
        )
            .into_response()),
    }
}
