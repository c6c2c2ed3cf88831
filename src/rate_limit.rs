//! Rate limiting for authentication endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down credential
//! stuffing against `/login` and signup spam against `/register`.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{
    num::NonZeroU32,
    sync::{Arc, Weak},
    time::Duration,
};
use tracing::{debug, warn};

use crate::api::ApiError;
use crate::auth::extract_client_ip;

/// Default requests per minute per client IP on the credential endpoints.
pub const DEFAULT_LOGIN_RATE_PER_MINUTE: u32 = 10;

/// Interval between sweeps of idle client keys.
pub const EVICTION_INTERVAL: Duration = Duration::from_secs(60);

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Rate limiting configuration for authentication endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Per-IP limiter shared by login and registration
    pub credentials: Arc<IpLimiter>,
    /// Key on the first `X-Forwarded-For` entry instead of the peer address
    pub trust_forwarded_for: bool,
}

impl RateLimitConfig {
    /// Limit each client IP to `per_minute` credential requests, allowing a
    /// burst of the same size.
    pub fn new(per_minute: NonZeroU32, trust_forwarded_for: bool) -> Self {
        Self {
            credentials: Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute))),
            trust_forwarded_for,
        }
    }

    /// Drop keys whose bucket has refilled completely, then release the
    /// freed capacity. Returns the number of keys still tracked.
    pub fn evict_idle(&self) -> usize {
        evict_idle(&self.credentials)
    }
}

fn evict_idle(limiter: &IpLimiter) -> usize {
    let before = limiter.len();
    limiter.retain_recent();
    limiter.shrink_to_fit();
    let after = limiter.len();
    if after < before {
        debug!(evicted = before - after, remaining = after, "Evicted idle rate limit keys");
    }
    after
}

/// Spawn a background task that evicts idle keys every `period`.
/// The task ends once the limiter itself has been dropped.
pub fn spawn_eviction_scheduler(
    config: &RateLimitConfig,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    let limiter: Weak<IpLimiter> = Arc::downgrade(&config.credentials);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);

        loop {
            interval.tick().await;
            let Some(limiter) = limiter.upgrade() else {
                break;
            };
            evict_idle(&limiter);
        }
    })
}

/// Middleware for rate limiting login and registration.
pub async fn rate_limit_credentials(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    // Without a peer address every such request shares one bucket
    let ip = extract_client_ip(&request, config.trust_forwarded_for)
        .unwrap_or_else(|| "unknown".to_string());

    match config.credentials.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            warn!(ip = %ip, path = %request.uri().path(), "Rate limit exceeded");
            ApiError::too_many_requests("Too many attempts. Please wait before trying again.")
                .into_response()
        }
    }
}
