mod accounts;
mod error;
mod protected;
mod tokens;

use axum::Router;
use std::sync::Arc;

use crate::auth::SessionController;
use crate::impl_has_auth_backend;
use crate::jwt::TokenCodec;
use crate::rate_limit::RateLimitConfig;

pub use error::ApiError;

/// State shared by every API handler.
#[derive(Clone)]
pub struct ApiState {
    pub sessions: SessionController,
    pub codec: Arc<TokenCodec>,
    /// Whether to set the Secure flag on the refresh cookie
    pub secure_cookies: bool,
}

impl_has_auth_backend!(ApiState);

/// Create the API router.
///
/// With `rate_limit`, `/login` and `/register` are limited per client IP.
pub fn create_api_router(
    sessions: SessionController,
    secure_cookies: bool,
    rate_limit: Option<Arc<RateLimitConfig>>,
) -> Router {
    let state = ApiState {
        codec: sessions.codec().clone(),
        sessions,
        secure_cookies,
    };

    Router::new()
        .merge(accounts::router(state.clone(), rate_limit))
        .merge(tokens::router(state.clone()))
        .merge(protected::router(state))
}
