pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod rate_limit;

use api::create_api_router;
use auth::{LogoutPolicy, PasswordHasher, SessionController};
use axum::Router;
use db::CredentialStore;
use jwt::{TokenCodec, TokenSettings};
use rate_limit::{EVICTION_INTERVAL, RateLimitConfig, spawn_eviction_scheduler};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Credential store holding users and their current refresh token
    pub store: Arc<dyn CredentialStore>,
    /// Signing secrets and lifetimes for both token kinds
    pub tokens: TokenSettings,
    /// Password digest implementation
    pub hasher: Arc<dyn PasswordHasher>,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// What logout does to the stored refresh token
    pub logout_policy: LogoutPolicy,
    /// Login/register attempts per client IP per minute, 0 disables limiting
    pub login_rate_per_minute: u32,
    /// Key rate limits on X-Forwarded-For (requires running behind a proxy)
    pub trust_forwarded_for: bool,
}

/// Create the application router with the given configuration.
///
/// Must be called from within a Tokio runtime when rate limiting is enabled,
/// since the limiter's idle-key eviction runs as a background task.
pub fn create_app(config: &ServerConfig) -> Router {
    let codec = Arc::new(TokenCodec::new(&config.tokens));

    let sessions = SessionController::new(
        config.store.clone(),
        codec,
        config.hasher.clone(),
        config.logout_policy,
    );

    let rate_limit = NonZeroU32::new(config.login_rate_per_minute).map(|per_minute| {
        let limits = RateLimitConfig::new(per_minute, config.trust_forwarded_for);
        spawn_eviction_scheduler(&limits, EVICTION_INTERVAL);
        Arc::new(limits)
    });

    create_api_router(sessions, config.secure_cookies, rate_limit)
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(
    config: ServerConfig,
    listener: TcpListener,
) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
