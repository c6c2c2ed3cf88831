//! CLI argument parsing, validation, and startup helpers.

use std::sync::Arc;

use crate::ServerConfig;
use crate::auth::{Argon2Hasher, LogoutPolicy};
use crate::db::Database;
use crate::jwt::{DEFAULT_ACCESS_TOKEN_TTL_SECS, DEFAULT_REFRESH_TOKEN_TTL_SECS, TokenSettings};
use crate::rate_limit::DEFAULT_LOGIN_RATE_PER_MINUTE;
use clap::Parser;
use tracing::{error, info};

const MIN_SECRET_LENGTH: usize = 32;

pub const ACCESS_SECRET_ENV: &str = "ACCESS_TOKEN_SECRET";
pub const REFRESH_SECRET_ENV: &str = "REFRESH_TOKEN_SECRET";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tokenpair",
    about = "Access/refresh token authentication service"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "3000")]
    pub port: u16,

    /// Path to SQLite database file (":memory:" for a throwaway store)
    #[arg(short, long, default_value = "tokenpair.db")]
    pub database: String,

    /// Path to file containing the access token secret. Prefer the ACCESS_TOKEN_SECRET env var
    #[arg(long)]
    pub access_secret_file: Option<String>,

    /// Path to file containing the refresh token secret. Prefer the REFRESH_TOKEN_SECRET env var
    #[arg(long)]
    pub refresh_secret_file: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, env = "ACCESS_TOKEN_TTL", default_value_t = DEFAULT_ACCESS_TOKEN_TTL_SECS)]
    pub access_token_ttl: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, env = "REFRESH_TOKEN_TTL", default_value_t = DEFAULT_REFRESH_TOKEN_TTL_SECS)]
    pub refresh_token_ttl: u64,

    /// Set the Secure flag on the refresh cookie (use behind HTTPS)
    #[arg(long)]
    pub secure_cookies: bool,

    /// Also clear the stored refresh token on logout when a valid access token is sent
    #[arg(long)]
    pub revoke_on_logout: bool,

    /// Login and registration attempts allowed per client IP per minute (0 disables)
    #[arg(long, default_value_t = DEFAULT_LOGIN_RATE_PER_MINUTE)]
    pub login_rate_per_minute: u32,

    /// Use the first X-Forwarded-For entry as the client IP (only behind a trusted proxy)
    #[arg(long)]
    pub trust_forwarded_for: bool,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load a signing secret from an environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
///
/// Removes the environment variable after reading it, so this must run
/// before any other thread exists (in `main`, ahead of building the runtime).
pub fn load_secret(env_var: &str, secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var(env_var) {
        // Clear the environment variable to prevent leaking
        // SAFETY: Called from `main` before the Tokio runtime is built, so no
        // other thread can be reading or writing the environment.
        unsafe { std::env::remove_var(env_var) };
        secret
    } else if let Some(path) = secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                return None;
            }
        }
    } else {
        error!(
            variable = %env_var,
            "Token secret is required. Set the environment variable (recommended) \
             or use the matching --*-secret-file option"
        );
        return None;
    };

    if secret.len() < MIN_SECRET_LENGTH {
        error!(
            variable = %env_var,
            "Token secret is shorter than {} characters. Use a longer secret",
            MIN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Check that the two secrets can be used together.
/// Returns false and logs an error if they are equal.
pub fn validate_secrets(access_secret: &str, refresh_secret: &str) -> bool {
    if access_secret == refresh_secret {
        error!("Access and refresh token secrets must differ");
        return false;
    }
    true
}

/// Check the configured token lifetimes.
/// Returns false and logs an error if either is zero.
pub fn validate_lifetimes(access_ttl: u64, refresh_ttl: u64) -> bool {
    if access_ttl == 0 || refresh_ttl == 0 {
        error!("Token lifetimes must be at least one second");
        return false;
    }
    true
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    args: &Args,
    db: Database,
    access_secret: String,
    refresh_secret: String,
) -> ServerConfig {
    let tokens = TokenSettings::new(access_secret.into_bytes(), refresh_secret.into_bytes())
        .with_lifetimes(args.access_token_ttl, args.refresh_token_ttl);

    let logout_policy = if args.revoke_on_logout {
        LogoutPolicy::RevokeStored
    } else {
        LogoutPolicy::ClientOnly
    };

    ServerConfig {
        store: Arc::new(db.users()),
        tokens,
        hasher: Arc::new(Argon2Hasher::new()),
        secure_cookies: args.secure_cookies,
        logout_policy,
        login_rate_per_minute: args.login_rate_per_minute,
        trust_forwarded_for: args.trust_forwarded_for,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
