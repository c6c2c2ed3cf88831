//! JWT authentication with a single server-checked session per account.
//!
//! Dual-token system: access tokens (stateless, sent as a bearer header) and
//! refresh tokens (HTTP-only cookie, must equal the account's stored slot).
//! Every refresh rotates the stored token with a compare-and-swap.

mod cookie;
mod errors;
mod extractors;
mod ip;
mod issuer;
mod password;
mod session;
mod state;
mod types;

pub use cookie::{
    REFRESH_COOKIE_NAME, REFRESH_COOKIE_PATH, clear_refresh_cookie, get_cookie, refresh_cookie,
};
pub use errors::AuthError;
pub use extractors::{Auth, OptionalAuth, authenticate, bearer_token, require_access_token};
pub use ip::{HasHeadersAndExtensions, extract_client_ip};
pub use issuer::{TokenIssuer, TokenPair};
pub use password::{Argon2Hasher, PasswordError, PasswordHasher};
pub use session::{LoginOutcome, LogoutPolicy, RefreshDenied, SessionController, normalize_email};
pub use state::HasAuthBackend;
pub use types::AuthenticatedUser;
