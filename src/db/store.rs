//! Credential store interface used by the authentication core.
//!
//! The store is the single source of truth for session validity: a refresh
//! token is only honored while it equals the subject's stored slot.

use async_trait::async_trait;
use serde::Serialize;

/// Immutable account data, fixed at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub password_digest: String,
}

/// Mutable per-account session slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub current_refresh_token: Option<String>,
}

/// A user record as read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub identity: UserIdentity,
    pub session: SessionState,
}

/// Public view of a user. Does not expose the password digest or session slot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub full_name: String,
}

impl From<&UserIdentity> for UserProfile {
    fn from(identity: &UserIdentity) -> Self {
        Self {
            id: identity.id.clone(),
            email: identity.email.clone(),
            full_name: identity.full_name.clone(),
        }
    }
}

/// Errors returned by credential store operations.
#[derive(Debug)]
pub enum StoreError {
    /// An account with this email already exists
    DuplicateEmail,
    /// No account with the given id
    NotFound,
    /// The backing store failed
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::DuplicateEmail => write!(f, "Email is already registered"),
            StoreError::NotFound => write!(f, "User not found"),
            StoreError::Backend(e) => write!(f, "Store error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Durable keyed store of user records.
///
/// Implementations must make `set_refresh_token` and `swap_refresh_token`
/// atomic per user id.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up a user by email. Emails are compared case-insensitively.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Look up a user by id.
    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Create a user with an empty session slot.
    async fn create(&self, identity: &UserIdentity) -> Result<(), StoreError>;

    /// Unconditionally replace the session slot.
    async fn set_refresh_token(&self, id: &str, token: Option<&str>) -> Result<(), StoreError>;

    /// Replace the session slot only if it currently holds `expected`.
    /// Returns `false` when the slot held something else.
    async fn swap_refresh_token(
        &self,
        id: &str,
        expected: &str,
        new: Option<&str>,
    ) -> Result<bool, StoreError>;
}
