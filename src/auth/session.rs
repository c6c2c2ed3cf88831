//! Register, login, refresh and logout.
//!
//! Every refresh failure is a [`RefreshDenied`]; its wire form is an empty
//! access token so clients can treat "no session" and "bad session" alike.

use std::sync::Arc;

use tokio::sync::OnceCell;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{debug, error, info, warn};

use super::errors::AuthError;
use super::issuer::{TokenIssuer, TokenPair};
use super::password::PasswordHasher;
use crate::db::{CredentialStore, UserIdentity, UserProfile};
use crate::jwt::{TokenCodec, TokenKind};

pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_FULL_NAME_LEN: usize = 100;
pub const MAX_PASSWORD_BYTES: usize = 1024;

/// Verified against on unknown emails so they cost as much as a wrong password.
const DUMMY_PASSWORD: &str = "tokenpair-unknown-account";

/// What logout does to the stored refresh token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogoutPolicy {
    /// Only the client cookie is cleared; the stored token stays valid
    #[default]
    ClientOnly,
    /// The subject's stored token is cleared as well
    RevokeStored,
}

/// Successful login: the public user view and the new pair.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: UserProfile,
    pub tokens: TokenPair,
}

/// A refresh that produced no new access token.
///
/// Every denial answers with the same body, `{"accessToken": ""}`, and status
/// 200. A lost rotation race (`ConcurrentRefresh`) is the one exception: it
/// answers 409 with that body, so a client can tell it apart and retry with
/// the winning cookie instead of treating the session as gone.
#[derive(Debug)]
pub struct RefreshDenied {
    pub reason: AuthError,
}

impl From<AuthError> for RefreshDenied {
    fn from(reason: AuthError) -> Self {
        Self { reason }
    }
}

impl std::fmt::Display for RefreshDenied {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Refresh denied: {}", self.reason)
    }
}

impl std::error::Error for RefreshDenied {}

impl IntoResponse for RefreshDenied {
    fn into_response(self) -> Response {
        let status = match self.reason {
            AuthError::ConcurrentRefresh => StatusCode::CONFLICT,
            _ => StatusCode::OK,
        };
        (status, Json(json!({ "accessToken": "" }))).into_response()
    }
}

/// Trim and lowercase an email for lookup and storage.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_registration(email: &str, full_name: &str, password: &str) -> Result<(), AuthError> {
    if email.is_empty() {
        return Err(AuthError::InvalidInput("Email is required"));
    }
    if email.len() > MAX_EMAIL_LEN || !email.contains('@') {
        return Err(AuthError::InvalidInput("Invalid email address"));
    }
    let full_name = full_name.trim();
    if full_name.is_empty() {
        return Err(AuthError::InvalidInput("Full name is required"));
    }
    if full_name.chars().count() > MAX_FULL_NAME_LEN {
        return Err(AuthError::InvalidInput("Full name is too long"));
    }
    if password.is_empty() {
        return Err(AuthError::InvalidInput("Password is required"));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AuthError::InvalidInput("Password is too long"));
    }
    Ok(())
}

#[derive(Clone)]
pub struct SessionController {
    store: Arc<dyn CredentialStore>,
    codec: Arc<TokenCodec>,
    issuer: TokenIssuer,
    hasher: Arc<dyn PasswordHasher>,
    logout_policy: LogoutPolicy,
    dummy_digest: Arc<OnceCell<String>>,
}

impl SessionController {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        codec: Arc<TokenCodec>,
        hasher: Arc<dyn PasswordHasher>,
        logout_policy: LogoutPolicy,
    ) -> Self {
        let issuer = TokenIssuer::new(codec.clone(), store.clone());
        Self {
            store,
            codec,
            issuer,
            hasher,
            logout_policy,
            dummy_digest: Arc::new(OnceCell::new()),
        }
    }

    pub fn codec(&self) -> &Arc<TokenCodec> {
        &self.codec
    }

    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .map_err(|e| AuthError::Internal(e.to_string()))
    }

    async fn verify_password(&self, password: &str, digest: String) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))
    }

    /// Digest of [`DUMMY_PASSWORD`], computed on first use and then shared.
    async fn dummy_digest(&self) -> Result<String, AuthError> {
        self.dummy_digest
            .get_or_try_init(|| self.hash_password(DUMMY_PASSWORD))
            .await
            .cloned()
    }

    /// Create an account with an empty session slot.
    pub async fn register(
        &self,
        email: &str,
        full_name: &str,
        password: &str,
    ) -> Result<UserProfile, AuthError> {
        let email = normalize_email(email);
        validate_registration(&email, full_name, password)?;

        if self.store.find_by_email(&email).await?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }

        let password_digest = self.hash_password(password).await?;

        let identity = UserIdentity {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            full_name: full_name.trim().to_string(),
            password_digest,
        };

        // A concurrent registration can still win between the lookup and here;
        // the store reports it as DuplicateEmail.
        self.store.create(&identity).await?;
        info!(user_id = %identity.id, "Registered user");

        Ok(UserProfile::from(&identity))
    }

    /// Check credentials and start a new session, replacing any previous one.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let email = normalize_email(email);
        let Some(record) = self.store.find_by_email(&email).await? else {
            // Unknown emails cost one verification, same as a wrong password
            let digest = self.dummy_digest().await?;
            self.verify_password(password, digest).await?;
            return Err(AuthError::UserNotFound);
        };

        let digest = record.identity.password_digest.clone();
        if !self.verify_password(password, digest).await? {
            debug!(user_id = %record.identity.id, "Login rejected: bad password");
            return Err(AuthError::BadPassword);
        }

        let tokens = self.issuer.issue_pair(&record.identity.id).await?;
        info!(user_id = %record.identity.id, "User logged in");

        Ok(LoginOutcome {
            user: UserProfile::from(&record.identity),
            tokens,
        })
    }

    /// Exchange the refresh cookie for a new pair, rotating the stored token.
    pub async fn refresh(&self, cookie: Option<&str>) -> Result<TokenPair, RefreshDenied> {
        let result = self.try_refresh(cookie).await;
        match &result {
            Ok(_) => {}
            Err(RefreshDenied {
                reason: reason @ (AuthError::Storage(_) | AuthError::Internal(_)),
            }) => error!("Refresh failed: {}", reason),
            Err(denied) => debug!("{}", denied),
        }
        result
    }

    async fn try_refresh(&self, cookie: Option<&str>) -> Result<TokenPair, RefreshDenied> {
        let presented = cookie
            .filter(|c| !c.is_empty())
            .ok_or(AuthError::MissingRefreshCookie)?;

        let claims = self
            .codec
            .verify(TokenKind::Refresh, presented)
            .map_err(AuthError::from)?;

        let record = self
            .store
            .find_by_id(&claims.sub)
            .await
            .map_err(AuthError::from)?
            .ok_or(AuthError::UserNotFound)?;

        if record.session.current_refresh_token.as_deref() != Some(presented) {
            warn!(user_id = %claims.sub, "Refresh token does not match stored session");
            return Err(AuthError::RevokedToken.into());
        }

        let pair = self.issuer.rotate_pair(&claims.sub, presented).await?;
        debug!(user_id = %claims.sub, "Refreshed session");
        Ok(pair)
    }

    /// End the session for the caller. Under `RevokeStored` the subject's
    /// stored refresh token is cleared when a subject is known.
    pub async fn logout(&self, subject: Option<&str>) -> Result<(), AuthError> {
        let (LogoutPolicy::RevokeStored, Some(subject)) = (self.logout_policy, subject) else {
            return Ok(());
        };

        match self.store.set_refresh_token(subject, None).await {
            Ok(()) => {
                info!(user_id = %subject, "Revoked stored refresh token on logout");
                Ok(())
            }
            // Account is gone; nothing left to revoke
            Err(crate::db::StoreError::NotFound) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
