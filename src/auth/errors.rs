//! Authentication error types.

use axum::response::{IntoResponse, Response};

use crate::api::ApiError;
use crate::db::StoreError;
use crate::jwt::JwtError;

/// Everything that can go wrong in registration, login, refresh and the
/// access-token guard.
#[derive(Debug)]
pub enum AuthError {
    DuplicateEmail,
    UserNotFound,
    BadPassword,
    /// Registration input failed validation
    InvalidInput(&'static str),
    /// No `Authorization: Bearer <token>` header
    MissingAuthHeader,
    /// No refresh token cookie on a refresh request
    MissingRefreshCookie,
    MalformedToken,
    ExpiredToken,
    InvalidSignature,
    /// Refresh token is valid but no longer matches the stored session
    RevokedToken,
    /// Another refresh rotated the session first
    ConcurrentRefresh,
    /// The credential store failed
    Storage(String),
    Internal(String),
}

impl AuthError {
    /// Message safe to show to clients. Login failures share one message so
    /// the response does not reveal which emails are registered.
    pub fn message(&self) -> &'static str {
        match self {
            AuthError::DuplicateEmail => "Email is already registered",
            AuthError::UserNotFound | AuthError::BadPassword => "Invalid email or password",
            AuthError::InvalidInput(msg) => *msg,
            AuthError::MissingAuthHeader => "You need to log in",
            AuthError::MissingRefreshCookie => "No refresh token",
            AuthError::MalformedToken => "Malformed token",
            AuthError::ExpiredToken => "Token has expired",
            AuthError::InvalidSignature => "Invalid token",
            AuthError::RevokedToken => "Token has been revoked",
            AuthError::ConcurrentRefresh => "Session was refreshed concurrently",
            AuthError::Storage(_) => "Database error",
            AuthError::Internal(_) => "Internal error",
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::Storage(e) => write!(f, "Storage error: {}", e),
            AuthError::Internal(e) => write!(f, "Internal error: {}", e),
            other => f.write_str(other.message()),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::ExpiredToken,
            JwtError::InvalidSignature => AuthError::InvalidSignature,
            JwtError::Malformed(_) | JwtError::WrongTokenType => AuthError::MalformedToken,
            JwtError::Encoding(_) | JwtError::TimeError => AuthError::Internal(err.to_string()),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AuthError::DuplicateEmail,
            StoreError::NotFound => AuthError::UserNotFound,
            StoreError::Backend(e) => AuthError::Storage(e),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingAuthHeader => ApiError::unauthorized(err.message()),
            AuthError::ConcurrentRefresh => ApiError::conflict(err.message()),
            AuthError::Storage(ref e) => ApiError::db_error("Credential store failed", e),
            AuthError::Internal(ref e) => ApiError::internal_error("Authentication failed", e),
            other => ApiError::rejected(other.message()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn status(err: AuthError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(status(AuthError::MissingAuthHeader), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthError::ExpiredToken), StatusCode::FORBIDDEN);
        assert_eq!(status(AuthError::InvalidSignature), StatusCode::FORBIDDEN);
        assert_eq!(status(AuthError::MalformedToken), StatusCode::FORBIDDEN);
        assert_eq!(status(AuthError::DuplicateEmail), StatusCode::FORBIDDEN);
        assert_eq!(status(AuthError::BadPassword), StatusCode::FORBIDDEN);
        assert_eq!(status(AuthError::ConcurrentRefresh), StatusCode::CONFLICT);
        assert_eq!(
            status(AuthError::Storage("disk full".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_login_failures_share_message() {
        assert_eq!(AuthError::UserNotFound.message(), AuthError::BadPassword.message());
    }

    #[test]
    fn test_jwt_error_mapping() {
        assert!(matches!(AuthError::from(JwtError::Expired), AuthError::ExpiredToken));
        assert!(matches!(
            AuthError::from(JwtError::InvalidSignature),
            AuthError::InvalidSignature
        ));
        assert!(matches!(
            AuthError::from(JwtError::WrongTokenType),
            AuthError::MalformedToken
        ));
    }

    #[test]
    fn test_store_error_mapping() {
        assert!(matches!(
            AuthError::from(StoreError::DuplicateEmail),
            AuthError::DuplicateEmail
        ));
        assert!(matches!(AuthError::from(StoreError::NotFound), AuthError::UserNotFound));
        assert!(matches!(
            AuthError::from(StoreError::Backend("x".into())),
            AuthError::Storage(_)
        ));
    }
}
