//! Access-token guard: middleware and axum extractors.
//!
//! Verification is a pure signature and expiry check. The credential store is
//! never consulted, so an access token stays valid until it expires.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use super::errors::AuthError;
use super::state::HasAuthBackend;
use super::types::AuthenticatedUser;
use crate::jwt::{TokenCodec, TokenKind};

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingAuthHeader)?;

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::MissingAuthHeader)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MissingAuthHeader);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingAuthHeader);
    }
    Ok(token)
}

/// Verify the bearer access token in `headers`.
pub fn authenticate(
    headers: &HeaderMap,
    codec: &TokenCodec,
) -> Result<AuthenticatedUser, AuthError> {
    let token = bearer_token(headers)?;
    let claims = codec.verify(TokenKind::Access, token).map_err(|e| {
        debug!("Access token rejected: {}", e);
        AuthError::from(e)
    })?;
    Ok(AuthenticatedUser::from(claims))
}

/// Middleware for routes that require a valid access token.
///
/// On success the [`AuthenticatedUser`] is stored in the request extensions;
/// on failure the request is answered here and the handler never runs.
pub async fn require_access_token(
    State(codec): State<Arc<TokenCodec>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = authenticate(request.headers(), &codec)?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Extractor for handlers that require authentication.
///
/// Reuses the user placed by [`require_access_token`] when the route is
/// behind it, and verifies the header itself otherwise.
pub struct Auth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(Auth(user.clone()));
        }
        authenticate(&parts.headers, state.codec()).map(Auth)
    }
}

/// Optional authentication extractor - never fails.
/// Useful for endpoints that behave differently for a known caller.
pub struct OptionalAuth(pub Option<AuthenticatedUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(
            Auth::from_request_parts(parts, state).await.ok().map(|Auth(user)| user),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::TokenSettings;
    use axum::http::HeaderValue;

    fn codec() -> TokenCodec {
        TokenCodec::new(&TokenSettings::new(
            b"access-secret-for-testing".to_vec(),
            b"refresh-secret-for-testing".to_vec(),
        ))
    }

    fn headers_with(auth: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&headers_with("Bearer abc")).unwrap(), "abc");
        assert_eq!(bearer_token(&headers_with("bearer abc")).unwrap(), "abc");
    }

    #[test]
    fn test_bearer_token_rejects_bad_headers() {
        for value in ["Basic abc", "Bearer", "Bearer   ", "abc"] {
            assert!(
                matches!(bearer_token(&headers_with(value)), Err(AuthError::MissingAuthHeader)),
                "expected rejection for {:?}",
                value
            );
        }
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AuthError::MissingAuthHeader)
        ));
    }

    #[test]
    fn test_authenticate() {
        let codec = codec();
        let issued = codec.issue(TokenKind::Access, "u1").unwrap();

        let headers = headers_with(&format!("Bearer {}", issued.token));
        let user = authenticate(&headers, &codec).unwrap();
        assert_eq!(user.subject_id, "u1");
    }

    #[test]
    fn test_authenticate_rejects_refresh_token() {
        let codec = codec();
        let issued = codec.issue(TokenKind::Refresh, "u1").unwrap();

        let result = authenticate(&headers_with(&format!("Bearer {}", issued.token)), &codec);
        assert!(matches!(result, Err(AuthError::InvalidSignature)));
    }

    #[test]
    fn test_authenticate_expired() {
        let codec = codec();
        let issued = codec.issue_at(TokenKind::Access, "u1", 1_000).unwrap();

        let result = authenticate(&headers_with(&format!("Bearer {}", issued.token)), &codec);
        assert!(matches!(result, Err(AuthError::ExpiredToken)));
    }
}
