//! Authentication user types.

use crate::jwt::Claims;

/// Identity resolved from a verified access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// User id taken from the `sub` claim
    pub subject_id: String,
    /// JWT claims from the access token
    pub claims: Claims,
}

impl From<Claims> for AuthenticatedUser {
    fn from(claims: Claims) -> Self {
        Self {
            subject_id: claims.sub.clone(),
            claims,
        }
    }
}
