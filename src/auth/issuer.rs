//! Access/refresh token pair issuance.

use std::sync::Arc;

use tracing::debug;

use super::errors::AuthError;
use crate::db::CredentialStore;
use crate::jwt::{IssuedToken, TokenCodec, TokenKind};

/// A freshly minted access/refresh token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// Mints token pairs and records the refresh token as the subject's single
/// active session.
#[derive(Clone)]
pub struct TokenIssuer {
    codec: Arc<TokenCodec>,
    store: Arc<dyn CredentialStore>,
}

impl TokenIssuer {
    pub fn new(codec: Arc<TokenCodec>, store: Arc<dyn CredentialStore>) -> Self {
        Self { codec, store }
    }

    fn mint(&self, subject: &str) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access: self.codec.issue(TokenKind::Access, subject)?,
            refresh: self.codec.issue(TokenKind::Refresh, subject)?,
        })
    }

    /// Issue a pair and overwrite whatever refresh token the subject had.
    ///
    /// The pair is only returned once the refresh token has been persisted.
    pub async fn issue_pair(&self, subject: &str) -> Result<TokenPair, AuthError> {
        let pair = self.mint(subject)?;
        self.store
            .set_refresh_token(subject, Some(&pair.refresh.token))
            .await?;
        debug!(subject = %subject, "Issued token pair");
        Ok(pair)
    }

    /// Issue a pair replacing `presented`, which must still be the stored
    /// refresh token at the moment of the swap.
    pub async fn rotate_pair(
        &self,
        subject: &str,
        presented: &str,
    ) -> Result<TokenPair, AuthError> {
        let pair = self.mint(subject)?;
        let swapped = self
            .store
            .swap_refresh_token(subject, presented, Some(&pair.refresh.token))
            .await?;
        if !swapped {
            return Err(AuthError::ConcurrentRefresh);
        }
        debug!(subject = %subject, "Rotated token pair");
        Ok(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, UserIdentity};
    use crate::jwt::TokenSettings;

    async fn setup() -> (TokenIssuer, Arc<MemoryStore>, Arc<TokenCodec>) {
        let store = Arc::new(MemoryStore::new());
        store
            .create(&UserIdentity {
                id: "u1".into(),
                email: "a@x.io".into(),
                full_name: "A".into(),
                password_digest: "digest".into(),
            })
            .await
            .unwrap();
        let codec = Arc::new(TokenCodec::new(&TokenSettings::new(
            b"access-secret-for-testing".to_vec(),
            b"refresh-secret-for-testing".to_vec(),
        )));
        let issuer = TokenIssuer::new(codec.clone(), store.clone());
        (issuer, store, codec)
    }

    #[tokio::test]
    async fn test_issue_pair_persists_refresh_token() {
        let (issuer, store, codec) = setup().await;

        let pair = issuer.issue_pair("u1").await.unwrap();

        let record = store.find_by_id("u1").await.unwrap().unwrap();
        assert_eq!(record.session.current_refresh_token, Some(pair.refresh.token.clone()));
        assert_eq!(codec.verify(TokenKind::Access, &pair.access.token).unwrap().sub, "u1");
        assert_eq!(codec.verify(TokenKind::Refresh, &pair.refresh.token).unwrap().sub, "u1");
    }

    #[tokio::test]
    async fn test_issue_pair_unknown_subject_returns_no_pair() {
        let (issuer, _store, _codec) = setup().await;

        let result = issuer.issue_pair("ghost").await;
        assert!(matches!(result, Err(AuthError::UserNotFound)));
    }

    #[tokio::test]
    async fn test_rotate_pair_replaces_slot() {
        let (issuer, store, _codec) = setup().await;
        let first = issuer.issue_pair("u1").await.unwrap();

        let second = issuer.rotate_pair("u1", &first.refresh.token).await.unwrap();

        assert_ne!(first.refresh.token, second.refresh.token);
        let record = store.find_by_id("u1").await.unwrap().unwrap();
        assert_eq!(record.session.current_refresh_token, Some(second.refresh.token));
    }

    #[tokio::test]
    async fn test_rotate_pair_with_stale_token_loses() {
        let (issuer, store, _codec) = setup().await;
        let first = issuer.issue_pair("u1").await.unwrap();
        let second = issuer.rotate_pair("u1", &first.refresh.token).await.unwrap();

        let result = issuer.rotate_pair("u1", &first.refresh.token).await;
        assert!(matches!(result, Err(AuthError::ConcurrentRefresh)));

        let record = store.find_by_id("u1").await.unwrap().unwrap();
        assert_eq!(record.session.current_refresh_token, Some(second.refresh.token));
    }
}
