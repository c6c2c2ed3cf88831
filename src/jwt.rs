//! JWT token generation and validation.
//!
//! Access and refresh tokens are signed with separate secrets, so a leaked
//! access secret cannot be used to forge refresh tokens (and vice versa).

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Token kind, also carried in the `typ` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Presented on every request, stateless.
    Access,
    /// Exchanged for a new pair, checked against the credential store.
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// JWT claims shared by both token kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Token kind
    #[serde(rename = "typ")]
    pub kind: TokenKind,
    /// Unique token id, makes two tokens minted in the same second differ
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Access token lifetime used when none is configured: 1 year.
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Refresh token lifetime used when none is configured: 1.5 years.
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: u64 = DEFAULT_ACCESS_TOKEN_TTL_SECS * 3 / 2;

/// Secrets and lifetimes for both token kinds.
#[derive(Clone)]
pub struct TokenSettings {
    pub access_secret: Vec<u8>,
    pub refresh_secret: Vec<u8>,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
}

impl TokenSettings {
    /// Settings with the default lifetimes.
    pub fn new(access_secret: impl Into<Vec<u8>>, refresh_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_ttl_secs: DEFAULT_ACCESS_TOKEN_TTL_SECS,
            refresh_ttl_secs: DEFAULT_REFRESH_TOKEN_TTL_SECS,
        }
    }

    pub fn with_lifetimes(mut self, access_ttl_secs: u64, refresh_ttl_secs: u64) -> Self {
        self.access_ttl_secs = access_ttl_secs;
        self.refresh_ttl_secs = refresh_ttl_secs;
        self
    }
}

impl std::fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSettings")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish_non_exhaustive()
    }
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The JWT token string
    pub token: String,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
    /// Token duration in seconds
    pub duration: u64,
}

struct KindKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: u64,
}

impl KindKeys {
    fn new(secret: &[u8], ttl_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_secs,
        }
    }
}

/// Signs and verifies access and refresh tokens.
pub struct TokenCodec {
    access: KindKeys,
    refresh: KindKeys,
}

impl TokenCodec {
    pub fn new(settings: &TokenSettings) -> Self {
        Self {
            access: KindKeys::new(&settings.access_secret, settings.access_ttl_secs),
            refresh: KindKeys::new(&settings.refresh_secret, settings.refresh_ttl_secs),
        }
    }

    fn keys(&self, kind: TokenKind) -> &KindKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Issue a token of `kind` for `subject`, valid from now.
    pub fn issue(&self, kind: TokenKind, subject: &str) -> Result<IssuedToken, JwtError> {
        self.issue_at(kind, subject, now_secs()?)
    }

    /// Issue a token as if it had been minted at `issued_at`.
    pub fn issue_at(
        &self,
        kind: TokenKind,
        subject: &str,
        issued_at: u64,
    ) -> Result<IssuedToken, JwtError> {
        let keys = self.keys(kind);
        let exp = issued_at.saturating_add(keys.ttl_secs);

        let claims = Claims {
            sub: subject.to_string(),
            kind,
            jti: uuid::Uuid::new_v4().to_string(),
            iat: issued_at,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &keys.encoding)
            .map_err(JwtError::Encoding)?;

        Ok(IssuedToken {
            token,
            expires_at: exp,
            duration: keys.ttl_secs,
        })
    }

    /// Validate and decode a token of the given kind.
    ///
    /// The signature is checked before the expiry, so a token signed with the
    /// wrong key reports `InvalidSignature` even when it has also expired.
    pub fn verify(&self, kind: TokenKind, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let decoding = &self.keys(kind).decoding;
        let token_data = jsonwebtoken::decode::<Claims>(token, decoding, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Malformed(e),
            })?;

        let claims = token_data.claims;
        if claims.kind != kind {
            return Err(JwtError::WrongTokenType);
        }

        // jsonwebtoken accepts exp == now; a token is only valid strictly before exp.
        if claims.exp <= now_secs()? {
            return Err(JwtError::Expired);
        }

        Ok(claims)
    }
}

fn now_secs() -> Result<u64, JwtError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| JwtError::TimeError)?
        .as_secs())
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Token is not a well-formed JWT or its claims do not parse
    Malformed(jsonwebtoken::errors::Error),
    /// Signature does not match the secret for this token kind
    InvalidSignature,
    /// Token is past its expiration time
    Expired,
    /// System time error
    TimeError,
    /// Wrong token type (e.g., using refresh token as access token)
    WrongTokenType,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Malformed(e) => write!(f, "Malformed token: {}", e),
            JwtError::InvalidSignature => write!(f, "Invalid token signature"),
            JwtError::Expired => write!(f, "Token has expired"),
            JwtError::TimeError => write!(f, "System time error"),
            JwtError::WrongTokenType => write!(f, "Wrong token type"),
        }
    }
}

impl std::error::Error for JwtError {}
