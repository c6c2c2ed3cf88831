//! Password hashing and verification.
//!
//! The authentication core only sees the [`PasswordHasher`] capability; the
//! Argon2id implementation is the one wired in by the binary.

use argon2::password_hash::{
    PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString, rand_core::OsRng,
};
use argon2::{Algorithm, Argon2, Params, Version};

/// One-way password digest capability.
pub trait PasswordHasher: Send + Sync {
    /// Produce a self-describing digest for `password`.
    fn hash(&self, password: &str) -> Result<String, PasswordError>;

    /// Check `password` against a digest produced by `hash`.
    fn verify(&self, password: &str, digest: &str) -> bool;
}

#[derive(Debug)]
pub struct PasswordError(String);

impl std::fmt::Display for PasswordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Password hashing failed: {}", self.0)
    }
}

impl std::error::Error for PasswordError {}

/// Argon2id with configurable cost.
#[derive(Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    /// Hasher with the argon2 crate's recommended parameters.
    pub fn new() -> Self {
        Self {
            params: Params::default(),
        }
    }

    /// Hasher with explicit memory cost (KiB) and iteration count.
    pub fn with_cost(memory_kib: u32, iterations: u32) -> Result<Self, PasswordError> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|e| PasswordError(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let digest = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError(e.to_string()))?;
        Ok(digest.to_string())
    }

    fn verify(&self, password: &str, digest: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(digest) else {
            return false;
        };
        // Cost parameters come from the digest itself
        self.argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> Argon2Hasher {
        Argon2Hasher::with_cost(8 * 1024, 1).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher();
        let digest = hasher.hash("pw1").unwrap();

        assert!(digest.starts_with("$argon2id$"));
        assert!(hasher.verify("pw1", &digest));
        assert!(!hasher.verify("pw2", &digest));
    }

    #[test]
    fn test_salts_differ() {
        let hasher = hasher();
        assert_ne!(hasher.hash("pw1").unwrap(), hasher.hash("pw1").unwrap());
    }

    #[test]
    fn test_verify_garbage_digest() {
        assert!(!hasher().verify("pw1", "not-a-digest"));
    }

    #[test]
    fn test_verify_with_different_cost() {
        let digest = hasher().hash("pw1").unwrap();
        let other = Argon2Hasher::with_cost(16 * 1024, 2).unwrap();
        assert!(other.verify("pw1", &digest));
    }

    #[test]
    fn test_invalid_cost_rejected() {
        assert!(Argon2Hasher::with_cost(1, 1).is_err());
    }
}
