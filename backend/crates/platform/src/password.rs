//! Password Hashing and Verification
//!
//! Credential hashing behind the [`PasswordHasher`] trait, with a bcrypt
//! implementation. Input is normalized to Unicode NFKC before it reaches the
//! algorithm, so visually identical passwords typed on different keyboards or
//! input methods hash identically.
//!
//! bcrypt only reads the first 72 bytes of its input. Longer passwords are
//! rejected with [`PasswordHashError::PasswordTooLong`] instead of being
//! silently truncated.
//!
//! Plaintext travels through the application inside [`ClearTextPassword`],
//! which is zeroized on drop and never printed.

use std::fmt;

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ============================================================================
// Error Types
// ============================================================================

/// Password hashing/verification errors
///
/// A wrong password is not an error: [`PasswordHasher::verify`] returns
/// `Ok(false)` for a mismatch.
#[derive(Debug, Error)]
pub enum PasswordHashError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,

    /// Longer than the algorithm can take into account (after NFKC)
    #[error("Password exceeds {max} bytes")]
    PasswordTooLong { max: usize },
}

// ============================================================================
// Hasher
// ============================================================================

/// Pluggable hashing strategy
///
/// Both operations are CPU-bound; async callers should run them on a blocking
/// thread.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, PasswordHashError>;

    fn verify(&self, hash: &str, password: &str) -> Result<bool, PasswordHashError>;
}

/// bcrypt with a configurable work factor
#[derive(Debug, Clone, Copy)]
pub struct BcryptPasswordHasher {
    cost: u32,
}

impl BcryptPasswordHasher {
    /// Lowest cost bcrypt accepts; only suitable for tests.
    pub const MIN_COST: u32 = 4;

    /// bcrypt ignores every byte past this point
    pub const MAX_PASSWORD_BYTES: usize = 72;

    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }
}

impl Default for BcryptPasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher for BcryptPasswordHasher {
    fn hash(&self, password: &str) -> Result<String, PasswordHashError> {
        let normalized = Normalized::new(password);
        normalized.ensure_within(Self::MAX_PASSWORD_BYTES)?;
        bcrypt::hash(normalized.as_bytes(), self.cost)
            .map_err(|e| PasswordHashError::HashingFailed(e.to_string()))
    }

    fn verify(&self, hash: &str, password: &str) -> Result<bool, PasswordHashError> {
        let normalized = Normalized::new(password);
        normalized.ensure_within(Self::MAX_PASSWORD_BYTES)?;
        match bcrypt::verify(normalized.as_bytes(), hash) {
            Ok(matches) => Ok(matches),
            Err(e) => {
                tracing::debug!(error = %e, "Stored password hash could not be parsed");
                Err(PasswordHashError::InvalidHashFormat)
            }
        }
    }
}

/// NFKC copy of the input, wiped when dropped
#[derive(Zeroize, ZeroizeOnDrop)]
struct Normalized(String);

impl Normalized {
    fn new(raw: &str) -> Self {
        Self(raw.nfkc().collect())
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    fn ensure_within(&self, max: usize) -> Result<(), PasswordHashError> {
        if self.0.len() > max {
            return Err(PasswordHashError::PasswordTooLong { max });
        }
        Ok(())
    }
}

// ============================================================================
// Clear Text Password (Zeroized on drop)
// ============================================================================

/// Clear text password with automatic memory zeroization
///
/// Does not implement `Clone`; `Debug` output is redacted.
///
/// ```rust
/// use platform::password::ClearTextPassword;
///
/// let password = ClearTextPassword::new("hunter2");
/// assert_eq!(format!("{:?}", password), "ClearTextPassword([REDACTED])");
/// ```
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ClearTextPassword(String);

impl ClearTextPassword {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<String> for ClearTextPassword {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for ClearTextPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ClearTextPassword([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> BcryptPasswordHasher {
        BcryptPasswordHasher::new(BcryptPasswordHasher::MIN_COST)
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher();
        let hash = hasher.hash("correct horse").unwrap();
        assert!(hash.starts_with("$2"));
        assert!(hasher.verify(&hash, "correct horse").unwrap());
    }

    #[test]
    fn test_mismatch_is_not_an_error() {
        let hasher = hasher();
        let hash = hasher.hash("secret1").unwrap();
        assert!(!hasher.verify(&hash, "secret2").unwrap());
    }

    #[test]
    fn test_hash_is_salted() {
        let hasher = hasher();
        let a = hasher.hash("same").unwrap();
        let b = hasher.hash("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_unicode_normalization() {
        let hasher = hasher();
        // "Å" as one code point vs "A" + combining ring above
        let composed = "p\u{00C5}ssword";
        let decomposed = "pA\u{030A}ssword";
        assert_ne!(composed.as_bytes(), decomposed.as_bytes());

        let hash = hasher.hash(composed).unwrap();
        assert!(hasher.verify(&hash, decomposed).unwrap());
    }

    #[test]
    fn test_compatibility_forms_match() {
        let hasher = hasher();
        // Fullwidth digits normalize to ASCII under NFKC
        let hash = hasher.hash("pass\u{FF11}\u{FF12}").unwrap();
        assert!(hasher.verify(&hash, "pass12").unwrap());
    }

    #[test]
    fn test_corrupt_hash_is_an_error() {
        let result = hasher().verify("not-a-bcrypt-hash", "whatever");
        assert!(matches!(result, Err(PasswordHashError::InvalidHashFormat)));
    }

    #[test]
    fn test_invalid_cost_fails_hashing() {
        let result = BcryptPasswordHasher::new(2).hash("password");
        assert!(matches!(result, Err(PasswordHashError::HashingFailed(_))));
    }

    #[test]
    fn test_long_passwords_sharing_a_prefix_are_rejected() {
        let hasher = hasher();
        let prefix = "a".repeat(BcryptPasswordHasher::MAX_PASSWORD_BYTES);
        let first = format!("{prefix}correct");
        let second = format!("{prefix}totally-different");

        assert!(matches!(
            hasher.hash(&first),
            Err(PasswordHashError::PasswordTooLong { max: 72 })
        ));

        let hash = hasher.hash(&prefix).unwrap();
        assert!(hasher.verify(&hash, &prefix).unwrap());
        assert!(matches!(
            hasher.verify(&hash, &second),
            Err(PasswordHashError::PasswordTooLong { .. })
        ));
    }

    #[test]
    fn test_length_limit_applies_after_normalization() {
        let hasher = hasher();
        // Fullwidth "ａ" is 3 bytes but folds to a 1-byte "a" under NFKC
        let fullwidth = "\u{FF41}".repeat(30);
        assert_eq!(fullwidth.len(), 90);

        let hash = hasher.hash(&fullwidth).unwrap();
        assert!(hasher.verify(&hash, &"a".repeat(30)).unwrap());
    }

    #[test]
    fn test_default_cost() {
        assert_eq!(BcryptPasswordHasher::default().cost(), bcrypt::DEFAULT_COST);
    }

    #[test]
    fn test_debug_redaction() {
        let password = ClearTextPassword::new("super-secret");
        let debug = format!("{:?}", password);
        assert!(!debug.contains("super-secret"));
        assert_eq!(password.expose(), "super-secret");
    }
}
