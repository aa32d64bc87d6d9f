//! CSRF Double-Submit Tokens
//!
//! A token is a random hex value plus an HMAC-SHA256 checksum keyed with a
//! server secret. Both travel together in one cookie,
//! `base64url(value "|" checksum)`; a state-changing request must echo the
//! value in a header or form field. A cross-site attacker can make the browser
//! send the cookie but cannot read it, so cannot produce the echo.
//!
//! The checksum ties the cookie to this server: a value planted through a
//! sibling subdomain fails verification without a secret.

use axum::http::Method;
use thiserror::Error;

use crate::cookie::{CookieConfig, SameSite};
use crate::crypto;

/// Separator between value and checksum inside the cookie payload
const DELIMITER: char = '|';

/// Cookie-name prefix that browsers only accept on secure cookies
const SECURE_PREFIX: &str = "__Secure-";

// ============================================================================
// Errors
// ============================================================================

/// Why a request failed CSRF validation
///
/// The variants are for logs; clients always see the same 403.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CsrfError {
    #[error("CSRF cookie is missing")]
    MissingCookie,

    #[error("CSRF cookie is malformed")]
    MalformedCookie,

    #[error("CSRF cookie checksum does not match")]
    ChecksumMismatch,

    #[error("CSRF token was not submitted")]
    MissingToken,

    #[error("submitted CSRF token does not match the cookie")]
    TokenMismatch,
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct CsrfConfig {
    /// Server-side HMAC key
    pub checksum_secret: Vec<u8>,
    /// Bytes of randomness per token (the hex value is twice as long)
    pub token_length: usize,
    pub header_name: String,
    pub field_name: String,
    /// Base name; gets the `__Secure-` prefix when `cookie_secure` is set
    pub cookie_name: String,
    pub cookie_secure: bool,
    pub cookie_same_site: SameSite,
    /// Methods that are issued a token but never validated
    pub ignored_methods: Vec<Method>,
}

impl CsrfConfig {
    pub fn new(checksum_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            checksum_secret: checksum_secret.into(),
            token_length: 32,
            header_name: "X-CSRF-Token".to_string(),
            field_name: "csrf_token".to_string(),
            cookie_name: "csrf_token".to_string(),
            cookie_secure: true,
            cookie_same_site: SameSite::Lax,
            ignored_methods: vec![Method::GET, Method::HEAD, Method::OPTIONS, Method::TRACE],
        }
    }

    /// Random secret; tokens do not survive a restart
    pub fn with_random_secret() -> Self {
        Self::new(crypto::random_bytes(32))
    }

    /// Random secret and a non-secure cookie for plain-HTTP local setups
    pub fn development() -> Self {
        Self {
            cookie_secure: false,
            ..Self::with_random_secret()
        }
    }

    pub fn is_ignored(&self, method: &Method) -> bool {
        self.ignored_methods.contains(method)
    }

    /// Effective cookie name, including the secure prefix when applicable
    pub fn effective_cookie_name(&self) -> String {
        if self.cookie_secure {
            format!("{SECURE_PREFIX}{}", self.cookie_name)
        } else {
            self.cookie_name.clone()
        }
    }

    pub fn cookie_config(&self) -> CookieConfig {
        CookieConfig {
            name: self.effective_cookie_name(),
            secure: self.cookie_secure,
            http_only: true,
            same_site: self.cookie_same_site,
            path: "/".to_string(),
        }
    }

    fn checksum(&self, value: &str) -> String {
        crypto::to_base64_url(&crypto::hmac_sha256(&self.checksum_secret, value.as_bytes()))
    }
}

// ============================================================================
// Token
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken {
    value: String,
    checksum: String,
}

impl CsrfToken {
    /// Issue a fresh token
    pub fn generate(config: &CsrfConfig) -> Self {
        let value = crypto::random_hex(config.token_length);
        let checksum = config.checksum(&value);
        Self { value, checksum }
    }

    /// The value clients echo back in the header or form field
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn to_cookie_value(&self) -> String {
        crypto::to_base64_url(format!("{}{DELIMITER}{}", self.value, self.checksum).as_bytes())
    }

    /// Full `Set-Cookie` header value for this token
    pub fn to_set_cookie(&self, config: &CsrfConfig) -> String {
        config
            .cookie_config()
            .build_set_cookie(&self.to_cookie_value(), None)
    }

    /// Decode a cookie value and check its checksum against the server secret
    pub fn from_cookie_value(config: &CsrfConfig, cookie: &str) -> Result<Self, CsrfError> {
        let decoded = crypto::from_base64_url(cookie).map_err(|_| CsrfError::MalformedCookie)?;
        let decoded = String::from_utf8(decoded).map_err(|_| CsrfError::MalformedCookie)?;
        let (value, checksum) = decoded
            .split_once(DELIMITER)
            .ok_or(CsrfError::MalformedCookie)?;

        if value.is_empty() || checksum.is_empty() {
            return Err(CsrfError::MalformedCookie);
        }

        let expected = config.checksum(value);
        if !crypto::constant_time_eq(expected.as_bytes(), checksum.as_bytes()) {
            return Err(CsrfError::ChecksumMismatch);
        }

        Ok(Self {
            value: value.to_string(),
            checksum: checksum.to_string(),
        })
    }

    /// Constant-time comparison against a submitted value
    pub fn verify_submitted(&self, submitted: &str) -> Result<(), CsrfError> {
        if crypto::constant_time_eq(self.value.as_bytes(), submitted.as_bytes()) {
            Ok(())
        } else {
            Err(CsrfError::TokenMismatch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CsrfConfig {
        CsrfConfig::new(b"0123456789abcdef0123456789abcdef".to_vec())
    }

    #[test]
    fn test_defaults() {
        let config = config();
        assert_eq!(config.token_length, 32);
        assert_eq!(config.header_name, "X-CSRF-Token");
        assert_eq!(config.field_name, "csrf_token");
        assert_eq!(config.cookie_same_site, SameSite::Lax);
        assert!(config.is_ignored(&Method::GET));
        assert!(config.is_ignored(&Method::TRACE));
        assert!(!config.is_ignored(&Method::POST));
        assert!(!config.is_ignored(&Method::DELETE));
    }

    #[test]
    fn test_generated_value_length() {
        let token = CsrfToken::generate(&config());
        assert_eq!(token.value().len(), 64);
        assert_ne!(token, CsrfToken::generate(&config()));
    }

    #[test]
    fn test_cookie_value_decodes_to_same_token() {
        let config = config();
        let token = CsrfToken::generate(&config);
        let decoded = CsrfToken::from_cookie_value(&config, &token.to_cookie_value()).unwrap();
        assert_eq!(decoded, token);
    }

    #[test]
    fn test_checksum_from_other_secret_is_rejected() {
        let token = CsrfToken::generate(&CsrfConfig::with_random_secret());
        let result = CsrfToken::from_cookie_value(&config(), &token.to_cookie_value());
        assert_eq!(result, Err(CsrfError::ChecksumMismatch));
    }

    #[test]
    fn test_tampered_value_is_rejected() {
        let config = config();
        let token = CsrfToken::generate(&config);
        let forged = crypto::to_base64_url(format!("deadbeef|{}", token.checksum).as_bytes());
        assert_eq!(
            CsrfToken::from_cookie_value(&config, &forged),
            Err(CsrfError::ChecksumMismatch)
        );
    }

    #[test]
    fn test_malformed_cookie() {
        let config = config();
        let cookies = vec![
            String::new(),
            "%%%".to_string(),
            crypto::to_base64_url(b"no-delimiter"),
            crypto::to_base64_url(b"|"),
        ];
        for cookie in &cookies {
            assert_eq!(
                CsrfToken::from_cookie_value(&config, cookie),
                Err(CsrfError::MalformedCookie),
                "cookie {cookie:?}"
            );
        }
    }

    #[test]
    fn test_verify_submitted() {
        let token = CsrfToken::generate(&config());
        assert!(token.verify_submitted(token.value()).is_ok());
        assert_eq!(
            token.verify_submitted("something-else"),
            Err(CsrfError::TokenMismatch)
        );
    }

    #[test]
    fn test_secure_cookie_name_prefix() {
        let secure = config();
        assert_eq!(secure.effective_cookie_name(), "__Secure-csrf_token");

        let insecure = CsrfConfig {
            cookie_secure: false,
            ..config()
        };
        assert_eq!(insecure.effective_cookie_name(), "csrf_token");
    }

    #[test]
    fn test_set_cookie_is_http_only() {
        let config = config();
        let token = CsrfToken::generate(&config);
        let cookie = token.to_set_cookie(&config);
        assert!(cookie.starts_with(&format!("__Secure-csrf_token={}", token.to_cookie_value())));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Lax"));
    }
}
