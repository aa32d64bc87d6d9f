//! Application Configuration
//!
//! Configuration for the Auth application layer.

use std::time::Duration;

use platform::cookie::CookieConfig;
use platform::password_policy::PasswordPolicy;

/// Re-export SameSite from platform
pub use platform::cookie::SameSite;

/// Auth application configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Session cookie name
    pub session_cookie_name: String,
    /// Session lifetime (12 hours)
    pub session_ttl: Duration,
    /// Whether to require Secure cookie
    pub cookie_secure: bool,
    /// SameSite policy
    pub cookie_same_site: SameSite,
    /// Random bytes per password reset token (hex encoded, so twice as many chars)
    pub reset_token_length: usize,
    /// Password reset token lifetime (12 hours)
    pub reset_token_ttl: Duration,
    /// Strength policy applied to new passwords; `None` accepts any password
    pub password_policy: Option<PasswordPolicy>,
    /// Run a dummy hash verification when the email is unknown so that
    /// response time does not reveal whether an account exists
    pub equalize_login_timing: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_cookie_name: "usid".to_string(),
            session_ttl: Duration::from_secs(12 * 3600), // 12 hours
            cookie_secure: true,
            cookie_same_site: SameSite::Lax,
            reset_token_length: 32,
            reset_token_ttl: Duration::from_secs(12 * 3600), // 12 hours
            password_policy: None,
            equalize_login_timing: true,
        }
    }
}

impl AuthConfig {
    /// Create config for development (insecure cookie)
    pub fn development() -> Self {
        Self {
            cookie_secure: false,
            ..Self::default()
        }
    }

    pub fn with_password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.password_policy = Some(policy);
        self
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.session_ttl).unwrap_or(chrono::Duration::hours(12))
    }

    pub fn reset_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.reset_token_ttl).unwrap_or(chrono::Duration::hours(12))
    }

    /// Cookie attributes for the session cookie
    pub fn session_cookie(&self) -> CookieConfig {
        CookieConfig {
            name: self.session_cookie_name.clone(),
            secure: self.cookie_secure,
            http_only: true,
            same_site: self.cookie_same_site,
            path: "/".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.session_cookie_name, "usid");
        assert_eq!(config.session_ttl(), chrono::Duration::hours(12));
        assert_eq!(config.reset_token_ttl(), chrono::Duration::hours(12));
        assert!(config.cookie_secure);
        assert!(config.password_policy.is_none());
    }

    #[test]
    fn test_session_cookie_is_http_only() {
        let cookie = AuthConfig::development().session_cookie();
        assert!(cookie.http_only);
        assert!(!cookie.secure);
        assert_eq!(cookie.same_site, SameSite::Lax);
    }
}
