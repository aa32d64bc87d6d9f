//! Single Sign-On Seam
//!
//! An identity provider driven through the authorization-code flow. The
//! provider owns its client credentials, endpoints and token exchange; this
//! crate only calls it in order: authorization URL, code exchange, user info.

use std::future::Future;

use thiserror::Error;

/// Failure reported by a provider (network, rejected code, bad response)
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ProviderError(pub String);

/// Tokens returned by the code exchange
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for OAuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthToken")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Profile of the signed-in account, with provider-specific claims
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsoUserInfo<C> {
    pub email: String,
    pub claims: C,
}

pub trait SsoProvider: Send + Sync + 'static {
    type Claims: Send + Sync + 'static;

    /// Where to send the browser; `state` must come back on the callback
    fn auth_code_url(&self, state: &str) -> String;

    fn exchange_code(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<OAuthToken, ProviderError>> + Send;

    fn user_info(
        &self,
        token: &OAuthToken,
    ) -> impl Future<Output = Result<SsoUserInfo<Self::Claims>, ProviderError>> + Send;
}
