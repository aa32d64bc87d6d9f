//! Single Sign-On Handler
//!
//! Drives an [`SsoProvider`] through the authorization-code flow:
//! [`SsoHandler::handle_authorize`] mints the `state` and `nonce` and builds
//! the provider URL; [`SsoHandler::handle_callback`] turns the callback
//! parameters into tokens and a user profile.

use std::collections::HashMap;
use std::sync::Arc;

use platform::crypto;

use crate::domain::sso::{SsoProvider, SsoUserInfo};
use crate::error::{AuthError, AuthResult};

/// Random bytes behind `state` and `nonce` (hex encoded, so twice as long)
const STATE_BYTES: usize = 32;

/// Values minted when the browser is sent to the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderState {
    pub state: String,
    pub nonce: String,
    pub url: String,
}

/// Outcome of a successful callback
#[derive(Debug, Clone)]
pub struct ProviderInfo<C> {
    pub user_info: SsoUserInfo<C>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub code: String,
}

/// Parameters the provider sends back to the callback
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl CallbackParams {
    /// Empty values count as absent
    pub fn from_map(mut params: HashMap<String, String>) -> Self {
        let mut take = |key: &str| params.remove(key).filter(|v| !v.is_empty());
        Self {
            code: take("code"),
            state: take("state"),
            error: take("error"),
        }
    }
}

pub struct SsoHandler<P> {
    provider: Arc<P>,
}

impl<P> Clone for SsoHandler<P> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
        }
    }
}

impl<P> SsoHandler<P>
where
    P: SsoProvider,
{
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    pub fn handle_authorize(&self) -> ProviderState {
        let state = crypto::random_hex(STATE_BYTES);
        let nonce = crypto::random_hex(STATE_BYTES);
        let url = self.provider.auth_code_url(&state);

        tracing::debug!("Issued SSO authorization request");

        ProviderState { state, nonce, url }
    }

    /// Checks, in order: provider error, missing code, code exchange, user
    /// info. Verifying `state` against the issued value is the caller's job.
    pub async fn handle_callback(
        &self,
        params: &CallbackParams,
    ) -> AuthResult<ProviderInfo<P::Claims>> {
        if let Some(error) = &params.error {
            return Err(AuthError::SsoDenied(error.clone()));
        }

        let code = params
            .code
            .as_deref()
            .ok_or(AuthError::MissingAuthorizationCode)?;

        let token = self
            .provider
            .exchange_code(code)
            .await
            .map_err(AuthError::SsoExchange)?;

        let user_info = self
            .provider
            .user_info(&token)
            .await
            .map_err(AuthError::SsoUserInfo)?;

        tracing::info!("SSO callback completed");

        Ok(ProviderInfo {
            user_info,
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            code: code.to_string(),
        })
    }
}
