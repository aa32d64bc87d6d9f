//! Session Authenticator
//!
//! Opaque server-side sessions referenced by an HttpOnly cookie whose value is
//! the base64url-encoded session id. Anything unexpected in the cookie clears
//! it and yields `UnauthorizedUser`; storage failures propagate as system
//! errors so "no such session" is never confused with "could not check".

use std::sync::Arc;

use axum::http::HeaderMap;
use chrono::Utc;
use platform::cookie::{append_set_cookie, extract_cookie};
use platform::crypto;

use crate::application::authenticator::Authenticator;
use crate::application::config::AuthConfig;
use crate::domain::entity::{Identity, Session};
use crate::domain::repository::{CredentialStore, CredentialTx};
use crate::domain::value_object::{SessionId, UserId};
use crate::error::{AuthError, AuthResult};

pub struct SessionAuthenticator<S> {
    store: Arc<S>,
    config: Arc<AuthConfig>,
}

impl<S> Clone for SessionAuthenticator<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S> SessionAuthenticator<S>
where
    S: CredentialStore,
{
    pub fn new(store: Arc<S>, config: Arc<AuthConfig>) -> Self {
        Self { store, config }
    }

    /// Persist a new session for `user_id` and set its cookie on `response_headers`
    pub async fn issue(
        &self,
        user_id: &UserId,
        response_headers: &mut HeaderMap,
    ) -> AuthResult<Session> {
        let session = Session::new(*user_id, self.config.session_ttl());

        let mut tx = self.store.begin().await?;
        tx.create_session(&session).await?;
        tx.commit().await?;

        append_set_cookie(
            response_headers,
            self.config
                .session_cookie()
                .build_set_cookie(&encode_session_id(&session.session_id), Some(session.expires_at)),
        );

        tracing::info!(
            user_id = %session.user_id,
            session_id = %session.session_id,
            expires_at = %session.expires_at,
            "Session issued"
        );

        Ok(session)
    }

    /// Resolve the request's session cookie
    pub async fn authenticate_session(
        &self,
        headers: &HeaderMap,
        response_headers: &mut HeaderMap,
    ) -> AuthResult<Identity<Session>> {
        let Some(raw) = extract_cookie(headers, &self.config.session_cookie_name) else {
            return Err(AuthError::UnauthorizedUser);
        };

        let Some(session_id) = decode_session_id(&raw) else {
            tracing::warn!("Malformed session cookie");
            self.clear_cookie(response_headers);
            return Err(AuthError::UnauthorizedUser);
        };

        let mut tx = self.store.begin().await?;
        let found = tx.find_session_by_id(&session_id).await?;
        tx.commit().await?;

        let Some(session) = found else {
            tracing::debug!(session_id = %session_id, "Session not found");
            self.clear_cookie(response_headers);
            return Err(AuthError::UnauthorizedUser);
        };

        if !session.is_valid(Utc::now()) {
            tracing::debug!(session_id = %session_id, "Session expired or evicted");
            self.clear_cookie(response_headers);
            return Err(AuthError::UnauthorizedUser);
        }

        Ok(Identity::new(session.user_id, session))
    }

    /// Expire the current session (if any) and clear the cookie
    pub async fn logout(
        &self,
        headers: &HeaderMap,
        response_headers: &mut HeaderMap,
    ) -> AuthResult<()> {
        self.clear_cookie(response_headers);

        let Some(session_id) = extract_cookie(headers, &self.config.session_cookie_name)
            .as_deref()
            .and_then(decode_session_id)
        else {
            return Ok(());
        };

        let mut tx = self.store.begin().await?;
        let expired = tx.expire_session_by_id(&session_id).await?;
        tx.commit().await?;

        tracing::info!(session_id = %session_id, expired, "Session logged out");

        Ok(())
    }

    fn clear_cookie(&self, response_headers: &mut HeaderMap) {
        append_set_cookie(
            response_headers,
            self.config.session_cookie().build_delete_cookie(),
        );
    }
}

impl<S> Authenticator for SessionAuthenticator<S>
where
    S: CredentialStore,
{
    type Payload = Session;

    async fn authenticate(
        &self,
        headers: &HeaderMap,
        response_headers: &mut HeaderMap,
    ) -> AuthResult<Identity<Session>> {
        self.authenticate_session(headers, response_headers).await
    }
}

// ============================================================================
// Cookie encoding
// ============================================================================

pub(crate) fn encode_session_id(session_id: &SessionId) -> String {
    crypto::to_base64_url(session_id.to_string().as_bytes())
}

pub(crate) fn decode_session_id(raw: &str) -> Option<SessionId> {
    let bytes = crypto::from_base64_url(raw).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_cookie_encoding() {
        let id = SessionId::new();
        let encoded = encode_session_id(&id);
        assert_ne!(encoded, id.to_string());
        assert_eq!(decode_session_id(&encoded), Some(id));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(decode_session_id("!!!"), None);
        assert_eq!(decode_session_id(&crypto::to_base64_url(b"not-a-uuid")), None);
    }
}
