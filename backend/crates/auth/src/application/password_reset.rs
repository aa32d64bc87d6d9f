//! Password Reset Handler
//!
//! Two steps: a request stores a one-time token and mails it; a confirm
//! consumes the token, replaces the password and expires every session of
//! the user, all in one transaction.

use std::sync::Arc;

use chrono::Utc;
use platform::crypto;
use platform::password::{ClearTextPassword, PasswordHasher};

use crate::application::config::AuthConfig;
use crate::application::password::hash_password;
use crate::domain::entity::{PasswordCredential, PasswordResetToken};
use crate::domain::notification::{Message, MessagePayload, Sender};
use crate::domain::repository::{CredentialStore, CredentialTx};
use crate::domain::value_object::{Email, UserId};
use crate::error::{AuthError, AuthResult};

pub struct PasswordResetHandler<S, N> {
    store: Arc<S>,
    hasher: Arc<dyn PasswordHasher>,
    sender: Arc<N>,
    config: Arc<AuthConfig>,
}

impl<S, N> PasswordResetHandler<S, N>
where
    S: CredentialStore,
    N: Sender + Send + Sync + 'static,
{
    pub fn new(
        store: Arc<S>,
        hasher: Arc<dyn PasswordHasher>,
        sender: Arc<N>,
        config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            store,
            hasher,
            sender,
            config,
        }
    }

    // ========================================================================
    // Request
    // ========================================================================

    /// Issue a reset token for `email` and send it.
    ///
    /// Unknown emails fail with `UserNotFound`; HTTP callers that must not
    /// reveal account existence should answer the same way either way.
    pub async fn handle_password_reset_request(
        &self,
        caller: Option<&UserId>,
        email: &str,
    ) -> AuthResult<()> {
        if caller.is_some() {
            return Err(AuthError::AuthorizedUser);
        }

        let email = Email::new(email).map_err(|_| AuthError::UserNotFound)?;

        let mut tx = self.store.begin().await?;

        let user = tx
            .find_user_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?
            .user;

        let token = PasswordResetToken::new(
            user.user_id,
            crypto::random_hex(self.config.reset_token_length),
            self.config.reset_token_ttl(),
        );
        let stored = tx.upsert_password_reset_token(&token).await?;

        tx.commit().await?;

        tracing::info!(
            user_id = %user.user_id,
            expires_at = %stored.expires_at,
            "Password reset token issued"
        );

        self.notify(Message {
            email: user.email,
            payload: MessagePayload::PasswordResetRequested {
                token: stored.token,
            },
        })
        .await
    }

    // ========================================================================
    // Confirm
    // ========================================================================

    pub async fn handle_password_reset_confirm(
        &self,
        caller: Option<&UserId>,
        token: &str,
        new_password: ClearTextPassword,
    ) -> AuthResult<()> {
        if caller.is_some() {
            return Err(AuthError::AuthorizedUser);
        }

        if token.is_empty() {
            return Err(AuthError::InvalidToken);
        }

        if let Some(policy) = &self.config.password_policy {
            policy.verify(new_password.expose())?;
        }

        let password_hash = hash_password(self.hasher.clone(), new_password).await?;

        let mut tx = self.store.begin().await?;

        let reset = tx
            .find_password_reset_token(token)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if reset.is_used {
            return Err(AuthError::UsedPasswordResetToken);
        }
        if reset.is_expired(Utc::now()) {
            return Err(AuthError::ExpiredToken);
        }

        let user = tx
            .find_user_by_id(&reset.user_id)
            .await?
            .ok_or_else(|| AuthError::Internal("reset token owner does not exist".to_string()))?;

        // Conditional update; loses if a concurrent confirm got there first.
        if !tx.mark_password_reset_token_used(token).await? {
            return Err(AuthError::UsedPasswordResetToken);
        }

        tx.upsert_password_credential(&PasswordCredential::new(
            user.user_id,
            user.email.clone(),
            password_hash,
        ))
        .await?;

        let sessions_expired = tx.expire_sessions_by_user_id(&user.user_id).await?;

        tx.commit().await?;

        tracing::info!(
            user_id = %user.user_id,
            sessions_expired,
            "Password reset completed"
        );

        self.notify(Message {
            email: user.email,
            payload: MessagePayload::PasswordResetSucceeded,
        })
        .await
    }

    /// Send after commit; failures are reported, the committed state stays.
    async fn notify(&self, message: Message) -> AuthResult<()> {
        let kind = message.payload.kind();
        self.sender.send(message).await.map_err(|e| {
            tracing::error!(kind, error = %e, "Failed to send notification");
            match e {
                AuthError::Notification(_) => e,
                other => AuthError::Notification(other.to_string()),
            }
        })
    }
}
