//! Password Credential Handler
//!
//! Registration and login with email + password.
//!
//! Hashing never runs while a transaction is open: registration hashes before
//! `begin`, login verifies after `commit`. The login transaction only reads
//! (plus whatever the hook writes), so committing before the password is
//! known to be correct is safe.

use std::sync::Arc;

use platform::crypto;
use platform::password::{ClearTextPassword, PasswordHashError, PasswordHasher};
use tokio::sync::OnceCell;

use crate::application::config::AuthConfig;
use crate::application::hijacker::{Hijacker, NoHijacker};
use crate::domain::entity::{Identity, PasswordCredential, User};
use crate::domain::repository::{CredentialStore, CredentialTx};
use crate::domain::value_object::{Email, UserId};
use crate::error::{AuthError, AuthResult};

/// Registration input
#[derive(Debug)]
pub struct Registration {
    pub email: String,
    pub password: ClearTextPassword,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl Registration {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: ClearTextPassword::new(password),
            first_name: None,
            last_name: None,
        }
    }
}

pub struct PasswordHandler<S, H = NoHijacker> {
    store: Arc<S>,
    hasher: Arc<dyn PasswordHasher>,
    hijacker: Arc<H>,
    config: Arc<AuthConfig>,
    /// Hash compared against when the email is unknown
    dummy_hash: OnceCell<String>,
}

impl<S> PasswordHandler<S, NoHijacker>
where
    S: CredentialStore,
{
    pub fn new(store: Arc<S>, hasher: Arc<dyn PasswordHasher>, config: Arc<AuthConfig>) -> Self {
        Self {
            store,
            hasher,
            hijacker: Arc::new(NoHijacker),
            config,
            dummy_hash: OnceCell::new(),
        }
    }
}

impl<S, H> PasswordHandler<S, H>
where
    S: CredentialStore,
    H: Hijacker<S::Tx>,
{
    /// Install an extension hook run inside the registration/login transaction
    pub fn with_hijacker<H2>(self, hijacker: Arc<H2>) -> PasswordHandler<S, H2>
    where
        H2: Hijacker<S::Tx>,
    {
        PasswordHandler {
            store: self.store,
            hasher: self.hasher,
            hijacker,
            config: self.config,
            dummy_hash: self.dummy_hash,
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    pub async fn handle_user_registration(
        &self,
        caller: Option<&UserId>,
        registration: Registration,
    ) -> AuthResult<Identity<H::Payload>> {
        if caller.is_some() {
            return Err(AuthError::AuthorizedUser);
        }

        let email = Email::new(&registration.email)
            .map_err(|e| AuthError::InvalidEmail(e.message().to_string()))?;

        if let Some(policy) = &self.config.password_policy {
            policy.verify(registration.password.expose())?;
        }

        let password_hash = hash_password(self.hasher.clone(), registration.password).await?;

        let mut tx = self.store.begin().await?;

        let user = User::new(email.clone(), registration.first_name, registration.last_name);
        tx.create_user(&user).await?;
        tx.upsert_password_credential(&PasswordCredential::new(
            user.user_id,
            email,
            password_hash,
        ))
        .await?;

        let payload = self
            .hijacker
            .hijack_user_registration(&user.user_id, &mut tx)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user.user_id, "User registered");

        Ok(Identity::new(user.user_id, payload))
    }

    // ========================================================================
    // Login
    // ========================================================================

    pub async fn handle_user_login(
        &self,
        caller: Option<&UserId>,
        email: &str,
        password: ClearTextPassword,
    ) -> AuthResult<Identity<H::Payload>> {
        if caller.is_some() {
            return Err(AuthError::AuthorizedUser);
        }

        // A malformed address cannot belong to an account.
        let Ok(email) = Email::new(email) else {
            self.equalize_timing(password).await;
            return Err(AuthError::UserNotFound);
        };

        let mut tx = self.store.begin().await?;

        let found = tx.find_user_by_email(&email).await?;
        let Some((user_id, password_hash)) = found.as_ref().and_then(|found| {
            found
                .usable_password_hash()
                .map(|hash| (found.user.user_id, hash.to_string()))
        }) else {
            drop(tx);
            self.equalize_timing(password).await;
            return Err(AuthError::UserNotFound);
        };

        let payload = self.hijacker.hijack_user_login(&user_id, &mut tx).await?;

        tx.commit().await?;

        // An overlong password can never have been stored; answer the same
        // way as any other mismatch.
        let matches = match verify_password(self.hasher.clone(), password_hash, password).await {
            Err(AuthError::Hash(PasswordHashError::PasswordTooLong { .. })) => false,
            other => other?,
        };
        if !matches {
            return Err(AuthError::PasswordIncorrect);
        }

        tracing::info!(user_id = %user_id, "User logged in");

        Ok(Identity::new(user_id, payload))
    }

    /// Spend roughly one verification worth of CPU on the not-found path
    async fn equalize_timing(&self, password: ClearTextPassword) {
        if !self.config.equalize_login_timing {
            return;
        }

        let hasher = self.hasher.clone();
        let dummy = self
            .dummy_hash
            .get_or_try_init(|| {
                hash_password(hasher, ClearTextPassword::new(crypto::random_hex(16)))
            })
            .await;

        match dummy {
            Ok(dummy) => {
                let _ = verify_password(self.hasher.clone(), dummy.clone(), password).await;
            }
            Err(e) => tracing::warn!(error = %e, "Could not prepare timing-equalization hash"),
        }
    }
}

// ============================================================================
// Blocking helpers
// ============================================================================

pub(crate) async fn hash_password(
    hasher: Arc<dyn PasswordHasher>,
    password: ClearTextPassword,
) -> AuthResult<String> {
    let hash = tokio::task::spawn_blocking(move || hasher.hash(password.expose())).await??;
    Ok(hash)
}

pub(crate) async fn verify_password(
    hasher: Arc<dyn PasswordHasher>,
    hash: String,
    password: ClearTextPassword,
) -> AuthResult<bool> {
    let matches =
        tokio::task::spawn_blocking(move || hasher.verify(&hash, password.expose())).await??;
    Ok(matches)
}
