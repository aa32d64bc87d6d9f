//! Storage Traits
//!
//! The credential store is transactional: handlers open a [`CredentialTx`],
//! run several operations and commit. Dropping a transaction without
//! committing rolls it back, so every early return (`?`) leaves storage
//! untouched.
//!
//! Implementations classify their driver errors before returning: a
//! duplicate email surfaces as [`AuthError::EmailAlreadyTaken`], "no row" as
//! `Ok(None)`/`Ok(false)`, and everything else as [`AuthError::Storage`].
//!
//! [`AuthError::EmailAlreadyTaken`]: crate::error::AuthError::EmailAlreadyTaken
//! [`AuthError::Storage`]: crate::error::AuthError::Storage

use std::future::Future;

use crate::domain::entity::{
    Identity, PasswordCredential, PasswordResetToken, Session, User, UserWithCredential,
};
use crate::domain::value_object::{Email, SessionId, UserId};
use crate::error::AuthResult;

/// Transaction factory
pub trait CredentialStore: Send + Sync + 'static {
    type Tx: CredentialTx + Send;

    fn begin(&self) -> impl Future<Output = AuthResult<Self::Tx>> + Send;
}

/// Operations available inside a transaction
#[trait_variant::make(CredentialTx: Send)]
pub trait LocalCredentialTx {
    // ------------------------------------------------------------------------
    // Users and credentials
    // ------------------------------------------------------------------------

    /// Fails with `EmailAlreadyTaken` when the email is in use
    async fn create_user(&mut self, user: &User) -> AuthResult<()>;

    async fn find_user_by_id(&mut self, user_id: &UserId) -> AuthResult<Option<User>>;

    async fn find_user_by_email(&mut self, email: &Email)
    -> AuthResult<Option<UserWithCredential>>;

    /// Insert or replace the user's password credential
    async fn upsert_password_credential(&mut self, credential: &PasswordCredential)
    -> AuthResult<()>;

    // ------------------------------------------------------------------------
    // Password reset tokens
    // ------------------------------------------------------------------------

    /// Insert or replace the user's reset token; returns the stored row
    async fn upsert_password_reset_token(
        &mut self,
        token: &PasswordResetToken,
    ) -> AuthResult<PasswordResetToken>;

    /// Looks up a token and locks it for the rest of the transaction
    async fn find_password_reset_token(
        &mut self,
        token: &str,
    ) -> AuthResult<Option<PasswordResetToken>>;

    /// Flip `is_used`; `false` when the token was already used
    async fn mark_password_reset_token_used(&mut self, token: &str) -> AuthResult<bool>;

    // ------------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------------

    async fn create_session(&mut self, session: &Session) -> AuthResult<()>;

    async fn find_session_by_id(&mut self, session_id: &SessionId)
    -> AuthResult<Option<Session>>;

    /// `false` when no live session had this id
    async fn expire_session_by_id(&mut self, session_id: &SessionId) -> AuthResult<bool>;

    /// Returns the number of sessions expired
    async fn expire_sessions_by_user_id(&mut self, user_id: &UserId) -> AuthResult<u64>;

    // ------------------------------------------------------------------------
    // Transaction control
    // ------------------------------------------------------------------------

    async fn commit(self) -> AuthResult<()>;

    async fn rollback(self) -> AuthResult<()>;
}

/// Lookup for opaque bearer tokens (API keys, personal access tokens)
pub trait TokenStorage: Send + Sync + 'static {
    type Payload: Clone + Send + Sync + 'static;

    /// `Ok(None)` when the token is unknown or revoked
    fn retrieve(
        &self,
        token: &str,
    ) -> impl Future<Output = AuthResult<Option<Identity<Self::Payload>>>> + Send;
}
