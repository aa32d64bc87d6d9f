//! In-Memory Credential Store
//!
//! A transactional store for tests and local development. A transaction holds
//! the store lock for its whole lifetime and works on a copy of the state;
//! `commit` writes the copy back, dropping it discards it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::entity::{
    PasswordCredential, PasswordResetToken, Session, User, UserWithCredential,
};
use crate::domain::repository::{CredentialStore, CredentialTx};
use crate::domain::value_object::{Email, SessionId, UserId};
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<UserId, User>,
    credentials: HashMap<UserId, PasswordCredential>,
    /// At most one token per user
    reset_tokens: HashMap<UserId, PasswordResetToken>,
    sessions: HashMap<SessionId, Session>,
}

impl MemoryState {
    fn reset_token_mut(&mut self, token: &str) -> Option<&mut PasswordResetToken> {
        self.reset_tokens.values_mut().find(|t| t.token == token)
    }
}

#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    type Tx = MemoryCredentialTx;

    async fn begin(&self) -> AuthResult<MemoryCredentialTx> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();

        Ok(MemoryCredentialTx { guard, working })
    }
}

pub struct MemoryCredentialTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

impl CredentialTx for MemoryCredentialTx {
    async fn create_user(&mut self, user: &User) -> AuthResult<()> {
        let taken = self
            .working
            .users
            .values()
            .any(|existing| existing.email == user.email);
        if taken || self.working.users.contains_key(&user.user_id) {
            return Err(AuthError::EmailAlreadyTaken);
        }

        self.working.users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn find_user_by_id(&mut self, user_id: &UserId) -> AuthResult<Option<User>> {
        Ok(self.working.users.get(user_id).cloned())
    }

    async fn find_user_by_email(
        &mut self,
        email: &Email,
    ) -> AuthResult<Option<UserWithCredential>> {
        let Some(user) = self.working.users.values().find(|u| &u.email == email) else {
            return Ok(None);
        };

        let password_hash = self
            .working
            .credentials
            .get(&user.user_id)
            .map(|c| c.secret.clone());

        Ok(Some(UserWithCredential {
            user: user.clone(),
            password_hash,
        }))
    }

    async fn upsert_password_credential(
        &mut self,
        credential: &PasswordCredential,
    ) -> AuthResult<()> {
        if !self.working.users.contains_key(&credential.user_id) {
            return Err(AuthError::Internal(format!(
                "credential for unknown user {}",
                credential.user_id
            )));
        }

        self.working
            .credentials
            .insert(credential.user_id, credential.clone());
        Ok(())
    }

    async fn upsert_password_reset_token(
        &mut self,
        token: &PasswordResetToken,
    ) -> AuthResult<PasswordResetToken> {
        let stored = match self.working.reset_tokens.get(&token.user_id) {
            // Same row, fresh contents
            Some(existing) => PasswordResetToken {
                id: existing.id,
                is_used: false,
                ..token.clone()
            },
            None => token.clone(),
        };

        self.working
            .reset_tokens
            .insert(stored.user_id, stored.clone());
        Ok(stored)
    }

    async fn find_password_reset_token(
        &mut self,
        token: &str,
    ) -> AuthResult<Option<PasswordResetToken>> {
        Ok(self.working.reset_token_mut(token).map(|t| t.clone()))
    }

    async fn mark_password_reset_token_used(&mut self, token: &str) -> AuthResult<bool> {
        match self.working.reset_token_mut(token) {
            Some(t) if !t.is_used => {
                t.is_used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn create_session(&mut self, session: &Session) -> AuthResult<()> {
        self.working
            .sessions
            .insert(session.session_id, session.clone());
        Ok(())
    }

    async fn find_session_by_id(&mut self, session_id: &SessionId) -> AuthResult<Option<Session>> {
        Ok(self.working.sessions.get(session_id).cloned())
    }

    async fn expire_session_by_id(&mut self, session_id: &SessionId) -> AuthResult<bool> {
        let now = Utc::now();
        match self.working.sessions.get_mut(session_id) {
            Some(session) if !session.is_expired(now) => {
                session.expires_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn expire_sessions_by_user_id(&mut self, user_id: &UserId) -> AuthResult<u64> {
        let now = Utc::now();
        let mut expired = 0;

        for session in self
            .working
            .sessions
            .values_mut()
            .filter(|s| &s.user_id == user_id && !s.is_expired(now))
        {
            session.expires_at = now;
            expired += 1;
        }

        Ok(expired)
    }

    async fn commit(self) -> AuthResult<()> {
        let MemoryCredentialTx { mut guard, working } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> AuthResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(email: &str) -> User {
        User::new(Email::new(email).unwrap(), None, None)
    }

    #[tokio::test]
    async fn test_commit_persists() {
        let store = MemoryCredentialStore::new();
        let alice = user("alice@example.com");

        let mut tx = store.begin().await.unwrap();
        tx.create_user(&alice).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let found = tx.find_user_by_id(&alice.user_id).await.unwrap();
        assert_eq!(found, Some(alice));
    }

    #[tokio::test]
    async fn test_drop_rolls_back() {
        let store = MemoryCredentialStore::new();
        let alice = user("alice@example.com");

        {
            let mut tx = store.begin().await.unwrap();
            tx.create_user(&alice).await.unwrap();
        }

        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_user_by_id(&alice.user_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_explicit_rollback() {
        let store = MemoryCredentialStore::new();
        let alice = user("alice@example.com");

        let mut tx = store.begin().await.unwrap();
        tx.create_user(&alice).await.unwrap();
        tx.rollback().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_user_by_id(&alice.user_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let store = MemoryCredentialStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.create_user(&user("alice@example.com")).await.unwrap();
        let err = tx
            .create_user(&user("alice@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailAlreadyTaken));
    }

    #[tokio::test]
    async fn test_find_by_email_joins_credential() {
        let store = MemoryCredentialStore::new();
        let alice = user("alice@example.com");

        let mut tx = store.begin().await.unwrap();
        tx.create_user(&alice).await.unwrap();

        let found = tx.find_user_by_email(&alice.email).await.unwrap().unwrap();
        assert!(found.password_hash.is_none());

        tx.upsert_password_credential(&PasswordCredential::new(
            alice.user_id,
            alice.email.clone(),
            "$2b$04$hash".to_string(),
        ))
        .await
        .unwrap();

        let found = tx.find_user_by_email(&alice.email).await.unwrap().unwrap();
        assert_eq!(found.password_hash.as_deref(), Some("$2b$04$hash"));
    }

    #[tokio::test]
    async fn test_reset_token_upsert_and_mark_used() {
        let store = MemoryCredentialStore::new();
        let alice = user("alice@example.com");

        let mut tx = store.begin().await.unwrap();
        tx.create_user(&alice).await.unwrap();

        let first = tx
            .upsert_password_reset_token(&PasswordResetToken::new(
                alice.user_id,
                "first".to_string(),
                Duration::hours(1),
            ))
            .await
            .unwrap();
        assert!(tx.mark_password_reset_token_used("first").await.unwrap());
        assert!(!tx.mark_password_reset_token_used("first").await.unwrap());

        let second = tx
            .upsert_password_reset_token(&PasswordResetToken::new(
                alice.user_id,
                "second".to_string(),
                Duration::hours(1),
            ))
            .await
            .unwrap();
        assert_eq!(second.id, first.id);
        assert!(!second.is_used);
        assert!(tx.find_password_reset_token("first").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expire_sessions_by_user() {
        let store = MemoryCredentialStore::new();
        let alice = user("alice@example.com");
        let bob = user("bob@example.com");

        let mut tx = store.begin().await.unwrap();
        for owner in [&alice, &alice, &bob] {
            tx.create_session(&Session::new(owner.user_id, Duration::hours(1)))
                .await
                .unwrap();
        }

        assert_eq!(tx.expire_sessions_by_user_id(&alice.user_id).await.unwrap(), 2);
        assert_eq!(tx.expire_sessions_by_user_id(&alice.user_id).await.unwrap(), 0);
        assert_eq!(tx.expire_sessions_by_user_id(&bob.user_id).await.unwrap(), 1);
    }
}
