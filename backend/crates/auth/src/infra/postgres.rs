//! PostgreSQL Credential Store

use chrono::{DateTime, Utc};
use kernel::error::conversions::{PG_UNIQUE_VIOLATION, pg_error_code};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::entity::{
    PASSWORD_CREDENTIAL_NAME, PasswordCredential, PasswordResetToken, Session, User,
    UserWithCredential,
};
use crate::domain::repository::{CredentialStore, CredentialTx};
use crate::domain::value_object::{Email, PasswordResetTokenId, SessionId, UserId};
use crate::error::{AuthError, AuthResult};

/// PostgreSQL-backed credential store
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Delete expired sessions and spent or expired reset tokens
    pub async fn cleanup_expired(&self) -> AuthResult<u64> {
        let sessions_deleted = sqlx::query("DELETE FROM sessions WHERE expires_at < now()")
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::storage("cleanup_sessions", e))?
            .rows_affected();

        let tokens_deleted = sqlx::query(
            "DELETE FROM password_reset_tokens WHERE is_used OR expires_at < now()",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::storage("cleanup_reset_tokens", e))?
        .rows_affected();

        tracing::info!(
            sessions_deleted,
            tokens_deleted,
            "Cleaned up expired auth records"
        );

        Ok(sessions_deleted + tokens_deleted)
    }
}

impl CredentialStore for PgCredentialStore {
    type Tx = PgCredentialTx;

    async fn begin(&self) -> AuthResult<PgCredentialTx> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AuthError::storage("begin", e))?;

        Ok(PgCredentialTx { tx })
    }
}

/// Open transaction; rolled back by sqlx when dropped uncommitted
pub struct PgCredentialTx {
    tx: Transaction<'static, Postgres>,
}

impl PgCredentialTx {
    /// Connection for hooks that write their own tables in the same transaction
    pub fn connection(&mut self) -> &mut PgConnection {
        &mut self.tx
    }
}

// ============================================================================
// Credential Transaction Implementation
// ============================================================================

impl CredentialTx for PgCredentialTx {
    async fn create_user(&mut self, user: &User) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                user_id,
                email,
                is_email_verified,
                first_name,
                last_name,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.user_id.as_uuid())
        .bind(user.email.as_str())
        .bind(user.is_email_verified)
        .bind(user.first_name.as_deref())
        .bind(user.last_name.as_deref())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| match pg_error_code(&e).as_deref() {
            Some(PG_UNIQUE_VIOLATION) => AuthError::EmailAlreadyTaken,
            _ => AuthError::storage("create_user", e),
        })?;

        Ok(())
    }

    async fn find_user_by_id(&mut self, user_id: &UserId) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT
                user_id,
                email,
                is_email_verified,
                first_name,
                last_name,
                created_at,
                updated_at
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| AuthError::storage("find_user_by_id", e))?;

        Ok(row.map(UserRow::into_user))
    }

    async fn find_user_by_email(
        &mut self,
        email: &Email,
    ) -> AuthResult<Option<UserWithCredential>> {
        let row = sqlx::query_as::<_, UserWithCredentialRow>(
            r#"
            SELECT
                u.user_id,
                u.email,
                u.is_email_verified,
                u.first_name,
                u.last_name,
                u.created_at,
                u.updated_at,
                c.secret AS password_hash
            FROM users u
            LEFT JOIN credentials c
                ON c.user_id = u.user_id AND c.name = $2
            WHERE u.email = $1
            "#,
        )
        .bind(email.as_str())
        .bind(PASSWORD_CREDENTIAL_NAME)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| AuthError::storage("find_user_by_email", e))?;

        Ok(row.map(UserWithCredentialRow::into_entity))
    }

    async fn upsert_password_credential(
        &mut self,
        credential: &PasswordCredential,
    ) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO credentials (user_id, name, key, secret, created_at, updated_at)
            VALUES ($1, $2, $3, $4, now(), now())
            ON CONFLICT (user_id, name) DO UPDATE SET
                key = EXCLUDED.key,
                secret = EXCLUDED.secret,
                updated_at = now()
            "#,
        )
        .bind(credential.user_id.as_uuid())
        .bind(PASSWORD_CREDENTIAL_NAME)
        .bind(credential.key.as_str())
        .bind(&credential.secret)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AuthError::storage("upsert_password_credential", e))?;

        Ok(())
    }

    async fn upsert_password_reset_token(
        &mut self,
        token: &PasswordResetToken,
    ) -> AuthResult<PasswordResetToken> {
        let row = sqlx::query_as::<_, PasswordResetTokenRow>(
            r#"
            INSERT INTO password_reset_tokens (id, user_id, token, expires_at, is_used, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE SET
                token = EXCLUDED.token,
                expires_at = EXCLUDED.expires_at,
                is_used = FALSE,
                created_at = EXCLUDED.created_at
            RETURNING id, user_id, token, expires_at, is_used, created_at
            "#,
        )
        .bind(token.id.as_uuid())
        .bind(token.user_id.as_uuid())
        .bind(&token.token)
        .bind(token.expires_at)
        .bind(token.is_used)
        .bind(token.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| AuthError::storage("upsert_password_reset_token", e))?;

        Ok(row.into_entity())
    }

    async fn find_password_reset_token(
        &mut self,
        token: &str,
    ) -> AuthResult<Option<PasswordResetToken>> {
        let row = sqlx::query_as::<_, PasswordResetTokenRow>(
            r#"
            SELECT id, user_id, token, expires_at, is_used, created_at
            FROM password_reset_tokens
            WHERE token = $1
            FOR UPDATE
            "#,
        )
        .bind(token)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| AuthError::storage("find_password_reset_token", e))?;

        Ok(row.map(PasswordResetTokenRow::into_entity))
    }

    async fn mark_password_reset_token_used(&mut self, token: &str) -> AuthResult<bool> {
        let updated = sqlx::query(
            "UPDATE password_reset_tokens SET is_used = TRUE WHERE token = $1 AND is_used = FALSE",
        )
        .bind(token)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AuthError::storage("mark_password_reset_token_used", e))?
        .rows_affected();

        Ok(updated == 1)
    }

    async fn create_session(&mut self, session: &Session) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (session_id, user_id, expires_at, evicted_by, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(session.session_id.as_uuid())
        .bind(session.user_id.as_uuid())
        .bind(session.expires_at)
        .bind(session.evicted_by.map(|id| id.into_uuid()))
        .bind(session.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AuthError::storage("create_session", e))?;

        Ok(())
    }

    async fn find_session_by_id(&mut self, session_id: &SessionId) -> AuthResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT session_id, user_id, expires_at, evicted_by, created_at
            FROM sessions
            WHERE session_id = $1
            "#,
        )
        .bind(session_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| AuthError::storage("find_session_by_id", e))?;

        Ok(row.map(SessionRow::into_entity))
    }

    async fn expire_session_by_id(&mut self, session_id: &SessionId) -> AuthResult<bool> {
        let updated = sqlx::query(
            "UPDATE sessions SET expires_at = now() WHERE session_id = $1 AND expires_at > now()",
        )
        .bind(session_id.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AuthError::storage("expire_session_by_id", e))?
        .rows_affected();

        Ok(updated == 1)
    }

    async fn expire_sessions_by_user_id(&mut self, user_id: &UserId) -> AuthResult<u64> {
        let updated = sqlx::query(
            "UPDATE sessions SET expires_at = now() WHERE user_id = $1 AND expires_at > now()",
        )
        .bind(user_id.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AuthError::storage("expire_sessions_by_user_id", e))?
        .rows_affected();

        Ok(updated)
    }

    async fn commit(self) -> AuthResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| AuthError::storage("commit", e))
    }

    async fn rollback(self) -> AuthResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| AuthError::storage("rollback", e))
    }
}

// ============================================================================
// Row Types for sqlx mapping
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: Uuid,
    email: String,
    is_email_verified: bool,
    first_name: Option<String>,
    last_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> User {
        User {
            user_id: UserId::from_uuid(self.user_id),
            email: Email::from_db(self.email),
            is_email_verified: self.is_email_verified,
            first_name: self.first_name,
            last_name: self.last_name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserWithCredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: Option<String>,
}

impl UserWithCredentialRow {
    fn into_entity(self) -> UserWithCredential {
        UserWithCredential {
            user: self.user.into_user(),
            password_hash: self.password_hash,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PasswordResetTokenRow {
    id: Uuid,
    user_id: Uuid,
    token: String,
    expires_at: DateTime<Utc>,
    is_used: bool,
    created_at: DateTime<Utc>,
}

impl PasswordResetTokenRow {
    fn into_entity(self) -> PasswordResetToken {
        PasswordResetToken {
            id: PasswordResetTokenId::from_uuid(self.id),
            user_id: UserId::from_uuid(self.user_id),
            token: self.token,
            expires_at: self.expires_at,
            is_used: self.is_used,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    session_id: Uuid,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
    evicted_by: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl SessionRow {
    fn into_entity(self) -> Session {
        Session {
            session_id: SessionId::from_uuid(self.session_id),
            user_id: UserId::from_uuid(self.user_id),
            expires_at: self.expires_at,
            evicted_by: self.evicted_by.map(SessionId::from_uuid),
            created_at: self.created_at,
        }
    }
}
