//! HTTP Handlers
//!
//! Every route sits behind the CSRF middleware and an optional session
//! identity, so handlers can tell anonymous callers from signed-in ones.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use platform::password::{ClearTextPassword, PasswordHasher};

use crate::application::config::AuthConfig;
use crate::application::password::{PasswordHandler, Registration};
use crate::application::password_reset::PasswordResetHandler;
use crate::application::session::SessionAuthenticator;
use crate::domain::entity::{Identity, Session};
use crate::domain::notification::Sender;
use crate::domain::repository::{CredentialStore, CredentialTx};
use crate::domain::value_object::UserId;
use crate::error::{AuthError, AuthResult};
use crate::presentation::csrf::CsrfToken;
use crate::presentation::dto::{
    CsrfTokenResponse, LoginRequest, MeResponse, PasswordResetConfirmRequest,
    PasswordResetRequest, RegisterRequest, SessionResponse,
};
use crate::presentation::middleware::CurrentUser;

/// Shared state for auth handlers
pub struct AuthAppState<S, N> {
    pub store: Arc<S>,
    pub passwords: Arc<PasswordHandler<S>>,
    pub resets: Arc<PasswordResetHandler<S, N>>,
    pub sessions: SessionAuthenticator<S>,
}

impl<S, N> Clone for AuthAppState<S, N> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            passwords: self.passwords.clone(),
            resets: self.resets.clone(),
            sessions: self.sessions.clone(),
        }
    }
}

impl<S, N> AuthAppState<S, N>
where
    S: CredentialStore,
    N: Sender + Send + Sync + 'static,
{
    pub fn new(
        store: S,
        sender: N,
        hasher: Arc<dyn PasswordHasher>,
        config: AuthConfig,
    ) -> Self {
        let store = Arc::new(store);
        let config = Arc::new(config);

        Self {
            passwords: Arc::new(PasswordHandler::new(
                store.clone(),
                hasher.clone(),
                config.clone(),
            )),
            resets: Arc::new(PasswordResetHandler::new(
                store.clone(),
                hasher,
                Arc::new(sender),
                config.clone(),
            )),
            sessions: SessionAuthenticator::new(store.clone(), config),
            store,
        }
    }
}

type Caller = Option<CurrentUser<Session>>;

fn caller_id(caller: &Caller) -> Option<&UserId> {
    caller.as_ref().map(|CurrentUser(identity)| &identity.user_id)
}

// ============================================================================
// Registration
// ============================================================================

/// POST /register
pub async fn register<S, N>(
    State(state): State<AuthAppState<S, N>>,
    caller: Caller,
    Json(req): Json<RegisterRequest>,
) -> AuthResult<impl IntoResponse>
where
    S: CredentialStore,
    N: Sender + Send + Sync + 'static,
{
    let registration = Registration {
        email: req.email,
        password: ClearTextPassword::new(req.password),
        first_name: req.first_name,
        last_name: req.last_name,
    };

    let identity = state
        .passwords
        .handle_user_registration(caller_id(&caller), registration)
        .await?;

    let mut headers = HeaderMap::new();
    let session = state.sessions.issue(&identity.user_id, &mut headers).await?;

    Ok((StatusCode::CREATED, headers, Json(session_response(&session))))
}

// ============================================================================
// Login / Logout
// ============================================================================

/// POST /login
pub async fn login<S, N>(
    State(state): State<AuthAppState<S, N>>,
    caller: Caller,
    Json(req): Json<LoginRequest>,
) -> AuthResult<impl IntoResponse>
where
    S: CredentialStore,
    N: Sender + Send + Sync + 'static,
{
    let identity = state
        .passwords
        .handle_user_login(
            caller_id(&caller),
            &req.email,
            ClearTextPassword::new(req.password),
        )
        .await?;

    let mut headers = HeaderMap::new();
    let session = state.sessions.issue(&identity.user_id, &mut headers).await?;

    Ok((StatusCode::OK, headers, Json(session_response(&session))))
}

/// POST /logout
pub async fn logout<S, N>(
    State(state): State<AuthAppState<S, N>>,
    headers: HeaderMap,
) -> AuthResult<impl IntoResponse>
where
    S: CredentialStore,
    N: Sender + Send + Sync + 'static,
{
    let mut response_headers = HeaderMap::new();
    state.sessions.logout(&headers, &mut response_headers).await?;

    Ok((StatusCode::NO_CONTENT, response_headers))
}

fn session_response(session: &Session) -> SessionResponse {
    SessionResponse {
        user_id: session.user_id.to_string(),
        expires_at: session.expires_at,
    }
}

// ============================================================================
// Password Reset
// ============================================================================

/// POST /password-reset
///
/// Answers 202 whether or not the email belongs to an account.
pub async fn password_reset_request<S, N>(
    State(state): State<AuthAppState<S, N>>,
    caller: Caller,
    Json(req): Json<PasswordResetRequest>,
) -> AuthResult<StatusCode>
where
    S: CredentialStore,
    N: Sender + Send + Sync + 'static,
{
    match state
        .resets
        .handle_password_reset_request(caller_id(&caller), &req.email)
        .await
    {
        Ok(()) => {}
        Err(AuthError::UserNotFound) => {
            tracing::debug!("Password reset requested for unknown email");
        }
        Err(e) => return Err(e),
    }

    Ok(StatusCode::ACCEPTED)
}

/// POST /password-reset/confirm
pub async fn password_reset_confirm<S, N>(
    State(state): State<AuthAppState<S, N>>,
    caller: Caller,
    Json(req): Json<PasswordResetConfirmRequest>,
) -> AuthResult<StatusCode>
where
    S: CredentialStore,
    N: Sender + Send + Sync + 'static,
{
    state
        .resets
        .handle_password_reset_confirm(
            caller_id(&caller),
            &req.token,
            ClearTextPassword::new(req.password),
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Current User
// ============================================================================

/// GET /me
pub async fn me<S, N>(
    State(state): State<AuthAppState<S, N>>,
    CurrentUser(identity): CurrentUser<Session>,
) -> AuthResult<Json<MeResponse>>
where
    S: CredentialStore,
    N: Sender + Send + Sync + 'static,
{
    let Identity { user_id, payload } = identity;

    let mut tx = state.store.begin().await?;
    let user = tx.find_user_by_id(&user_id).await?;
    tx.commit().await?;

    let (Some(user), Some(session)) = (user, payload) else {
        return Err(AuthError::UnauthorizedUser);
    };

    Ok(Json(MeResponse {
        user_id: user.user_id.to_string(),
        email: user.email.to_string(),
        is_email_verified: user.is_email_verified,
        first_name: user.first_name,
        last_name: user.last_name,
        session_expires_at: session.expires_at,
    }))
}

// ============================================================================
// CSRF
// ============================================================================

/// GET /csrf
pub async fn csrf_token(token: CsrfToken) -> Json<CsrfTokenResponse> {
    Json(CsrfTokenResponse {
        token: token.value().to_string(),
    })
}
