//! Auth Router

use std::sync::Arc;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use platform::csrf::CsrfConfig;
use platform::password::PasswordHasher;
use serde::Serialize;

use crate::application::config::AuthConfig;
use crate::application::session::SessionAuthenticator;
use crate::domain::notification::Sender;
use crate::domain::repository::CredentialStore;
use crate::domain::sso::SsoProvider;
use crate::infra::postgres::PgCredentialStore;
use crate::infra::sender::TracingSender;
use crate::presentation::csrf::{CsrfState, csrf_protect};
use crate::presentation::handlers::{self, AuthAppState};
use crate::presentation::middleware::{IdentityState, identify};
use crate::presentation::sso::{SsoState, sso_authorize, sso_callback};

/// Create the Auth router with the PostgreSQL store
pub fn auth_router(
    store: PgCredentialStore,
    hasher: Arc<dyn PasswordHasher>,
    config: AuthConfig,
    csrf: CsrfConfig,
) -> Router {
    auth_router_generic(AuthAppState::new(store, TracingSender, hasher, config), csrf)
}

/// Create a generic Auth router for any store and sender
pub fn auth_router_generic<S, N>(state: AuthAppState<S, N>, csrf: CsrfConfig) -> Router
where
    S: CredentialStore,
    N: Sender + Send + Sync + 'static,
{
    let identity = IdentityState::optional(Arc::new(state.sessions.clone()));

    Router::new()
        .route("/register", post(handlers::register::<S, N>))
        .route("/login", post(handlers::login::<S, N>))
        .route("/logout", post(handlers::logout::<S, N>))
        .route("/password-reset", post(handlers::password_reset_request::<S, N>))
        .route(
            "/password-reset/confirm",
            post(handlers::password_reset_confirm::<S, N>),
        )
        .route("/me", get(handlers::me::<S, N>))
        .route("/csrf", get(handlers::csrf_token))
        .with_state(state)
        .layer(from_fn_with_state(
            identity,
            identify::<SessionAuthenticator<S>>,
        ))
        .layer(from_fn_with_state(CsrfState::new(csrf), csrf_protect))
}

/// Create the SSO router for one identity provider
///
/// Nest it under a provider-specific prefix, e.g. `/api/auth/sso/google`.
pub fn sso_router<P>(state: SsoState<P>) -> Router
where
    P: SsoProvider,
    P::Claims: Serialize,
{
    Router::new()
        .route("/authorize", get(sso_authorize::<P>))
        .route(
            "/callback",
            get(sso_callback::<P>).post(sso_callback::<P>),
        )
        .with_state(state)
}
