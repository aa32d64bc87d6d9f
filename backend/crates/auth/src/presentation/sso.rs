//! SSO Handlers
//!
//! `GET /authorize` redirects to the provider and pins the issued `state` in
//! a short-lived cookie. `/callback` accepts GET, or POST for providers that
//! answer with a form, and requires the `state` to match that cookie. The
//! state cookie stands in for the CSRF middleware on these routes.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::Form;
use axum::Json;
use axum::extract::{FromRequest, Query, Request, State};
use axum::http::{HeaderMap, Method};
use axum::response::{IntoResponse, Redirect};
use chrono::{Duration, Utc};
use platform::cookie::{CookieConfig, SameSite, append_set_cookie, extract_cookie};
use platform::crypto;
use serde::Serialize;

use crate::application::sso::{CallbackParams, SsoHandler};
use crate::domain::sso::SsoProvider;
use crate::error::{AuthError, AuthResult};
use crate::presentation::dto::SsoProfileResponse;

pub const SSO_STATE_COOKIE: &str = "sso_state";

/// How long the browser has to come back from the provider
const STATE_TTL_MINUTES: i64 = 10;

pub struct SsoState<P> {
    handler: SsoHandler<P>,
    cookie: CookieConfig,
}

impl<P> Clone for SsoState<P> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            cookie: self.cookie.clone(),
        }
    }
}

impl<P> SsoState<P>
where
    P: SsoProvider,
{
    pub fn new(provider: Arc<P>, cookie_secure: bool) -> Self {
        Self {
            handler: SsoHandler::new(provider),
            cookie: CookieConfig {
                name: SSO_STATE_COOKIE.to_string(),
                secure: cookie_secure,
                http_only: true,
                same_site: SameSite::Lax,
                path: "/".to_string(),
            },
        }
    }

    /// Providers that POST the callback cross-site need `SameSite::None`
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.cookie.same_site = same_site;
        self
    }
}

// ============================================================================
// Callback parameters
// ============================================================================

/// Callback parameters: the URL query on GET; otherwise the urlencoded form
/// merged over the URL query
pub struct SsoCallback(pub CallbackParams);

impl<S> FromRequest<S> for SsoCallback
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut params = Query::<HashMap<String, String>>::try_from_uri(req.uri())
            .map(|Query(query)| query)
            .unwrap_or_default();

        if req.method() != Method::GET {
            if let Ok(Form(fields)) = Form::<HashMap<String, String>>::from_request(req, state).await
            {
                params.extend(fields);
            }
        }

        Ok(Self(CallbackParams::from_map(params)))
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /authorize
pub async fn sso_authorize<P>(State(state): State<SsoState<P>>) -> impl IntoResponse
where
    P: SsoProvider,
{
    let issued = state.handler.handle_authorize();

    let mut headers = HeaderMap::new();
    let expires_at = Utc::now() + Duration::minutes(STATE_TTL_MINUTES);
    append_set_cookie(
        &mut headers,
        state.cookie.build_set_cookie(&issued.state, Some(expires_at)),
    );

    (headers, Redirect::to(&issued.url))
}

/// GET|POST /callback
pub async fn sso_callback<P>(
    State(state): State<SsoState<P>>,
    headers: HeaderMap,
    SsoCallback(params): SsoCallback,
) -> AuthResult<impl IntoResponse>
where
    P: SsoProvider,
    P::Claims: Serialize,
{
    let expected = extract_cookie(&headers, &state.cookie.name);
    let state_matches = match (expected.as_deref(), params.state.as_deref()) {
        (Some(expected), Some(received)) => {
            crypto::constant_time_eq(expected.as_bytes(), received.as_bytes())
        }
        _ => false,
    };
    if !state_matches {
        return Err(AuthError::SsoStateMismatch);
    }

    let info = state.handler.handle_callback(&params).await?;

    let mut response_headers = HeaderMap::new();
    append_set_cookie(&mut response_headers, state.cookie.build_delete_cookie());

    Ok((
        response_headers,
        Json(SsoProfileResponse {
            email: info.user_info.email,
            claims: info.user_info.claims,
        }),
    ))
}
