//! Identity Middleware
//!
//! Runs an [`Authenticator`] in front of the wrapped routes and stores the
//! result in the request extensions under a private type, so only
//! [`CurrentUser`] and [`current_identity`] can read it. Cookies the
//! authenticator emits are copied onto whatever response goes out.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{FromRequestParts, OptionalFromRequestParts, Request, State};
use axum::http::header::SET_COOKIE;
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::application::authenticator::Authenticator;
use crate::domain::entity::Identity;
use crate::error::AuthError;

/// Middleware state
pub struct IdentityState<A> {
    authenticator: Arc<A>,
    /// Let unauthenticated requests through with no identity instead of 401
    passthrough: bool,
}

impl<A> Clone for IdentityState<A> {
    fn clone(&self) -> Self {
        Self {
            authenticator: self.authenticator.clone(),
            passthrough: self.passthrough,
        }
    }
}

impl<A> IdentityState<A>
where
    A: Authenticator,
{
    /// Rejects unauthenticated requests with 401
    pub fn required(authenticator: Arc<A>) -> Self {
        Self {
            authenticator,
            passthrough: false,
        }
    }

    /// Lets unauthenticated requests through; handlers see no identity
    pub fn optional(authenticator: Arc<A>) -> Self {
        Self {
            authenticator,
            passthrough: true,
        }
    }
}

/// Slot keyed by payload type; `None` records an anonymous request
#[derive(Clone)]
struct IdentitySlot<T>(Option<Identity<T>>);

pub async fn identify<A>(
    State(state): State<IdentityState<A>>,
    mut req: Request,
    next: Next,
) -> Response
where
    A: Authenticator,
{
    let mut cookies = HeaderMap::new();

    match state.authenticator.authenticate(req.headers(), &mut cookies).await {
        Ok(identity) => {
            req.extensions_mut().insert(IdentitySlot(Some(identity)));
        }
        Err(e) if e.is_server_error() => {
            return with_cookies(e.into_response(), &cookies);
        }
        Err(e) if state.passthrough => {
            tracing::debug!(reason = %e, "Anonymous request");
            req.extensions_mut()
                .insert(IdentitySlot::<A::Payload>(None));
        }
        Err(e) => {
            tracing::debug!(reason = %e, "Rejected unauthenticated request");
            return with_cookies(AuthError::UnauthorizedUser.into_response(), &cookies);
        }
    }

    with_cookies(next.run(req).await, &cookies)
}

fn with_cookies(mut response: Response, cookies: &HeaderMap) -> Response {
    for value in cookies.get_all(SET_COOKIE) {
        response.headers_mut().append(SET_COOKIE, value.clone());
    }
    response
}

/// Identity resolved by [`identify`] for payload type `T`
pub fn current_identity<T>(extensions: &Extensions) -> Option<&Identity<T>>
where
    T: Clone + Send + Sync + 'static,
{
    extensions
        .get::<IdentitySlot<T>>()
        .and_then(|slot| slot.0.as_ref())
}

// ============================================================================
// Extractor
// ============================================================================

/// The authenticated caller; rejects with 401 when there is none.
///
/// Use `Option<CurrentUser<T>>` on routes that also serve anonymous callers.
#[derive(Debug, Clone)]
pub struct CurrentUser<T>(pub Identity<T>);

impl<S, T> FromRequestParts<S> for CurrentUser<T>
where
    S: Send + Sync,
    T: Clone + Send + Sync + 'static,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_identity::<T>(&parts.extensions)
            .cloned()
            .map(CurrentUser)
            .ok_or(AuthError::UnauthorizedUser)
    }
}

impl<S, T> OptionalFromRequestParts<S> for CurrentUser<T>
where
    S: Send + Sync,
    T: Clone + Send + Sync + 'static,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(current_identity::<T>(&parts.extensions)
            .cloned()
            .map(CurrentUser))
    }
}
