//! Authentication Strategies
//!
//! An [`Authenticator`] turns request headers into an [`Identity`]. It may
//! also emit cookies (clearing a broken session cookie, for instance) through
//! `response_headers`, which the identity middleware copies onto the response.

use std::future::Future;

use axum::http::{HeaderMap, header};

use crate::domain::entity::Identity;
use crate::domain::repository::TokenStorage;
use crate::error::{AuthError, AuthResult};

pub trait Authenticator: Send + Sync + 'static {
    type Payload: Clone + Send + Sync + 'static;

    /// `UnauthorizedUser` when the request carries no usable credentials;
    /// any other error is a system failure.
    fn authenticate(
        &self,
        headers: &HeaderMap,
        response_headers: &mut HeaderMap,
    ) -> impl Future<Output = AuthResult<Identity<Self::Payload>>> + Send;
}

// ============================================================================
// Bearer token
// ============================================================================

/// Authenticates `Authorization: Bearer <token>` against a [`TokenStorage`]
pub struct TokenAuthenticator<S> {
    storage: S,
}

impl<S> TokenAuthenticator<S>
where
    S: TokenStorage,
{
    pub fn new(storage: S) -> Self {
        Self { storage }
    }
}

impl<S> Authenticator for TokenAuthenticator<S>
where
    S: TokenStorage,
{
    type Payload = S::Payload;

    async fn authenticate(
        &self,
        headers: &HeaderMap,
        _response_headers: &mut HeaderMap,
    ) -> AuthResult<Identity<S::Payload>> {
        let token = bearer_token(headers).ok_or(AuthError::UnauthorizedUser)?;

        self.storage
            .retrieve(token)
            .await?
            .ok_or(AuthError::UnauthorizedUser)
    }
}

/// Token from an `Authorization: Bearer` header; the scheme is case-insensitive.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

// ============================================================================
// Union
// ============================================================================

/// Tries `first`, then `second`; the first success wins.
///
/// When both fail, a system error from either side is reported in preference
/// to a plain `UnauthorizedUser`.
pub struct Union<A, B> {
    first: A,
    second: B,
}

impl<A, B> Union<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A, B> Authenticator for Union<A, B>
where
    A: Authenticator,
    B: Authenticator<Payload = A::Payload>,
{
    type Payload = A::Payload;

    async fn authenticate(
        &self,
        headers: &HeaderMap,
        response_headers: &mut HeaderMap,
    ) -> AuthResult<Identity<A::Payload>> {
        let first_err = match self.first.authenticate(headers, response_headers).await {
            Ok(identity) => return Ok(identity),
            Err(e) => e,
        };

        match self.second.authenticate(headers, response_headers).await {
            Ok(identity) => Ok(identity),
            Err(second_err) if first_err.is_server_error() && !second_err.is_server_error() => {
                Err(first_err)
            }
            Err(second_err) => Err(second_err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    use crate::domain::value_object::UserId;

    struct StaticTokens {
        token: &'static str,
        user_id: UserId,
    }

    impl TokenStorage for StaticTokens {
        type Payload = String;

        async fn retrieve(&self, token: &str) -> AuthResult<Option<Identity<String>>> {
            Ok((token == self.token).then(|| Identity::new(self.user_id, token.to_string())))
        }
    }

    struct Failing;

    impl Authenticator for Failing {
        type Payload = String;

        async fn authenticate(
            &self,
            _headers: &HeaderMap,
            _response_headers: &mut HeaderMap,
        ) -> AuthResult<Identity<String>> {
            Err(AuthError::Internal("storage offline".to_string()))
        }
    }

    fn with_authorization(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&with_authorization("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&with_authorization("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&with_authorization("Basic abc")), None);
        assert_eq!(bearer_token(&with_authorization("Bearer ")), None);
        assert_eq!(bearer_token(&with_authorization("Bearer")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_token_authenticator() {
        let user_id = UserId::new();
        let auth = TokenAuthenticator::new(StaticTokens {
            token: "t0ken",
            user_id,
        });
        let mut out = HeaderMap::new();

        let identity = auth
            .authenticate(&with_authorization("Bearer t0ken"), &mut out)
            .await
            .unwrap();
        assert_eq!(identity.user_id, user_id);

        let err = auth
            .authenticate(&with_authorization("Bearer wrong"), &mut out)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UnauthorizedUser));

        let err = auth
            .authenticate(&HeaderMap::new(), &mut out)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UnauthorizedUser));
    }

    #[tokio::test]
    async fn test_union_falls_through_to_second() {
        let user_id = UserId::new();
        let union = Union::new(
            Failing,
            TokenAuthenticator::new(StaticTokens {
                token: "t0ken",
                user_id,
            }),
        );
        let mut out = HeaderMap::new();

        let identity = union
            .authenticate(&with_authorization("Bearer t0ken"), &mut out)
            .await
            .unwrap();
        assert_eq!(identity.user_id, user_id);
    }

    #[tokio::test]
    async fn test_union_prefers_system_error() {
        let union = Union::new(
            Failing,
            TokenAuthenticator::new(StaticTokens {
                token: "t0ken",
                user_id: UserId::new(),
            }),
        );
        let mut out = HeaderMap::new();

        let err = union
            .authenticate(&HeaderMap::new(), &mut out)
            .await
            .unwrap_err();
        assert!(err.is_server_error());
    }
}
