//! Auth Error Types
//!
//! This module provides auth-specific error variants that integrate
//! with the unified `kernel::error::AppError` system.
//!
//! `Display` is for logs and may name internal details; clients only ever see
//! [`AuthError::public_message`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::csrf::CsrfError;
use platform::password::PasswordHashError;
use platform::password_policy::PasswordVerificationError;
use thiserror::Error;

use crate::domain::sso::ProviderError;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Shared by `UserNotFound` and `PasswordIncorrect` so responses cannot be
/// used to probe which emails are registered.
const LOGIN_FAILED_MESSAGE: &str = "email or password incorrect";

const CSRF_FAILED_MESSAGE: &str = "invalid CSRF token";

/// Auth-specific error variants
#[derive(Debug, Error)]
pub enum AuthError {
    // ------------------------------------------------------------------------
    // Access policy
    // ------------------------------------------------------------------------
    /// Caller is already signed in (registration, login and reset are for
    /// anonymous callers)
    #[error("Caller is already authenticated")]
    AuthorizedUser,

    #[error("Caller is not authenticated")]
    UnauthorizedUser,

    // ------------------------------------------------------------------------
    // Credentials
    // ------------------------------------------------------------------------
    #[error("User not found")]
    UserNotFound,

    #[error("Password incorrect")]
    PasswordIncorrect,

    #[error("Email already taken")]
    EmailAlreadyTaken,

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Password too weak: {0}")]
    WeakPassword(#[from] PasswordVerificationError),

    // ------------------------------------------------------------------------
    // Password reset
    // ------------------------------------------------------------------------
    #[error("Password reset token not found")]
    InvalidToken,

    #[error("Password reset token already used")]
    UsedPasswordResetToken,

    #[error("Password reset token expired")]
    ExpiredToken,

    // ------------------------------------------------------------------------
    // Single sign-on
    // ------------------------------------------------------------------------
    /// The provider redirected back with an `error` parameter
    #[error("Identity provider returned an error: {0}")]
    SsoDenied(String),

    #[error("Missing authorization code")]
    MissingAuthorizationCode,

    /// Callback `state` does not match the one issued at authorize time
    #[error("SSO state mismatch")]
    SsoStateMismatch,

    #[error("Unable to exchange authorization code: {0}")]
    SsoExchange(#[source] ProviderError),

    #[error("Unable to fetch user info: {0}")]
    SsoUserInfo(#[source] ProviderError),

    // ------------------------------------------------------------------------
    // Request integrity
    // ------------------------------------------------------------------------
    #[error("CSRF validation failed: {0}")]
    Csrf(#[from] CsrfError),

    // ------------------------------------------------------------------------
    // System
    // ------------------------------------------------------------------------
    #[error("Password hashing failed: {0}")]
    Hash(#[from] PasswordHashError),

    /// Storage failure, labelled with the operation that failed
    #[error("Storage error during {op}: {source}")]
    Storage {
        op: &'static str,
        #[source]
        source: AppError,
    },

    /// Message could not be delivered; the preceding commit stands
    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Wrap a classified storage error with the failing operation
    pub fn storage(op: &'static str, source: impl Into<AppError>) -> Self {
        AuthError::Storage {
            op,
            source: source.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::AuthorizedUser | AuthError::Csrf(_) | AuthError::SsoStateMismatch => {
                ErrorKind::Forbidden
            }
            AuthError::UnauthorizedUser
            | AuthError::UserNotFound
            | AuthError::PasswordIncorrect
            | AuthError::SsoDenied(_) => ErrorKind::Unauthorized,
            AuthError::EmailAlreadyTaken => ErrorKind::Conflict,
            AuthError::InvalidEmail(_)
            | AuthError::InvalidToken
            | AuthError::UsedPasswordResetToken
            | AuthError::MissingAuthorizationCode => ErrorKind::BadRequest,
            AuthError::WeakPassword(_)
            | AuthError::Hash(PasswordHashError::PasswordTooLong { .. }) => {
                ErrorKind::UnprocessableEntity
            }
            AuthError::ExpiredToken => ErrorKind::Gone,
            AuthError::Storage { source, .. } if source.is_server_error() => source.kind(),
            AuthError::Notification(_) | AuthError::SsoExchange(_) | AuthError::SsoUserInfo(_) => {
                ErrorKind::ServiceUnavailable
            }
            AuthError::Hash(_) | AuthError::Storage { .. } | AuthError::Internal(_) => {
                ErrorKind::InternalServerError
            }
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.kind().is_server_error()
    }

    /// Message safe to show to clients
    pub fn public_message(&self) -> String {
        match self {
            AuthError::UserNotFound | AuthError::PasswordIncorrect => {
                LOGIN_FAILED_MESSAGE.to_string()
            }
            AuthError::Csrf(_) => CSRF_FAILED_MESSAGE.to_string(),
            AuthError::Hash(e @ PasswordHashError::PasswordTooLong { .. }) => e.to_string(),
            AuthError::Storage { .. } | AuthError::Hash(_) | AuthError::Internal(_) => {
                "internal error".to_string()
            }
            AuthError::Notification(_) => "message delivery failed".to_string(),
            AuthError::SsoDenied(_) => "sign-in was denied by the identity provider".to_string(),
            AuthError::SsoExchange(_) | AuthError::SsoUserInfo(_) => {
                "identity provider unavailable".to_string()
            }
            AuthError::InvalidEmail(_) | AuthError::WeakPassword(_) => self.to_string(),
            other => other.to_string().to_lowercase(),
        }
    }

    /// Convert to AppError
    pub fn to_app_error(&self) -> AppError {
        AppError::new(self.kind(), self.public_message())
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            AuthError::Storage { op, source } => {
                tracing::error!(op, error = %source, "Auth storage error");
            }
            AuthError::Hash(PasswordHashError::PasswordTooLong { .. }) => {
                tracing::debug!(error = %self, "Rejected overlong password");
            }
            AuthError::Hash(e) => {
                tracing::error!(error = %e, "Password hashing error");
            }
            AuthError::Notification(msg) => {
                tracing::error!(message = %msg, "Auth notification error");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::Csrf(e) => {
                tracing::warn!(reason = %e, "Rejected request with invalid CSRF token");
            }
            AuthError::SsoExchange(e) | AuthError::SsoUserInfo(e) => {
                tracing::error!(error = %e, reason = %self, "Identity provider call failed");
            }
            AuthError::SsoDenied(_) | AuthError::SsoStateMismatch => {
                tracing::warn!(reason = %self, "Rejected SSO callback");
            }
            AuthError::PasswordIncorrect | AuthError::UserNotFound => {
                tracing::warn!(reason = %self, "Failed login attempt");
            }
            AuthError::UsedPasswordResetToken | AuthError::ExpiredToken => {
                tracing::warn!(reason = %self, "Rejected password reset token");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}

impl From<tokio::task::JoinError> for AuthError {
    fn from(err: tokio::task::JoinError) -> Self {
        AuthError::Internal(format!("blocking task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_failures_look_identical() {
        let not_found = AuthError::UserNotFound;
        let incorrect = AuthError::PasswordIncorrect;
        assert_ne!(not_found.to_string(), incorrect.to_string());
        assert_eq!(not_found.status_code(), incorrect.status_code());
        assert_eq!(not_found.public_message(), incorrect.public_message());
        assert_eq!(not_found.public_message(), "email or password incorrect");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AuthError::AuthorizedUser.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::UnauthorizedUser.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::EmailAlreadyTaken.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AuthError::UsedPasswordResetToken.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AuthError::InvalidToken.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::ExpiredToken.status_code(), StatusCode::GONE);
        assert_eq!(
            AuthError::Csrf(CsrfError::TokenMismatch).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::Notification("smtp down".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_csrf_reasons_share_one_message() {
        let checksum = AuthError::Csrf(CsrfError::ChecksumMismatch);
        let missing = AuthError::Csrf(CsrfError::MissingToken);
        assert_eq!(checksum.public_message(), "invalid CSRF token");
        assert_eq!(missing.public_message(), "invalid CSRF token");
    }

    #[test]
    fn test_overlong_password_is_a_client_error() {
        let err = AuthError::from(PasswordHashError::PasswordTooLong { max: 72 });
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(!err.is_server_error());
        assert_eq!(err.public_message(), "Password exceeds 72 bytes");

        let corrupt = AuthError::from(PasswordHashError::InvalidHashFormat);
        assert_eq!(corrupt.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(corrupt.public_message(), "internal error");
    }

    #[test]
    fn test_sso_status_mapping() {
        assert_eq!(
            AuthError::SsoDenied("access_denied".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::MissingAuthorizationCode.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AuthError::SsoStateMismatch.status_code(), StatusCode::FORBIDDEN);

        let exchange = AuthError::SsoExchange(ProviderError("token endpoint timed out".into()));
        assert_eq!(exchange.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(exchange.public_message(), "identity provider unavailable");
    }

    #[test]
    fn test_storage_error_hides_details() {
        let err = AuthError::storage("create_user", AppError::internal("relation does not exist"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "internal error");
        assert!(err.to_string().contains("create_user"));
    }

    #[test]
    fn test_storage_unavailable_keeps_kind() {
        let err = AuthError::storage("begin", AppError::service_unavailable("pool exhausted"));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_storage_client_kind_is_still_internal() {
        let err = AuthError::storage("find_user_by_id", AppError::not_found("Record not found"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
