//! Auth (Authentication) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, storage, notification and SSO provider traits
//! - `application/` - Credential handlers and authentication strategies
//! - `infra/` - PostgreSQL and in-memory stores, log-only sender
//! - `presentation/` - CSRF and identity middleware, handlers, DTOs, router
//!
//! ## Features
//! - Registration and login with email + password
//! - Password reset with single-use, expiring tokens
//! - Server-side sessions referenced by an HttpOnly cookie
//! - Bearer-token authentication and authenticator composition
//! - Double-submit-cookie CSRF protection
//! - Single sign-on through any provider implementing the authorization-code flow
//!
//! ## Security Model
//! - Passwords hashed with bcrypt over NFKC-normalized input
//! - Login failures never reveal whether an email is registered
//! - A completed password reset expires every session of the user
//! - Multi-step writes run in one transaction; any error rolls back

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;


// Re-exports for convenience
pub use application::config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use infra::memory::MemoryCredentialStore;
pub use infra::postgres::PgCredentialStore;
pub use presentation::router::{auth_router, auth_router_generic, sso_router};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

// Convenience re-exports
pub mod config {
    pub use crate::application::config::*;
}

pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::domain::value_object::*;
    pub use crate::presentation::dto::*;
}

pub mod handlers {
    pub use crate::presentation::handlers::*;
}

pub mod middleware {
    pub use crate::presentation::csrf::{CsrfState, CsrfToken, csrf_protect};
    pub use crate::presentation::middleware::*;
}
