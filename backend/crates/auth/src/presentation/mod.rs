//! Presentation Layer
//!
//! HTTP handlers, DTOs, router, and middleware.

pub mod csrf;
pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod sso;

pub use csrf::{CsrfState, CsrfToken, csrf_protect};
pub use handlers::AuthAppState;
pub use middleware::{CurrentUser, IdentityState, current_identity, identify};
pub use router::{auth_router, auth_router_generic, sso_router};
pub use sso::{SsoCallback, SsoState};
