//! Application Layer
//!
//! Credential handlers and authentication strategies.

pub mod authenticator;
pub mod config;
pub mod hijacker;
pub mod password;
pub mod password_reset;
pub mod session;
pub mod sso;

// Re-exports
pub use authenticator::{Authenticator, TokenAuthenticator, Union};
pub use config::AuthConfig;
pub use hijacker::{Hijacker, NoHijacker};
pub use password::{PasswordHandler, Registration};
pub use password_reset::PasswordResetHandler;
pub use session::SessionAuthenticator;
pub use sso::{CallbackParams, ProviderInfo, ProviderState, SsoHandler};
