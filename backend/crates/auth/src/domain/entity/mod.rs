//! Entity Module

pub mod identity;
pub mod password_credential;
pub mod password_reset_token;
pub mod session;
pub mod user;

pub use identity::Identity;
pub use password_credential::{PASSWORD_CREDENTIAL_NAME, PasswordCredential, UserWithCredential};
pub use password_reset_token::PasswordResetToken;
pub use session::Session;
pub use user::User;
