//! Domain Layer
//!
//! Entities, value objects, and the storage, notification and identity
//! provider traits the application layer is written against.

pub mod entity;
pub mod notification;
pub mod repository;
pub mod sso;
pub mod value_object;

// Re-exports
pub use entity::{Identity, PasswordCredential, PasswordResetToken, Session, User};
pub use notification::{Message, MessagePayload, Sender};
pub use repository::{CredentialStore, CredentialTx, TokenStorage};
pub use sso::{OAuthToken, ProviderError, SsoProvider, SsoUserInfo};
