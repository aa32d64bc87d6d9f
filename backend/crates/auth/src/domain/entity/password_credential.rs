//! Password Credential Entity

use crate::domain::entity::user::User;
use crate::domain::value_object::{Email, UserId};

/// Credential name stored alongside password credentials
pub const PASSWORD_CREDENTIAL_NAME: &str = "password";

/// A user's password credential; at most one per user.
///
/// `secret` is always output of the configured hasher, never plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordCredential {
    pub user_id: UserId,
    /// Login key, the user's email
    pub key: Email,
    pub secret: String,
}

impl PasswordCredential {
    pub fn new(user_id: UserId, key: Email, secret: String) -> Self {
        Self {
            user_id,
            key,
            secret,
        }
    }
}

/// User joined with their password hash, if they have one
#[derive(Debug, Clone)]
pub struct UserWithCredential {
    pub user: User,
    pub password_hash: Option<String>,
}

impl UserWithCredential {
    /// Hash usable for login; an empty stored hash counts as absent.
    pub fn usable_password_hash(&self) -> Option<&str> {
        self.password_hash.as_deref().filter(|hash| !hash.is_empty())
    }
}
