//! Password Reset Token Entity
//!
//! One live token per user; consumption flips `is_used` exactly once.

use chrono::{DateTime, Duration, Utc};

use crate::domain::value_object::{PasswordResetTokenId, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordResetToken {
    pub id: PasswordResetTokenId,
    pub user_id: UserId,
    /// High-entropy secret sent to the user
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    pub fn new(user_id: UserId, token: String, ttl: Duration) -> Self {
        let now = Utc::now();

        Self {
            id: PasswordResetTokenId::new(),
            user_id,
            token,
            expires_at: now + ttl,
            is_used: false,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
