//! User Entity
//!
//! Credential identity. Created once at registration; this crate never
//! deletes users.

use chrono::{DateTime, Utc};

use crate::domain::value_object::{Email, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: UserId,
    /// Unique, compared exactly as stored
    pub email: Email,
    pub is_email_verified: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: Email, first_name: Option<String>, last_name: Option<String>) -> Self {
        let now = Utc::now();

        Self {
            user_id: UserId::new(),
            email,
            is_email_verified: false,
            first_name: non_blank(first_name),
            last_name: non_blank(last_name),
            created_at: now,
            updated_at: now,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
