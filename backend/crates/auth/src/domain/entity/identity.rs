//! Identity
//!
//! The authenticated principal: who the caller is, plus whatever the
//! authenticator or an extension hook attached.

use crate::domain::value_object::UserId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity<T> {
    pub user_id: UserId,
    pub payload: Option<T>,
}

impl<T> Identity<T> {
    pub fn new(user_id: UserId, payload: T) -> Self {
        Self {
            user_id,
            payload: Some(payload),
        }
    }
}
