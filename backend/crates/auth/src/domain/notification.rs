//! Notification Seam
//!
//! Outbound messages to users. Delivery is the caller's concern; handlers
//! send after commit and report failures without undoing the commit.

use crate::domain::value_object::Email;
use crate::error::AuthResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePayload {
    PasswordResetRequested { token: String },
    PasswordResetSucceeded,
}

impl MessagePayload {
    pub fn kind(&self) -> &'static str {
        match self {
            MessagePayload::PasswordResetRequested { .. } => "password_reset_requested",
            MessagePayload::PasswordResetSucceeded => "password_reset_succeeded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub email: Email,
    pub payload: MessagePayload,
}

#[trait_variant::make(Sender: Send)]
pub trait LocalSender {
    async fn send(&self, message: Message) -> AuthResult<()>;
}
