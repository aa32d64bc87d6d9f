//! Tracing Sender
//!
//! Writes outbound messages to the log instead of delivering them. Reset
//! tokens are logged at debug level only.

use crate::domain::notification::{Message, MessagePayload, Sender};
use crate::error::AuthResult;

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSender;

impl Sender for TracingSender {
    async fn send(&self, message: Message) -> AuthResult<()> {
        let kind = message.payload.kind();

        match &message.payload {
            MessagePayload::PasswordResetRequested { token } => {
                tracing::info!(email = %message.email, kind, "Outbound message");
                tracing::debug!(email = %message.email, token = %token, "Password reset token");
            }
            MessagePayload::PasswordResetSucceeded => {
                tracing::info!(email = %message.email, kind, "Outbound message");
            }
        }

        Ok(())
    }
}
