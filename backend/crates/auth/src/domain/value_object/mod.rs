//! Value Object Module

pub mod email;
pub mod session_id;
pub mod user_id;

pub use email::Email;
pub use session_id::{PasswordResetTokenId, SessionId};
pub use user_id::UserId;
