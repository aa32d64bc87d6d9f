//! Infrastructure Layer
//!
//! Credential stores and the notification sender.

pub mod memory;
pub mod postgres;
pub mod sender;

pub use memory::MemoryCredentialStore;
pub use postgres::{PgCredentialStore, PgCredentialTx};
pub use sender::TracingSender;
