//! Shared Kernel
//!
//! Vocabulary shared by every backend crate:
//! - [`error::app_error::AppError`] and [`error::kind::ErrorKind`], rendered as
//!   RFC 7807 problem documents at the HTTP edge
//! - [`id::Id`], a typed, time-ordered identifier
//!
//! Only things whose meaning is stable across domains belong here.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;
