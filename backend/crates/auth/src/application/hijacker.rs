//! Extension Hook
//!
//! A [`Hijacker`] runs inside the registration or login transaction, right
//! after the user row is created or found. It can write rows of its own
//! (profiles, default settings) or load data to return alongside the
//! identity; returning an error rolls the whole operation back.
//!
//! The transaction is handed over as the store's own transaction type, so a
//! Postgres hook can reach the connection while the handler stays generic.

use std::future::Future;

use crate::domain::value_object::UserId;
use crate::error::AuthResult;

pub trait Hijacker<Tx>: Send + Sync + 'static {
    type Payload: Send + 'static;

    fn hijack_user_registration(
        &self,
        user_id: &UserId,
        tx: &mut Tx,
    ) -> impl Future<Output = AuthResult<Self::Payload>> + Send;

    fn hijack_user_login(
        &self,
        user_id: &UserId,
        tx: &mut Tx,
    ) -> impl Future<Output = AuthResult<Self::Payload>> + Send;
}

/// Default hook: does nothing and attaches no payload
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHijacker;

impl<Tx: Send> Hijacker<Tx> for NoHijacker {
    type Payload = ();

    async fn hijack_user_registration(&self, _user_id: &UserId, _tx: &mut Tx) -> AuthResult<()> {
        Ok(())
    }

    async fn hijack_user_login(&self, _user_id: &UserId, _tx: &mut Tx) -> AuthResult<()> {
        Ok(())
    }
}
