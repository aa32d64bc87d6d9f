//! Session Entity
//!
//! Server-side record behind the session cookie.

use chrono::{DateTime, Duration, Utc};

use crate::domain::value_object::{SessionId, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
    /// Set when a newer session superseded this one
    pub evicted_by: Option<SessionId>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// TTL is provided by the application layer (config), not hard-coded here.
    pub fn new(user_id: UserId, ttl: Duration) -> Self {
        let now = Utc::now();

        Self {
            session_id: SessionId::new(),
            user_id,
            expires_at: now + ttl,
            evicted_by: None,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Exists, not expired and not evicted
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired(now) && self.evicted_by.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_valid() {
        let session = Session::new(UserId::new(), Duration::hours(12));
        assert!(session.is_valid(Utc::now()));
        assert!(!session.is_valid(Utc::now() + Duration::hours(13)));
    }

    #[test]
    fn test_evicted_session_is_invalid() {
        let mut session = Session::new(UserId::new(), Duration::hours(12));
        session.evicted_by = Some(SessionId::new());
        assert!(!session.is_expired(Utc::now()));
        assert!(!session.is_valid(Utc::now()));
    }
}
