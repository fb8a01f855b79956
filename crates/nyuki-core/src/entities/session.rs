use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::identity::AuthIdentity;

/// An authenticated session as issued by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Session {
    /// Opaque bearer token; the only piece persisted across restarts.
    pub token: String,
    pub user_id: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Convert to a lightweight `AuthIdentity` for cross-crate passing.
    #[must_use]
    pub fn to_identity(&self) -> AuthIdentity {
        AuthIdentity {
            user_id: self.user_id.clone(),
            email: self.email.clone(),
        }
    }

    /// Check if the session is expired or expires within `buffer_secs`.
    #[must_use]
    pub fn is_near_expiry(&self, buffer_secs: i64) -> bool {
        let threshold = Utc::now() + chrono::TimeDelta::seconds(buffer_secs);
        self.expires_at <= threshold
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_near_expiry(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_session(expires_at: DateTime<Utc>) -> Session {
        Session {
            token: "test.jwt.token".into(),
            user_id: "usr-test1234".into(),
            email: "bee@example.com".into(),
            expires_at,
        }
    }

    #[test]
    fn to_identity_maps_fields() {
        let identity = make_session(Utc::now()).to_identity();
        assert_eq!(identity.user_id, "usr-test1234");
        assert_eq!(identity.email, "bee@example.com");
    }

    #[test]
    fn is_near_expiry_false_when_far_future() {
        let session = make_session(Utc::now() + chrono::TimeDelta::hours(1));
        assert!(!session.is_near_expiry(60));
        assert!(!session.is_expired());
    }

    #[test]
    fn is_near_expiry_true_within_buffer() {
        let session = make_session(Utc::now() + chrono::TimeDelta::seconds(30));
        assert!(session.is_near_expiry(60));
        assert!(!session.is_expired());
    }

    #[test]
    fn is_expired_when_past() {
        let session = make_session(Utc::now() - chrono::TimeDelta::seconds(1));
        assert!(session.is_expired());
    }
}
