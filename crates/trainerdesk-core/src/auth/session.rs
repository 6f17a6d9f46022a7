use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Access tokens issued by the identity provider live for an hour.
const TOKEN_EXPIRY_MINUTES: i64 = 60;

/// Buffer time before expiry to trigger a token refresh (5 minutes)
const TOKEN_REFRESH_BUFFER_MINUTES: i64 = 5;

/// An authenticated identity as handed over by the session provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

impl SessionData {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            token: token.into(),
            created_at: Utc::now(),
        }
    }

    pub fn is_expired(&self) -> bool {
        let expiry = self.created_at + Duration::minutes(TOKEN_EXPIRY_MINUTES);
        Utc::now() > expiry
    }

    /// Check if the session will expire soon and should be refreshed
    pub fn needs_refresh(&self) -> bool {
        let refresh_at = self.created_at
            + Duration::minutes(TOKEN_EXPIRY_MINUTES - TOKEN_REFRESH_BUFFER_MINUTES);
        Utc::now() > refresh_at
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        let expiry = self.created_at + Duration::minutes(TOKEN_EXPIRY_MINUTES);
        (expiry - Utc::now()).num_minutes().max(0)
    }

    /// True when `other` is the same identity, regardless of token rotation
    pub fn same_identity(&self, other: &SessionData) -> bool {
        self.user_id == other.user_id
    }
}

/// Upstream events from the session/identity provider.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The provider is still restoring or establishing a session
    Resolving,
    /// An identity is available
    Ready(SessionData),
    /// No identity; tear down everything scoped to the previous one
    SignedOut,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_session_is_not_expired() {
        let session = SessionData::new("u1", "tok");
        assert!(!session.is_expired());
        assert!(!session.needs_refresh());
        assert!(session.minutes_until_expiry() >= 59);
    }

    #[test]
    fn test_old_session_is_expired() {
        let mut session = SessionData::new("u1", "tok");
        session.created_at = Utc::now() - Duration::minutes(61);
        assert!(session.is_expired());
        assert_eq!(session.minutes_until_expiry(), 0);

        session.created_at = Utc::now() - Duration::minutes(56);
        assert!(!session.is_expired());
        assert!(session.needs_refresh());
    }

    #[test]
    fn test_same_identity_ignores_token() {
        let a = SessionData::new("u1", "tok-a");
        let b = SessionData::new("u1", "tok-b");
        let c = SessionData::new("u2", "tok-a");
        assert!(a.same_identity(&b));
        assert!(!a.same_identity(&c));
    }
}
