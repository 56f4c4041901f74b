//! Step-up authorization domain model

use serde::{Deserialize, Serialize};

/// A previously granted step-up authorization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationSession {
    pub token: String,
    pub expires_at_epoch_ms: i64,
    pub bound_account_id: String,
}

impl AuthorizationSession {
    pub fn new(token: impl Into<String>, expires_at_epoch_ms: i64, bound_account_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at_epoch_ms,
            bound_account_id: bound_account_id.into(),
        }
    }

    pub fn is_expired(&self, now_epoch_ms: i64) -> bool {
        now_epoch_ms >= self.expires_at_epoch_ms
    }

    pub fn remaining_ms(&self, now_epoch_ms: i64) -> i64 {
        (self.expires_at_epoch_ms - now_epoch_ms).max(0)
    }
}

/// Where the authorization gate currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    #[default]
    Idle,
    AwaitingAuthorization,
    Authorizing,
}

/// Proof the user is asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Challenge {
    Passcode,
    Biometric,
}

/// Response of the passcode verification service
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PasscodeVerification {
    pub verified: bool,
    /// Session token issued by the service, if it issues one
    #[serde(default)]
    pub token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_boundary() {
        let session = AuthorizationSession::new("t", 1_000, "acct");
        assert!(!session.is_expired(999));
        assert!(session.is_expired(1_000));
        assert_eq!(session.remaining_ms(400), 600);
        assert_eq!(session.remaining_ms(5_000), 0);
    }
}
