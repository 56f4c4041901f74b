//! Result and error types for the core library

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a wallet hand-off never reached the external wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandOffErrorKind {
    WalletNotInstalled,
    UserCancelled,
    Failed,
}

impl std::fmt::Display for HandOffErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HandOffErrorKind::WalletNotInstalled => "wallet not installed",
            HandOffErrorKind::UserCancelled => "cancelled by user",
            HandOffErrorKind::Failed => "hand-off failed",
        };
        f.write_str(s)
    }
}

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Wallet hand-off error ({kind}): {message}")]
    HandOff {
        kind: HandOffErrorKind,
        message: String,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authorization expired: {0}")]
    AuthorizationExpired(String),

    #[error("Invalid passcode")]
    InvalidPasscode,

    #[error("Biometric authorization unavailable: {0}")]
    BiometricUnavailable(String),

    #[error("Another submission is already awaiting authorization")]
    Busy,

    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Markers a remote service uses to reject a stale step-up authorization
fn expiry_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(
            r"(?i)((authori[sz]ation|session|passcode)[\s_-]*(has[\s_-]+)?(expired|invalid))|unauthori[sz]ed",
        )
        .expect("static regex")
    })
}

impl Error {
    /// Create a hand-off error
    pub fn hand_off(kind: HandOffErrorKind, msg: impl Into<String>) -> Self {
        Self::HandOff {
            kind,
            message: msg.into(),
        }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a remote error
    pub fn remote(status: u16, msg: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: msg.into(),
        }
    }

    /// Whether this error means the step-up authorization is no longer accepted
    ///
    /// Remote services report this either with a 401 status or with a
    /// message carrying an expiry marker, so both are checked. A bare "401"
    /// inside a message is not a marker.
    pub fn is_authorization_expired(&self) -> bool {
        match self {
            Error::AuthorizationExpired(_) => true,
            Error::Remote { status: 401, .. } => true,
            Error::Remote { message, .. } | Error::Other(message) => {
                expiry_marker().is_match(message)
            }
            _ => false,
        }
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Operation result with optional context (for JSON output)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub context: Option<HashMap<String, serde_json::Value>>,
}

impl<T> OperationResult<T> {
    /// Create a successful result
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            context: None,
        }
    }

    /// Create a failed result
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            context: None,
        }
    }

    /// Create a failed result with context
    pub fn fail_with_context(
        error: impl Into<String>,
        context: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            context: Some(context),
        }
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::fail(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expired_variant_is_classified() {
        assert!(Error::AuthorizationExpired("stale".into()).is_authorization_expired());
        assert!(Error::remote(401, "nope").is_authorization_expired());
    }

    #[test]
    fn test_expiry_markers_in_messages() {
        for msg in [
            "Authorization expired",
            "SESSION_EXPIRED",
            "passcode invalid, please retry",
            "Unauthorized",
            "authorization has expired",
        ] {
            assert!(
                Error::remote(400, msg).is_authorization_expired(),
                "expected marker in {:?}",
                msg
            );
        }
    }

    #[test]
    fn test_generic_errors_are_not_expiry() {
        assert!(!Error::remote(500, "Insufficient balance").is_authorization_expired());
        assert!(!Error::Network("connection reset".into()).is_authorization_expired());
        assert!(!Error::validation("Amount must be positive").is_authorization_expired());
        assert!(!Error::remote(400, "error 4012 in ledger").is_authorization_expired());
        assert!(!Error::remote(400, "order 401 rejected").is_authorization_expired());
        assert!(!Error::Other("upstream returned 401".into()).is_authorization_expired());
    }

    #[test]
    fn test_from_result() {
        let ok: Result<i32> = Ok(42);
        let result: OperationResult<i32> = ok.into();
        assert!(result.success);

        let err: Result<i32> = Err(Error::validation("bad input"));
        let result: OperationResult<i32> = err.into();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Validation error"));
    }
}
