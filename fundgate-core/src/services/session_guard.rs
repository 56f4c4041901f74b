//! Authorization session guard - decides whether a step-up authorization can be reused

use std::sync::Arc;

use crate::domain::result::Result;
use crate::domain::AuthorizationSession;
use crate::ports::{AuthStore, Clock};

/// Why a stored session cannot be reused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionInvalidity {
    Missing,
    Expired,
    NotAuthenticated,
    WrongAccount,
}

/// Checks the auth store for a reusable session
#[derive(Clone)]
pub struct SessionGuard {
    store: Arc<dyn AuthStore>,
    clock: Arc<dyn Clock>,
    ttl_ms: i64,
}

impl SessionGuard {
    pub fn new(store: Arc<dyn AuthStore>, clock: Arc<dyn Clock>, ttl_ms: i64) -> Self {
        Self { store, clock, ttl_ms }
    }

    /// The stored session if it can be reused right now
    pub fn valid_session(&self) -> Result<std::result::Result<AuthorizationSession, SessionInvalidity>> {
        let Some(session) = self.store.session()? else {
            return Ok(Err(SessionInvalidity::Missing));
        };
        let Some(account_id) = self.store.current_account_id() else {
            return Ok(Err(SessionInvalidity::NotAuthenticated));
        };
        if session.bound_account_id != account_id {
            return Ok(Err(SessionInvalidity::WrongAccount));
        }
        if session.is_expired(self.clock.now_epoch_ms()) {
            return Ok(Err(SessionInvalidity::Expired));
        }
        Ok(Ok(session))
    }

    /// Whether a pending action may skip the challenge
    ///
    /// A store read failure counts as "not valid" so the user is prompted.
    pub fn is_valid(&self) -> bool {
        matches!(self.valid_session(), Ok(Ok(_)))
    }

    /// Create and store a fresh session after a successful proof
    pub fn grant(&self, token: Option<String>) -> Result<Option<AuthorizationSession>> {
        let Some(account_id) = self.store.current_account_id() else {
            return Ok(None);
        };
        let token = token.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let session = AuthorizationSession::new(token, self.clock.now_epoch_ms() + self.ttl_ms, account_id);
        self.store.store_session(session.clone())?;
        Ok(Some(session))
    }

    /// Drop the stored session after the server rejected it
    pub fn revoke(&self) -> Result<()> {
        self.store.invalidate()
    }
}
