//! Authorization ports: verification capabilities and the session store

use async_trait::async_trait;

use crate::domain::result::Result;
use crate::domain::{AuthorizationSession, PasscodeVerification};

/// Remote passcode verification service
#[async_trait]
pub trait PasscodeVerifier: Send + Sync {
    async fn verify_passcode(&self, passcode: &str) -> Result<PasscodeVerification>;
}

/// Platform biometric capability
#[async_trait]
pub trait BiometricAuthorizer: Send + Sync {
    fn is_supported(&self) -> bool;

    /// Resolves when the user passed the biometric check
    async fn authenticate(&self, reason: &str) -> Result<()>;
}

/// Holder of the current step-up authorization
///
/// Read-mostly shared state; sessions are replaced or deleted, never
/// mutated in place.
pub trait AuthStore: Send + Sync {
    fn session(&self) -> Result<Option<AuthorizationSession>>;

    fn store_session(&self, session: AuthorizationSession) -> Result<()>;

    /// Delete the stored session (expiry, logout or server rejection)
    fn invalidate(&self) -> Result<()>;

    /// The currently authenticated account, if any
    fn current_account_id(&self) -> Option<String>;
}
