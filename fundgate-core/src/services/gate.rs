//! Authorization gate - step-up authorization in front of fund-moving actions
//!
//! States: `idle -> awaiting_authorization -> authorizing -> idle`.
//!
//! A submission with a reusable session runs right away. Otherwise it is
//! parked as the single pending action until the user proves presence with
//! a passcode or biometric check. If the action then comes back with an
//! "authorization expired" error, the same action is parked again and the
//! challenge reopens; any other error ends the attempt.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::result::{Error, Result};
use crate::domain::{Challenge, GateState};
use crate::ports::{BiometricAuthorizer, PasscodeVerifier};
use crate::services::session_guard::SessionGuard;

/// Shown when a stale session was rejected by the server
pub const EXPIRED_MESSAGE: &str = "Your authorization expired. Please verify again.";

/// Shown after a passcode the service did not accept
pub const INVALID_PASSCODE_MESSAGE: &str = "Invalid passcode. Please try again.";

/// Default passcode length for the keypad buffer
pub const PASSCODE_LENGTH: usize = 6;

/// Future returned by a pending action
pub type ActionFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// A deferred submission; re-invocable so an expired session can replay it
pub type PendingAction<T> = Arc<dyn Fn() -> ActionFuture<T> + Send + Sync>;

/// What the UI should show after a gate call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateSnapshot {
    pub state: GateState,
    pub challenge: Option<Challenge>,
    pub message: Option<String>,
    pub has_pending_action: bool,
    pub entered_digits: usize,
}

/// Result of a gate call that did not fail
#[derive(Debug)]
pub enum GateOutcome<T> {
    /// The action ran and succeeded
    Completed(T),
    /// The user has to authorize first; the action is pending
    ChallengeRequired(GateSnapshot),
}

struct GateInner<T> {
    state: GateState,
    pending: Option<PendingAction<T>>,
    challenge: Option<Challenge>,
    message: Option<String>,
    input: String,
}

/// Authorization gate
pub struct AuthorizationGate<T> {
    guard: SessionGuard,
    passcode: Arc<dyn PasscodeVerifier>,
    biometric: Option<Arc<dyn BiometricAuthorizer>>,
    prefer_biometric: bool,
    inner: Mutex<GateInner<T>>,
}

impl<T: Send + 'static> AuthorizationGate<T> {
    pub fn new(
        guard: SessionGuard,
        passcode: Arc<dyn PasscodeVerifier>,
        biometric: Option<Arc<dyn BiometricAuthorizer>>,
        prefer_biometric: bool,
    ) -> Self {
        Self {
            guard,
            passcode,
            biometric,
            prefer_biometric,
            inner: Mutex::new(GateInner {
                state: GateState::Idle,
                pending: None,
                challenge: None,
                message: None,
                input: String::new(),
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, GateInner<T>>> {
        self.inner
            .lock()
            .map_err(|e| Error::Other(format!("Lock poisoned: {}", e)))
    }

    fn preferred_challenge(&self) -> Challenge {
        let biometric_ready = self
            .biometric
            .as_ref()
            .is_some_and(|b| b.is_supported());
        if self.prefer_biometric && biometric_ready {
            Challenge::Biometric
        } else {
            Challenge::Passcode
        }
    }

    fn snapshot_of(inner: &GateInner<T>) -> GateSnapshot {
        GateSnapshot {
            state: inner.state,
            challenge: inner.challenge,
            message: inner.message.clone(),
            has_pending_action: inner.pending.is_some(),
            entered_digits: inner.input.len(),
        }
    }

    /// Current state for rendering
    pub fn snapshot(&self) -> GateSnapshot {
        match self.lock() {
            Ok(inner) => Self::snapshot_of(&inner),
            Err(_) => GateSnapshot {
                state: GateState::Idle,
                challenge: None,
                message: None,
                has_pending_action: false,
                entered_digits: 0,
            },
        }
    }

    pub fn state(&self) -> GateState {
        self.snapshot().state
    }

    /// Run `action` now if the session allows it, otherwise park it
    ///
    /// Fails with [`Error::Busy`] while another action is pending or running.
    pub async fn submit(&self, action: PendingAction<T>) -> Result<GateOutcome<T>> {
        let reuse = {
            let mut inner = self.lock()?;
            if inner.state != GateState::Idle {
                return Err(Error::Busy);
            }
            inner.message = None;
            if self.guard.is_valid() {
                inner.state = GateState::Authorizing;
                true
            } else {
                inner.state = GateState::AwaitingAuthorization;
                inner.pending = Some(Arc::clone(&action));
                inner.challenge = Some(self.preferred_challenge());
                inner.input.clear();
                false
            }
        };

        if !reuse {
            info!("step-up authorization required");
            return Ok(GateOutcome::ChallengeRequired(self.snapshot()));
        }

        debug!("reusing step-up authorization");
        let result = action().await;
        self.settle(action, result)
    }

    /// Append a keypad digit to the passcode input
    pub fn input_digit(&self, digit: char) -> Result<usize> {
        if !digit.is_ascii_digit() {
            return Err(Error::validation("Passcode digits only"));
        }
        let mut inner = self.lock()?;
        if inner.state != GateState::AwaitingAuthorization {
            return Err(Error::validation("No action is awaiting authorization"));
        }
        if inner.input.len() < PASSCODE_LENGTH {
            inner.input.push(digit);
        }
        Ok(inner.input.len())
    }

    pub fn backspace(&self) -> Result<usize> {
        let mut inner = self.lock()?;
        inner.input.pop();
        Ok(inner.input.len())
    }

    pub fn clear_input(&self) -> Result<()> {
        self.lock()?.input.clear();
        Ok(())
    }

    /// Replace the input with a whole passcode and verify it
    pub async fn authorize_with_passcode(&self, passcode: &str) -> Result<GateOutcome<T>> {
        {
            let mut inner = self.lock()?;
            if inner.state != GateState::AwaitingAuthorization {
                return Err(Error::validation("No action is awaiting authorization"));
            }
            inner.input = passcode.chars().filter(|c| c.is_ascii_digit()).collect();
        }
        self.verify_passcode().await
    }

    /// Verify the entered passcode and, if accepted, run the pending action
    ///
    /// The gate is `Authorizing` from the moment the code is sent until the
    /// action settles, so a second proof or submission is refused meanwhile.
    pub async fn verify_passcode(&self) -> Result<GateOutcome<T>> {
        let (code, action) = {
            let mut inner = self.lock()?;
            if inner.state != GateState::AwaitingAuthorization {
                return Err(Error::validation("No action is awaiting authorization"));
            }
            if inner.input.is_empty() {
                return Err(Error::validation("Enter your passcode"));
            }
            let action = Self::begin_authorizing(&mut inner)?;
            inner.challenge = Some(Challenge::Passcode);
            (inner.input.clone(), action)
        };

        let verification = match self.passcode.verify_passcode(&code).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "passcode verification unavailable");
                self.reopen(Challenge::Passcode, &e.to_string())?;
                return Err(e);
            }
        };

        if !verification.verified {
            info!("passcode rejected");
            self.reopen(Challenge::Passcode, INVALID_PASSCODE_MESSAGE)?;
            return Err(Error::InvalidPasscode);
        }

        self.run_authorized(action, verification.token).await
    }

    /// Ask the platform for a biometric check and, if it passes, run the pending action
    pub async fn authorize_biometric(&self) -> Result<GateOutcome<T>> {
        let action = {
            let mut inner = self.lock()?;
            Self::begin_authorizing(&mut inner)?
        };

        let Some(biometric) = self.biometric.as_ref().filter(|b| b.is_supported()) else {
            self.reopen(
                Challenge::Passcode,
                "Biometrics unavailable. Enter your passcode.",
            )?;
            return Err(Error::BiometricUnavailable("not supported".to_string()));
        };

        if let Err(e) = biometric.authenticate("Authorize this transfer").await {
            info!(error = %e, "biometric check failed; falling back to passcode");
            self.reopen(
                Challenge::Passcode,
                "Biometric check failed. Enter your passcode.",
            )?;
            return Err(e);
        }

        self.run_authorized(action, None).await
    }

    /// Drop the pending action and go back to idle
    ///
    /// Has no effect while a proof is being checked or the action is running.
    pub fn cancel(&self) {
        if let Ok(mut inner) = self.lock() {
            if inner.state == GateState::Authorizing {
                debug!("cancel ignored while authorizing");
                return;
            }
            inner.state = GateState::Idle;
            inner.pending = None;
            inner.challenge = None;
            inner.message = None;
            inner.input.clear();
        }
    }

    /// `awaiting_authorization -> authorizing`; the action stays parked until it settles
    fn begin_authorizing(inner: &mut GateInner<T>) -> Result<PendingAction<T>> {
        if inner.state != GateState::AwaitingAuthorization {
            return Err(Error::validation("No action is awaiting authorization"));
        }
        let Some(action) = inner.pending.clone() else {
            return Err(Error::validation("No action is awaiting authorization"));
        };
        inner.state = GateState::Authorizing;
        Ok(action)
    }

    /// Back to `awaiting_authorization` after a failed proof
    fn reopen(&self, challenge: Challenge, message: &str) -> Result<()> {
        let mut inner = self.lock()?;
        inner.state = GateState::AwaitingAuthorization;
        inner.challenge = Some(challenge);
        inner.message = Some(message.to_string());
        inner.input.clear();
        Ok(())
    }

    async fn run_authorized(
        &self,
        action: PendingAction<T>,
        token: Option<String>,
    ) -> Result<GateOutcome<T>> {
        {
            let mut inner = self.lock()?;
            inner.input.clear();
            inner.message = None;
        }

        if let Err(e) = self.guard.grant(token) {
            warn!(error = %e, "could not store authorization session");
        }

        let result = action().await;
        self.settle(action, result)
    }

    /// Apply the action's result to the state machine
    ///
    /// Only the action that ran is removed from the pending slot.
    fn settle(&self, action: PendingAction<T>, result: Result<T>) -> Result<GateOutcome<T>> {
        let mut inner = self.lock()?;
        let ran_parked = inner
            .pending
            .as_ref()
            .is_some_and(|parked| Arc::ptr_eq(parked, &action));
        match result {
            Ok(value) => {
                inner.state = GateState::Idle;
                if ran_parked {
                    inner.pending = None;
                }
                inner.challenge = None;
                Ok(GateOutcome::Completed(value))
            }
            Err(e) if e.is_authorization_expired() => {
                info!("authorization rejected by server; re-prompting");
                if let Err(revoke_err) = self.guard.revoke() {
                    warn!(error = %revoke_err, "could not clear stale session");
                }
                inner.state = GateState::AwaitingAuthorization;
                inner.pending = Some(action);
                inner.challenge = Some(self.preferred_challenge());
                inner.message = Some(EXPIRED_MESSAGE.to_string());
                inner.input.clear();
                Ok(GateOutcome::ChallengeRequired(Self::snapshot_of(&inner)))
            }
            Err(e) => {
                inner.state = GateState::Idle;
                if ran_parked {
                    inner.pending = None;
                }
                inner.challenge = None;
                inner.message = Some(e.to_string());
                Err(e)
            }
        }
    }
}
