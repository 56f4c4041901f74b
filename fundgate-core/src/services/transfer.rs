//! Transfer service - single entry point for front ends
//!
//! Decides per request whether step-up authorization is needed. Funding from
//! the user's own wallet and trade redirects go straight to the dispatcher;
//! everything that moves funds out goes through the authorization gate.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::domain::result::Result;
use crate::domain::{FundingSession, SubmissionOutcome, TransferFlow, WithdrawalRequest};
use crate::services::dispatcher::WithdrawalDispatcher;
use crate::services::gate::{ActionFuture, AuthorizationGate, GateOutcome, GateSnapshot, PendingAction};
use crate::services::poller::{FundingListener, FundingPoller};

/// Outcome of a transfer submission
pub type TransferOutcome = GateOutcome<SubmissionOutcome>;

pub struct TransferService {
    dispatcher: Arc<WithdrawalDispatcher>,
    poller: Arc<FundingPoller>,
    gate: AuthorizationGate<SubmissionOutcome>,
}

impl TransferService {
    pub fn new(
        dispatcher: Arc<WithdrawalDispatcher>,
        poller: Arc<FundingPoller>,
        gate: AuthorizationGate<SubmissionOutcome>,
    ) -> Self {
        Self {
            dispatcher,
            poller,
            gate,
        }
    }

    /// Submit a fund or withdraw request
    ///
    /// Returns [`GateOutcome::ChallengeRequired`] when the user has to
    /// authorize first; the request then runs from `verify_passcode` or
    /// `authorize_biometric`.
    pub async fn submit(
        &self,
        request: WithdrawalRequest,
        flow: TransferFlow,
        listener: Option<FundingListener>,
    ) -> Result<TransferOutcome> {
        if !request.requires_authorization(flow) {
            debug!(method = %request.method, "no step-up authorization needed");
            let outcome = self.dispatcher.submit(&request, flow, listener).await?;
            return Ok(GateOutcome::Completed(outcome));
        }

        let dispatcher = Arc::clone(&self.dispatcher);
        let request = Arc::new(request);
        let action: PendingAction<SubmissionOutcome> = Arc::new(move || {
            let dispatcher = Arc::clone(&dispatcher);
            let request = Arc::clone(&request);
            let listener = listener.clone();
            let fut: ActionFuture<SubmissionOutcome> =
                Box::pin(async move { dispatcher.submit(&request, flow, listener).await });
            fut
        });
        self.gate.submit(action).await
    }

    pub async fn verify_passcode(&self, passcode: &str) -> Result<TransferOutcome> {
        self.gate.authorize_with_passcode(passcode).await
    }

    pub async fn authorize_biometric(&self) -> Result<TransferOutcome> {
        self.gate.authorize_biometric().await
    }

    pub fn cancel(&self) {
        self.gate.cancel();
    }

    /// Keypad access for front ends that render their own passcode pad
    pub fn gate(&self) -> &AuthorizationGate<SubmissionOutcome> {
        &self.gate
    }

    pub fn gate_snapshot(&self) -> GateSnapshot {
        self.gate.snapshot()
    }

    pub fn funding_session(&self) -> FundingSession {
        self.poller.session()
    }

    pub fn subscribe_funding(&self) -> watch::Receiver<FundingSession> {
        self.poller.subscribe()
    }

    pub async fn wait_for_funding(&self) -> FundingSession {
        self.poller.wait_until_settled().await
    }

    pub fn reset_funding(&self) {
        self.poller.reset();
    }

    pub fn app_foregrounded(&self) {
        self.poller.app_foregrounded();
    }
}
