//! Funding confirmation poller
//!
//! After a transfer is handed off to an external wallet, the poller watches
//! two independent signals until one of them confirms the deposit:
//!
//! - **signature match**: the activity feed lists the hand-off signature
//! - **balance delta**: the station balance rose by the requested amount
//!
//! Either one is enough, so indexing lag on the feed does not hold up a
//! confirmation the balance already shows (and vice versa). Checks run on a
//! fixed interval and whenever the app comes back to the foreground. Each
//! check runs as its own task; a generation number bumped by every
//! `start_funding`/`reset` lets late results be thrown away.

use std::sync::{Arc, Mutex, MutexGuard};

use rust_decimal::Decimal;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::{FundingSettings, MethodLimits};
use crate::domain::result::{Error, Result};
use crate::domain::withdrawal::{round_amount, validate_amount};
use crate::domain::{
    ConfirmationSignal, FundingEvent, FundingRequest, FundingSession, FundingStatus,
    HandoffReceipt, TransferMethod,
};
use crate::ports::{
    CacheInvalidator, CacheScope, Clock, LedgerQuery, WalletFundingParams, WalletHandoff,
};

/// Callback receiving funding notifications
pub type FundingListener = Arc<dyn Fn(FundingEvent) + Send + Sync>;

struct PollState {
    generation: u64,
    session: FundingSession,
    listener: Option<FundingListener>,
}

struct PollerInner {
    wallet: Arc<dyn WalletHandoff>,
    ledger: Arc<dyn LedgerQuery>,
    cache: Arc<dyn CacheInvalidator>,
    clock: Arc<dyn Clock>,
    settings: FundingSettings,
    limits: MethodLimits,
    state: Mutex<PollState>,
    session_tx: watch::Sender<FundingSession>,
    foreground: Notify,
    /// Poll loop of the current attempt, tagged with its generation
    task: Mutex<Option<(u64, JoinHandle<()>)>>,
}

/// Funding confirmation poller
pub struct FundingPoller {
    inner: Arc<PollerInner>,
}

impl FundingPoller {
    pub fn new(
        wallet: Arc<dyn WalletHandoff>,
        ledger: Arc<dyn LedgerQuery>,
        cache: Arc<dyn CacheInvalidator>,
        clock: Arc<dyn Clock>,
        settings: FundingSettings,
        limits: MethodLimits,
    ) -> Self {
        let (session_tx, _) = watch::channel(FundingSession::default());
        Self {
            inner: Arc::new(PollerInner {
                wallet,
                ledger,
                cache,
                clock,
                settings,
                limits,
                state: Mutex::new(PollState {
                    generation: 0,
                    session: FundingSession::default(),
                    listener: None,
                }),
                session_tx,
                foreground: Notify::new(),
                task: Mutex::new(None),
            }),
        }
    }

    /// Hand the transfer off to the wallet and start watching for it
    ///
    /// Returns once the hand-off is recorded; the outcome arrives through
    /// `listener` and [`subscribe`](Self::subscribe). A hand-off failure is
    /// returned directly and leaves the session idle.
    pub async fn start_funding(
        &self,
        request: FundingRequest,
        listener: Option<FundingListener>,
    ) -> Result<HandoffReceipt> {
        if request.recipient_address.trim().is_empty() {
            return Err(Error::validation("Missing deposit address"));
        }
        let amount = round_amount(request.amount_usd);
        validate_amount(
            amount,
            self.inner
                .limits
                .limit_for(TransferMethod::Wallet(request.method)),
        )?;

        // A new attempt replaces whatever was there before
        let generation = self.reset();

        let baseline = match self.inner.ledger.station_balance().await {
            Ok(balance) => Some(balance),
            Err(e) => {
                warn!(error = %e, "baseline balance unavailable; relying on signature match");
                None
            }
        };

        let params = WalletFundingParams {
            wallet: request.method,
            amount_usd: amount,
            recipient_owner_address: request.recipient_address.clone(),
        };
        let receipt = match self.inner.wallet.start_mobile_wallet_funding(&params).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(wallet = %request.method, error = %e, "wallet hand-off failed");
                return Err(e);
            }
        };

        {
            let mut state = self.inner.lock_state()?;
            if state.generation != generation {
                debug!("funding attempt superseded during hand-off");
                return Ok(receipt);
            }
            state.session = FundingSession::pending(
                self.inner.clock.now_epoch_ms(),
                baseline,
                receipt.signature.clone(),
                amount,
            );
            state.listener = listener.clone();
            self.inner.session_tx.send_replace(state.session.clone());
        }
        info!(wallet = %request.method, has_signature = receipt.signature.is_some(), "funding handed off");

        if let Some(listener) = listener {
            listener(FundingEvent::HandedOff {
                signature: receipt.signature.clone(),
            });
        }

        let handle = tokio::spawn(run_loop(Arc::clone(&self.inner), generation));
        if let Ok(mut task) = self.inner.task.lock() {
            if task.as_ref().is_some_and(|(g, _)| *g > generation) {
                handle.abort();
            } else if let Some((_, old)) = task.replace((generation, handle)) {
                old.abort();
            }
        }

        Ok(receipt)
    }

    /// Attach a signature the wallet reported after the hand-off returned
    pub fn record_signature(&self, signature: impl Into<String>) -> Result<bool> {
        let signature = signature.into();
        let mut state = self.inner.lock_state()?;
        if state.session.status != FundingStatus::Pending || !state.session.signature.is_empty() {
            return Ok(false);
        }
        state.session.signature = signature;
        self.inner.session_tx.send_replace(state.session.clone());
        Ok(true)
    }

    /// Re-check both signals right away (the app returned to the foreground)
    pub fn app_foregrounded(&self) {
        self.inner.foreground.notify_one();
    }

    /// Run one reconciliation inline and return the resulting status
    pub async fn check_now(&self) -> FundingStatus {
        let generation = match self.inner.lock_state() {
            Ok(state) => state.generation,
            Err(_) => return FundingStatus::Idle,
        };
        self.inner.reconcile(generation).await;
        self.session().status
    }

    /// Return to idle and stop polling; safe to call at any time
    ///
    /// Returns the new generation number.
    pub fn reset(&self) -> u64 {
        if let Ok(mut task) = self.inner.task.lock() {
            if let Some((_, handle)) = task.take() {
                handle.abort();
            }
        }
        match self.inner.lock_state() {
            Ok(mut state) => {
                state.generation += 1;
                state.listener = None;
                if state.session != FundingSession::default() {
                    state.session = FundingSession::default();
                    self.inner.session_tx.send_replace(state.session.clone());
                }
                state.generation
            }
            Err(_) => 0,
        }
    }

    /// Snapshot of the current session
    pub fn session(&self) -> FundingSession {
        self.inner.session_tx.borrow().clone()
    }

    /// Follow session changes
    pub fn subscribe(&self) -> watch::Receiver<FundingSession> {
        self.inner.session_tx.subscribe()
    }

    /// Wait until the current attempt confirms, times out or is reset
    pub async fn wait_until_settled(&self) -> FundingSession {
        let mut rx = self.subscribe();
        let settled = match rx
            .wait_for(|s| s.status != FundingStatus::Pending)
            .await
        {
            Ok(session) => session.clone(),
            Err(_) => self.session(),
        };
        settled
    }
}

impl Drop for FundingPoller {
    fn drop(&mut self) {
        if let Ok(mut task) = self.inner.task.lock() {
            if let Some((_, handle)) = task.take() {
                handle.abort();
            }
        }
    }
}

impl PollerInner {
    fn lock_state(&self) -> Result<MutexGuard<'_, PollState>> {
        self.state
            .lock()
            .map_err(|e| Error::Other(format!("Lock poisoned: {}", e)))
    }

    /// Abort the poll loop if it still belongs to `generation`
    fn stop_loop(&self, generation: u64) {
        if let Ok(mut task) = self.task.lock() {
            if task.as_ref().is_some_and(|(g, _)| *g == generation) {
                if let Some((_, handle)) = task.take() {
                    handle.abort();
                }
            }
        }
    }

    fn timeout_ms(&self) -> i64 {
        i64::try_from(self.settings.timeout_ms).unwrap_or(i64::MAX)
    }

    fn is_live(&self, generation: u64) -> bool {
        self.state
            .lock()
            .map(|s| s.generation == generation && s.session.status == FundingStatus::Pending)
            .unwrap_or(false)
    }

    /// Evaluate both signals once and apply the result if still relevant
    async fn reconcile(&self, generation: u64) {
        let snapshot = match self.state.lock() {
            Ok(state) if state.generation == generation
                && state.session.status == FundingStatus::Pending =>
            {
                state.session.clone()
            }
            _ => return,
        };

        let (signature_hit, balance_hit) = tokio::join!(
            self.signature_matches(&snapshot.signature),
            self.balance_matches(snapshot.baseline_balance, snapshot.amount_usd),
        );
        let now = self.clock.now_epoch_ms();

        let (event, listener) = {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            if state.generation != generation || state.session.status != FundingStatus::Pending {
                debug!("discarding stale funding check");
                return;
            }
            state.session.attempts += 1;

            let signal = if signature_hit {
                Some(ConfirmationSignal::SignatureMatch)
            } else if balance_hit {
                Some(ConfirmationSignal::BalanceDelta)
            } else {
                None
            };
            let elapsed = state.session.elapsed_ms(now).unwrap_or(0);

            let event = match signal {
                Some(signal) => {
                    state.session.status = FundingStatus::Confirmed;
                    state.session.confirmed_by = Some(signal);
                    FundingEvent::Confirmed { signal }
                }
                None if elapsed >= self.timeout_ms() => {
                    state.session.status = FundingStatus::TimedOut;
                    FundingEvent::TimedOut { elapsed_ms: elapsed }
                }
                None => {
                    self.session_tx.send_replace(state.session.clone());
                    return;
                }
            };
            self.session_tx.send_replace(state.session.clone());
            (event, state.listener.take())
        };

        self.stop_loop(generation);

        match &event {
            FundingEvent::Confirmed { signal } => {
                info!(?signal, "funding confirmed");
                for scope in CacheScope::BALANCE_VIEWS {
                    self.cache.invalidate(scope);
                }
            }
            FundingEvent::TimedOut { elapsed_ms } => {
                info!(elapsed_ms, "funding not confirmed before deadline");
            }
            FundingEvent::HandedOff { .. } => {}
        }

        if let Some(listener) = listener {
            listener(event);
        }
    }

    async fn signature_matches(&self, signature: &str) -> bool {
        if signature.is_empty() {
            return false;
        }
        match self
            .ledger
            .recent_deposits(0, self.settings.activity_page_size)
            .await
        {
            Ok(entries) => entries.iter().any(|e| e.matches_reference(signature)),
            Err(e) => {
                debug!(error = %e, "activity feed check failed; retrying next tick");
                false
            }
        }
    }

    async fn balance_matches(&self, baseline: Option<Decimal>, amount: Option<Decimal>) -> bool {
        let (Some(baseline), Some(amount)) = (baseline, amount) else {
            return false;
        };
        match self.ledger.station_balance().await {
            Ok(balance) => balance >= baseline + amount - self.settings.balance_epsilon,
            Err(e) => {
                debug!(error = %e, "balance check failed; retrying next tick");
                false
            }
        }
    }
}

async fn run_loop(inner: Arc<PollerInner>, generation: u64) {
    let mut ticker = tokio::time::interval(inner.settings.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the hand-off just happened
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = inner.foreground.notified() => {
                debug!("app foregrounded; re-checking funding");
            }
        }
        if !inner.is_live(generation) {
            break;
        }
        let tick_inner = Arc::clone(&inner);
        tokio::spawn(async move {
            tick_inner.reconcile(generation).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::demo::DemoBackend;
    use crate::adapters::memory::{ManualClock, RecordingInvalidator};
    use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

    use async_trait::async_trait;

    use crate::domain::result::HandOffErrorKind;
    use crate::domain::{ActivityEntry, WalletProvider};

    fn poller(backend: &Arc<DemoBackend>, clock: &Arc<ManualClock>) -> (FundingPoller, Arc<RecordingInvalidator>) {
        let cache = Arc::new(RecordingInvalidator::new());
        let poller = FundingPoller::new(
            backend.clone(),
            backend.clone(),
            cache.clone(),
            clock.clone(),
            FundingSettings::default(),
            MethodLimits {
                wallet: Some(Decimal::new(1000, 0)),
                ..Default::default()
            },
        );
        (poller, cache)
    }

    fn request(amount: Decimal) -> FundingRequest {
        FundingRequest::new(WalletProvider::Phantom, amount, "deposit-addr")
    }

    fn collecting_listener() -> (FundingListener, Arc<Mutex<Vec<FundingEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let listener: FundingListener = Arc::new(move |e| sink.lock().unwrap().push(e));
        (listener, events)
    }

    #[tokio::test]
    async fn test_signature_match_confirms_without_balance_change() {
        let backend = Arc::new(DemoBackend::manual(Decimal::new(10000, 2)));
        backend.set_next_signature(Some("SigABC".into()));
        let clock = Arc::new(ManualClock::new(0));
        let (poller, cache) = poller(&backend, &clock);

        poller.start_funding(request(Decimal::new(2500, 2)), None).await.unwrap();
        assert_eq!(poller.check_now().await, FundingStatus::Pending);

        backend.index_deposit(Decimal::new(2500, 2), Some("sigabc".into()));
        assert_eq!(poller.check_now().await, FundingStatus::Confirmed);
        assert_eq!(poller.session().confirmed_by, Some(ConfirmationSignal::SignatureMatch));
        assert_eq!(cache.scopes(), CacheScope::BALANCE_VIEWS.to_vec());
    }

    #[tokio::test]
    async fn test_balance_delta_respects_epsilon() {
        let backend = Arc::new(DemoBackend::manual(Decimal::new(10000, 2)));
        backend.set_next_signature(None);
        let clock = Arc::new(ManualClock::new(0));
        let (poller, _) = poller(&backend, &clock);

        poller.start_funding(request(Decimal::new(2500, 2)), None).await.unwrap();
        assert!(poller.session().signature.is_empty());

        backend.set_balance(Decimal::new(12498, 2));
        assert_eq!(poller.check_now().await, FundingStatus::Pending);

        backend.set_balance(Decimal::new(124995, 3));
        assert_eq!(poller.check_now().await, FundingStatus::Confirmed);
        assert_eq!(poller.session().confirmed_by, Some(ConfirmationSignal::BalanceDelta));
    }

    #[tokio::test]
    async fn test_timeout_not_before_deadline() {
        let backend = Arc::new(DemoBackend::manual(Decimal::ZERO));
        let clock = Arc::new(ManualClock::new(1_000));
        let (poller, _) = poller(&backend, &clock);
        let (listener, events) = collecting_listener();

        poller
            .start_funding(request(Decimal::new(10, 0)), Some(listener))
            .await
            .unwrap();

        clock.advance(89_999);
        assert_eq!(poller.check_now().await, FundingStatus::Pending);
        clock.advance(1);
        assert_eq!(poller.check_now().await, FundingStatus::TimedOut);

        let events = events.lock().unwrap().clone();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], FundingEvent::TimedOut { elapsed_ms: 90_000 });
    }

    #[tokio::test]
    async fn test_network_failures_are_swallowed_and_deadline_still_applies() {
        let backend = Arc::new(DemoBackend::manual(Decimal::ZERO));
        let clock = Arc::new(ManualClock::new(0));
        let (poller, _) = poller(&backend, &clock);

        poller.start_funding(request(Decimal::new(10, 0)), None).await.unwrap();
        backend.set_offline(true);
        assert_eq!(poller.check_now().await, FundingStatus::Pending);
        clock.advance(90_000);
        assert_eq!(poller.check_now().await, FundingStatus::TimedOut);
    }

    #[tokio::test]
    async fn test_terminal_state_is_final() {
        let backend = Arc::new(DemoBackend::manual(Decimal::ZERO));
        let clock = Arc::new(ManualClock::new(0));
        let (poller, cache) = poller(&backend, &clock);

        poller.start_funding(request(Decimal::new(10, 0)), None).await.unwrap();
        clock.advance(90_000);
        assert_eq!(poller.check_now().await, FundingStatus::TimedOut);

        backend.set_balance(Decimal::new(10, 0));
        assert_eq!(poller.check_now().await, FundingStatus::TimedOut);
        assert!(cache.scopes().is_empty());
    }

    #[tokio::test]
    async fn test_hand_off_failure_never_enters_pending() {
        let backend = Arc::new(DemoBackend::manual(Decimal::ZERO));
        backend.fail_next_handoff(HandOffErrorKind::WalletNotInstalled);
        let clock = Arc::new(ManualClock::new(0));
        let (poller, _) = poller(&backend, &clock);

        let err = poller
            .start_funding(request(Decimal::new(10, 0)), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::HandOff {
                kind: HandOffErrorKind::WalletNotInstalled,
                ..
            }
        ));
        assert_eq!(poller.session().status, FundingStatus::Idle);
    }

    #[tokio::test]
    async fn test_preconditions() {
        let backend = Arc::new(DemoBackend::manual(Decimal::ZERO));
        let clock = Arc::new(ManualClock::new(0));
        let (poller, _) = poller(&backend, &clock);

        assert!(matches!(
            poller.start_funding(request(Decimal::ZERO), None).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            poller.start_funding(request(Decimal::new(1001, 0)), None).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            poller
                .start_funding(FundingRequest::new(WalletProvider::Phantom, Decimal::ONE, " "), None)
                .await,
            Err(Error::Validation(_))
        ));
        assert_eq!(backend.handoff_count(), 0);
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let backend = Arc::new(DemoBackend::manual(Decimal::new(5, 0)));
        let clock = Arc::new(ManualClock::new(0));
        let (poller, _) = poller(&backend, &clock);

        poller.start_funding(request(Decimal::new(10, 0)), None).await.unwrap();
        assert_eq!(poller.session().status, FundingStatus::Pending);

        poller.reset();
        let first = poller.session();
        poller.reset();
        let second = poller.session();

        assert_eq!(first, second);
        assert_eq!(second.status, FundingStatus::Idle);
        assert!(second.signature.is_empty());
        assert!(second.baseline_balance.is_none());
        assert!(second.started_at_epoch_ms.is_none());
    }

    #[tokio::test]
    async fn test_check_after_reset_does_nothing() {
        let backend = Arc::new(DemoBackend::manual(Decimal::ZERO));
        let clock = Arc::new(ManualClock::new(0));
        let (poller, cache) = poller(&backend, &clock);

        poller.start_funding(request(Decimal::new(10, 0)), None).await.unwrap();
        poller.reset();
        backend.set_balance(Decimal::new(10, 0));
        assert_eq!(poller.check_now().await, FundingStatus::Idle);
        assert!(cache.scopes().is_empty());
    }

    #[tokio::test]
    async fn test_late_signature_is_recorded_once() {
        let backend = Arc::new(DemoBackend::manual(Decimal::ZERO));
        backend.set_next_signature(None);
        let clock = Arc::new(ManualClock::new(0));
        let (poller, _) = poller(&backend, &clock);

        poller.start_funding(request(Decimal::new(10, 0)), None).await.unwrap();
        assert!(poller.record_signature("late-sig").unwrap());
        assert!(!poller.record_signature("other").unwrap());
        assert_eq!(poller.session().signature, "late-sig");

        backend.index_deposit(Decimal::new(10, 0), Some("LATE-SIG".into()));
        assert_eq!(poller.check_now().await, FundingStatus::Confirmed);
    }

    /// Ledger whose next balance read can be held until released
    struct GatedLedger {
        balance: Mutex<Decimal>,
        hold_next: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    impl GatedLedger {
        fn new(balance: Decimal) -> Self {
            Self {
                balance: Mutex::new(balance),
                hold_next: AtomicBool::new(false),
                entered: Notify::new(),
                release: Notify::new(),
            }
        }

        fn set_balance(&self, balance: Decimal) {
            *self.balance.lock().unwrap() = balance;
        }
    }

    #[async_trait]
    impl LedgerQuery for GatedLedger {
        async fn recent_deposits(&self, _page: u32, _page_size: u32) -> Result<Vec<ActivityEntry>> {
            Ok(Vec::new())
        }

        async fn station_balance(&self) -> Result<Decimal> {
            if self.hold_next.swap(false, AtomicOrdering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            Ok(*self.balance.lock().unwrap())
        }
    }

    fn gated_poller(
        ledger: &Arc<GatedLedger>,
        clock: &Arc<ManualClock>,
    ) -> (Arc<FundingPoller>, Arc<RecordingInvalidator>) {
        let cache = Arc::new(RecordingInvalidator::new());
        let poller = FundingPoller::new(
            Arc::new(DemoBackend::manual(Decimal::ZERO)),
            ledger.clone(),
            cache.clone(),
            clock.clone(),
            // Keep the interval loop out of the way; checks are driven by hand
            FundingSettings {
                poll_interval_ms: 3_600_000,
                ..Default::default()
            },
            MethodLimits::default(),
        );
        (Arc::new(poller), cache)
    }

    #[tokio::test]
    async fn test_in_flight_check_after_reset_is_discarded() {
        let ledger = Arc::new(GatedLedger::new(Decimal::new(100, 0)));
        let clock = Arc::new(ManualClock::new(0));
        let (poller, cache) = gated_poller(&ledger, &clock);
        let (listener, events) = collecting_listener();

        poller
            .start_funding(request(Decimal::new(50, 0)), Some(listener))
            .await
            .unwrap();

        ledger.hold_next.store(true, AtomicOrdering::SeqCst);
        let in_flight = tokio::spawn({
            let poller = poller.clone();
            async move { poller.check_now().await }
        });
        ledger.entered.notified().await;

        poller.reset();
        ledger.set_balance(Decimal::new(150, 0));
        ledger.release.notify_one();

        assert_eq!(in_flight.await.unwrap(), FundingStatus::Idle);
        assert_eq!(poller.session(), FundingSession::default());
        assert!(cache.scopes().is_empty());
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_check_after_timeout_is_discarded() {
        let ledger = Arc::new(GatedLedger::new(Decimal::new(100, 0)));
        let clock = Arc::new(ManualClock::new(0));
        let (poller, cache) = gated_poller(&ledger, &clock);
        let (listener, events) = collecting_listener();

        poller
            .start_funding(request(Decimal::new(50, 0)), Some(listener))
            .await
            .unwrap();

        ledger.hold_next.store(true, AtomicOrdering::SeqCst);
        let in_flight = tokio::spawn({
            let poller = poller.clone();
            async move { poller.check_now().await }
        });
        ledger.entered.notified().await;

        clock.advance(90_000);
        assert_eq!(poller.check_now().await, FundingStatus::TimedOut);

        // The held read now sees a balance that would have confirmed
        ledger.set_balance(Decimal::new(150, 0));
        ledger.release.notify_one();

        assert_eq!(in_flight.await.unwrap(), FundingStatus::TimedOut);
        let session = poller.session();
        assert_eq!(session.status, FundingStatus::TimedOut);
        assert!(session.confirmed_by.is_none());
        assert!(cache.scopes().is_empty());
        let events = events.lock().unwrap().clone();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], FundingEvent::TimedOut { elapsed_ms: 90_000 });
    }

    #[tokio::test]
    async fn test_hand_off_uses_rounded_amount() {
        let ledger = Arc::new(GatedLedger::new(Decimal::new(100, 0)));
        let clock = Arc::new(ManualClock::new(0));
        let (poller, _) = gated_poller(&ledger, &clock);

        poller
            .start_funding(request(Decimal::new(10005, 3)), None)
            .await
            .unwrap();
        assert_eq!(poller.session().amount_usd, Some(Decimal::new(1001, 2)));

        // 110.01 is the rounded target; 110.005 would have been the raw one
        ledger.set_balance(Decimal::new(109995, 3));
        assert_eq!(poller.check_now().await, FundingStatus::Pending);
        ledger.set_balance(Decimal::new(110000, 3));
        assert_eq!(poller.check_now().await, FundingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_huge_timeout_never_expires_early() {
        let ledger = Arc::new(GatedLedger::new(Decimal::ZERO));
        let clock = Arc::new(ManualClock::new(0));
        let poller = FundingPoller::new(
            Arc::new(DemoBackend::manual(Decimal::ZERO)),
            ledger,
            Arc::new(RecordingInvalidator::new()),
            clock.clone(),
            FundingSettings {
                poll_interval_ms: 3_600_000,
                timeout_ms: u64::MAX,
                ..Default::default()
            },
            MethodLimits::default(),
        );

        poller.start_funding(request(Decimal::new(10, 0)), None).await.unwrap();
        clock.advance(10_000_000);
        assert_eq!(poller.check_now().await, FundingStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_generation_leaves_newer_loop_running() {
        let backend = Arc::new(DemoBackend::manual(Decimal::new(100, 0)));
        let clock = Arc::new(ManualClock::new(0));
        let (poller, _) = poller(&backend, &clock);

        poller.start_funding(request(Decimal::new(50, 0)), None).await.unwrap();
        let old_generation = poller.inner.state.lock().unwrap().generation;
        poller.start_funding(request(Decimal::new(50, 0)), None).await.unwrap();

        // A late terminal commit from the first attempt must not stop the second loop
        poller.inner.stop_loop(old_generation);
        assert!(poller.inner.task.lock().unwrap().is_some());

        let reads = backend.balance_reads();
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        assert!(backend.balance_reads() > reads);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_loop_confirms() {
        let backend = Arc::new(DemoBackend::manual(Decimal::new(100, 0)));
        let clock = Arc::new(ManualClock::new(0));
        let (poller, _) = poller(&backend, &clock);
        let (listener, events) = collecting_listener();

        poller
            .start_funding(request(Decimal::new(50, 0)), Some(listener))
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        assert_eq!(poller.session().status, FundingStatus::Pending);
        assert!(poller.session().attempts >= 2);

        backend.set_balance(Decimal::new(150, 0));
        let settled = poller.wait_until_settled().await;
        assert_eq!(settled.status, FundingStatus::Confirmed);
        assert!(events
            .lock()
            .unwrap()
            .contains(&FundingEvent::Confirmed {
                signal: ConfirmationSignal::BalanceDelta
            }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreground_triggers_check_between_ticks() {
        let backend = Arc::new(DemoBackend::manual(Decimal::new(100, 0)));
        let clock = Arc::new(ManualClock::new(0));
        let (poller, _) = poller(&backend, &clock);

        poller.start_funding(request(Decimal::new(50, 0)), None).await.unwrap();
        tokio::task::yield_now().await;
        let before = backend.balance_reads();

        poller.app_foregrounded();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(backend.balance_reads() > before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_ticks_after_reset() {
        let backend = Arc::new(DemoBackend::manual(Decimal::new(100, 0)));
        let clock = Arc::new(ManualClock::new(0));
        let (poller, _) = poller(&backend, &clock);

        poller.start_funding(request(Decimal::new(50, 0)), None).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        poller.reset();
        let reads = backend.balance_reads();

        tokio::time::sleep(std::time::Duration::from_secs(10)).await;
        assert_eq!(backend.balance_reads(), reads);
    }
}
