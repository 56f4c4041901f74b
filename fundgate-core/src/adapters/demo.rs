//! Demo backend
//!
//! An in-memory stand-in for every remote collaborator: the external wallet,
//! the ledger, the withdrawal service, passcode verification and the
//! platform biometric check. Used by demo mode and by tests.
//!
//! In simulated mode a hand-off credits the balance after `settle_after` and
//! shows up in the activity feed `index_lag` later, which reproduces the
//! feed-indexing lag the poller has to tolerate. In manual mode nothing
//! happens until the caller moves the ledger by hand.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, HandOffErrorKind, Result};
use crate::domain::{
    ActivityEntry, CryptoWithdrawalPayload, FiatWithdrawalPayload, HandoffReceipt,
    PasscodeVerification, WithdrawalReceipt,
};
use crate::ports::{
    BiometricAuthorizer, LedgerQuery, PasscodeVerifier, WalletFundingParams, WalletHandoff,
    WithdrawalMutations,
};

/// Passcode accepted by a freshly enabled demo
pub const DEMO_PASSCODE: &str = "123456";

/// Demo deposit address
pub const DEMO_DEPOSIT_ADDRESS: &str = "FgDemo1111111111111111111111111111111111111";

/// Hash a passcode the way the demo backend stores it
pub fn hash_demo_passcode(passcode: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill(&mut salt_bytes[..]);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| Error::Other(format!("Failed to encode salt: {}", e)))?;
    Argon2::default()
        .hash_password(passcode.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| Error::Other(format!("Failed to hash passcode: {}", e)))
}

/// Generate a base58 signature shaped like an on-chain transaction id
fn generate_signature() -> String {
    let mut bytes = [0u8; 64];
    rand::thread_rng().fill(&mut bytes[..]);
    bs58::encode(bytes).into_string()
}

/// How long the simulated chain takes to reflect a hand-off
#[derive(Debug, Clone, Copy)]
pub struct DemoTiming {
    pub settle_after: Duration,
    pub index_lag: Duration,
}

impl Default for DemoTiming {
    fn default() -> Self {
        Self {
            settle_after: Duration::from_secs(4),
            index_lag: Duration::from_secs(6),
        }
    }
}

/// A withdrawal the demo service accepted
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedWithdrawal {
    Crypto(CryptoWithdrawalPayload),
    Fiat(FiatWithdrawalPayload),
}

#[derive(Debug)]
struct DemoState {
    balance: Decimal,
    deposits: Vec<ActivityEntry>,
    withdrawals: Vec<RecordedWithdrawal>,
    handoffs: Vec<WalletFundingParams>,
    offline: bool,
    next_signature: Option<Option<String>>,
    next_handoff_error: Option<HandOffErrorKind>,
    reject_next_withdrawals: u32,
    passcode_hash: Option<String>,
    biometric_supported: bool,
    biometric_succeeds: bool,
}

/// In-memory implementation of every remote port
pub struct DemoBackend {
    state: Arc<Mutex<DemoState>>,
    timing: Option<DemoTiming>,
    handoffs: AtomicU64,
    balance_reads: Arc<AtomicU64>,
}

impl DemoBackend {
    fn with_state(balance: Decimal, timing: Option<DemoTiming>) -> Self {
        Self {
            state: Arc::new(Mutex::new(DemoState {
                balance,
                deposits: Vec::new(),
                withdrawals: Vec::new(),
                handoffs: Vec::new(),
                offline: false,
                next_signature: None,
                next_handoff_error: None,
                reject_next_withdrawals: 0,
                passcode_hash: None,
                biometric_supported: false,
                biometric_succeeds: true,
            })),
            timing,
            handoffs: AtomicU64::new(0),
            balance_reads: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Ledger only changes through the control methods
    pub fn manual(balance: Decimal) -> Self {
        Self::with_state(balance, None)
    }

    /// Hand-offs settle on their own after the given timing
    pub fn simulated(balance: Decimal, timing: DemoTiming) -> Self {
        Self::with_state(balance, Some(timing))
    }

    /// Accept `passcode` (stored as an argon2 hash)
    pub fn with_passcode(self, passcode: &str) -> Result<Self> {
        let hash = hash_demo_passcode(passcode)?;
        Ok(self.with_passcode_hash(hash))
    }

    /// Accept whatever passcode `hash` was produced from
    pub fn with_passcode_hash(self, hash: impl Into<String>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.passcode_hash = Some(hash.into());
        }
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, DemoState>> {
        self.state
            .lock()
            .map_err(|e| Error::Other(format!("Lock poisoned: {}", e)))
    }

    fn check_online(&self) -> Result<()> {
        if self.lock()?.offline {
            return Err(Error::Network("demo backend offline".to_string()));
        }
        Ok(())
    }

    // === Controls ===

    pub fn set_balance(&self, balance: Decimal) {
        if let Ok(mut state) = self.state.lock() {
            state.balance = balance;
        }
    }

    pub fn balance(&self) -> Decimal {
        self.state.lock().map(|s| s.balance).unwrap_or_default()
    }

    /// Add an entry to the activity feed (newest first)
    pub fn index_deposit(&self, amount_usd: Decimal, reference: Option<String>) {
        if let Ok(mut state) = self.state.lock() {
            push_deposit(&mut state, amount_usd, reference);
        }
    }

    /// Make every ledger/mutation call fail with a network error
    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.offline = offline;
        }
    }

    /// Signature the next hand-off reports (`None` = unknown)
    pub fn set_next_signature(&self, signature: Option<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.next_signature = Some(signature);
        }
    }

    pub fn fail_next_handoff(&self, kind: HandOffErrorKind) {
        if let Ok(mut state) = self.state.lock() {
            state.next_handoff_error = Some(kind);
        }
    }

    /// Reject the next `count` withdrawals as if the step-up session expired
    pub fn expire_next_withdrawals(&self, count: u32) {
        if let Ok(mut state) = self.state.lock() {
            state.reject_next_withdrawals = count;
        }
    }

    pub fn set_biometric(&self, supported: bool, succeeds: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.biometric_supported = supported;
            state.biometric_succeeds = succeeds;
        }
    }

    pub fn withdrawals(&self) -> Vec<RecordedWithdrawal> {
        self.state
            .lock()
            .map(|s| s.withdrawals.clone())
            .unwrap_or_default()
    }

    /// Parameters of every hand-off that reached the wallet
    pub fn handoffs(&self) -> Vec<WalletFundingParams> {
        self.state
            .lock()
            .map(|s| s.handoffs.clone())
            .unwrap_or_default()
    }

    pub fn handoff_count(&self) -> u64 {
        self.handoffs.load(Ordering::SeqCst)
    }

    pub fn balance_reads(&self) -> u64 {
        self.balance_reads.load(Ordering::SeqCst)
    }

    fn take_rejection(&self) -> Result<()> {
        let mut state = self.lock()?;
        if state.offline {
            return Err(Error::Network("demo backend offline".to_string()));
        }
        if state.reject_next_withdrawals > 0 {
            state.reject_next_withdrawals -= 1;
            return Err(Error::remote(401, "Authorization expired"));
        }
        Ok(())
    }

    fn debit(&self, amount: &str, recorded: RecordedWithdrawal) -> Result<WithdrawalReceipt> {
        let amount: Decimal = amount
            .parse()
            .map_err(|_| Error::remote(400, format!("Invalid amount: {}", amount)))?;
        let mut state = self.lock()?;
        if amount > state.balance {
            return Err(Error::remote(400, "Insufficient balance"));
        }
        state.balance -= amount;
        state.withdrawals.push(recorded);
        Ok(WithdrawalReceipt {
            id: Some(Uuid::new_v4().to_string()),
            status: Some("pending".to_string()),
        })
    }
}

fn push_deposit(state: &mut DemoState, amount_usd: Decimal, reference: Option<String>) {
    state.deposits.insert(
        0,
        ActivityEntry {
            id: Uuid::new_v4().to_string(),
            amount_usd,
            reference,
            created_at_epoch_ms: Utc::now().timestamp_millis(),
        },
    );
}

#[async_trait]
impl WalletHandoff for DemoBackend {
    async fn start_mobile_wallet_funding(&self, params: &WalletFundingParams) -> Result<HandoffReceipt> {
        let (signature, error) = {
            let mut state = self.lock()?;
            let signature = state
                .next_signature
                .take()
                .unwrap_or_else(|| Some(generate_signature()));
            (signature, state.next_handoff_error.take())
        };
        if let Some(kind) = error {
            return Err(Error::hand_off(kind, format!("{} could not open", params.wallet)));
        }
        self.handoffs.fetch_add(1, Ordering::SeqCst);
        self.lock()?.handoffs.push(params.clone());

        if let Some(timing) = self.timing {
            let state = Arc::clone(&self.state);
            let amount = params.amount_usd;
            let reference = signature.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timing.settle_after).await;
                if let Ok(mut s) = state.lock() {
                    s.balance += amount;
                }
                tokio::time::sleep(timing.index_lag).await;
                if let Ok(mut s) = state.lock() {
                    push_deposit(&mut s, amount, reference);
                }
            });
        }

        Ok(HandoffReceipt { signature })
    }
}

#[async_trait]
impl LedgerQuery for DemoBackend {
    async fn recent_deposits(&self, page: u32, page_size: u32) -> Result<Vec<ActivityEntry>> {
        self.check_online()?;
        let state = self.lock()?;
        Ok(state
            .deposits
            .iter()
            .skip(page as usize * page_size as usize)
            .take(page_size as usize)
            .cloned()
            .collect())
    }

    async fn station_balance(&self) -> Result<Decimal> {
        self.balance_reads.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        Ok(self.lock()?.balance)
    }
}

#[async_trait]
impl WithdrawalMutations for DemoBackend {
    async fn initiate_withdrawal(&self, payload: &CryptoWithdrawalPayload) -> Result<WithdrawalReceipt> {
        self.take_rejection()?;
        self.debit(&payload.amount, RecordedWithdrawal::Crypto(payload.clone()))
    }

    async fn initiate_fiat_withdrawal(&self, payload: &FiatWithdrawalPayload) -> Result<WithdrawalReceipt> {
        self.take_rejection()?;
        self.debit(&payload.amount, RecordedWithdrawal::Fiat(payload.clone()))
    }
}

#[async_trait]
impl PasscodeVerifier for DemoBackend {
    async fn verify_passcode(&self, passcode: &str) -> Result<PasscodeVerification> {
        self.check_online()?;
        let Some(hash) = self.lock()?.passcode_hash.clone() else {
            return Ok(PasscodeVerification::default());
        };
        let parsed = PasswordHash::new(&hash)
            .map_err(|e| Error::Config(format!("Invalid demo passcode hash: {}", e)))?;
        let verified = Argon2::default()
            .verify_password(passcode.as_bytes(), &parsed)
            .is_ok();
        Ok(PasscodeVerification {
            verified,
            token: None,
        })
    }
}

#[async_trait]
impl BiometricAuthorizer for DemoBackend {
    fn is_supported(&self) -> bool {
        self.state
            .lock()
            .map(|s| s.biometric_supported)
            .unwrap_or(false)
    }

    async fn authenticate(&self, _reason: &str) -> Result<()> {
        let state = self.lock()?;
        if !state.biometric_supported {
            return Err(Error::BiometricUnavailable("not supported on this device".to_string()));
        }
        if !state.biometric_succeeds {
            return Err(Error::BiometricUnavailable("biometric check failed".to_string()));
        }
        Ok(())
    }
}
