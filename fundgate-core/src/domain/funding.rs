//! Funding session domain model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::method::WalletProvider;

/// A value transfer to be handed off to an external wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingRequest {
    pub method: WalletProvider,
    pub amount_usd: Decimal,
    /// The user's own deposit address
    pub recipient_address: String,
}

impl FundingRequest {
    pub fn new(method: WalletProvider, amount_usd: Decimal, recipient_address: impl Into<String>) -> Self {
        Self {
            method,
            amount_usd,
            recipient_address: recipient_address.into(),
        }
    }
}

/// Lifecycle of a funding confirmation cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundingStatus {
    #[default]
    Idle,
    Pending,
    Confirmed,
    TimedOut,
}

impl FundingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FundingStatus::Confirmed | FundingStatus::TimedOut)
    }
}

/// Which observation confirmed the transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationSignal {
    /// The activity feed lists the hand-off signature
    SignatureMatch,
    /// The ledger balance rose by the requested amount
    BalanceDelta,
}

/// State of the current funding attempt
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FundingSession {
    pub status: FundingStatus,
    pub started_at_epoch_ms: Option<i64>,
    pub baseline_balance: Option<Decimal>,
    /// Empty until the wallet reports a signature
    pub signature: String,
    pub amount_usd: Option<Decimal>,
    pub attempts: u64,
    pub confirmed_by: Option<ConfirmationSignal>,
}

impl FundingSession {
    /// Enter `pending` for a freshly handed-off transfer
    pub fn pending(
        started_at_epoch_ms: i64,
        baseline_balance: Option<Decimal>,
        signature: Option<String>,
        amount_usd: Decimal,
    ) -> Self {
        Self {
            status: FundingStatus::Pending,
            started_at_epoch_ms: Some(started_at_epoch_ms),
            baseline_balance,
            signature: signature.unwrap_or_default(),
            amount_usd: Some(amount_usd),
            attempts: 0,
            confirmed_by: None,
        }
    }

    pub fn elapsed_ms(&self, now_epoch_ms: i64) -> Option<i64> {
        self.started_at_epoch_ms.map(|start| now_epoch_ms - start)
    }
}

/// Notifications emitted over the life of a funding attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FundingEvent {
    HandedOff { signature: Option<String> },
    Confirmed { signal: ConfirmationSignal },
    TimedOut { elapsed_ms: i64 },
}

/// What the wallet returned when the hand-off was initiated
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HandoffReceipt {
    pub signature: Option<String>,
}

/// Entry in the user's recent-activity (deposit) feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: String,
    pub amount_usd: Decimal,
    /// On-chain reference, when indexed
    #[serde(default)]
    pub reference: Option<String>,
    pub created_at_epoch_ms: i64,
}

impl ActivityEntry {
    /// On-chain references compare case-insensitively
    pub fn matches_reference(&self, signature: &str) -> bool {
        !signature.is_empty()
            && self
                .reference
                .as_deref()
                .is_some_and(|r| r.eq_ignore_ascii_case(signature))
    }
}
