//! Withdrawal request domain model and payload normalization

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::method::{TradeSide, TransferFlow, TransferMethod};
use super::result::{Error, Result};

/// Where the money goes, depending on the method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Destination {
    Address(String),
    RoutingNumber(String),
    AssetSymbol(String),
}

/// A single submission attempt, built from current form state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub method: TransferMethod,
    pub amount_usd: Decimal,
    pub destination: Destination,
    #[serde(default)]
    pub destination_chain: Option<String>,
}

impl WithdrawalRequest {
    pub fn new(method: TransferMethod, amount_usd: Decimal, destination: Destination) -> Self {
        Self {
            method,
            amount_usd,
            destination,
            destination_chain: None,
        }
    }

    pub fn with_chain(mut self, chain: impl Into<String>) -> Self {
        self.destination_chain = Some(chain.into());
        self
    }

    /// Whether submitting this request moves third-party funds and therefore
    /// needs a valid step-up authorization first
    pub fn requires_authorization(&self, flow: TransferFlow) -> bool {
        match (self.method, flow) {
            (TransferMethod::Asset(_), _) => false,
            (TransferMethod::Wallet(_), TransferFlow::Fund) => false,
            _ => true,
        }
    }
}

/// Body of `initiateWithdrawal`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoWithdrawalPayload {
    pub amount: String,
    pub destination_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_chain: Option<String>,
}

/// Body of `initiateFiatWithdrawal`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiatWithdrawalPayload {
    pub amount: String,
    pub currency: String,
    pub routing_number: String,
}

/// Acknowledgement from the withdrawal service
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WithdrawalReceipt {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// What a successful submission turned into
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Withdrawn { receipt: WithdrawalReceipt },
    FundingStarted { signature: Option<String> },
    TradeRedirect { side: TradeSide, symbol: String, amount: String },
}

/// Round an amount to cents, half away from zero
pub fn round_amount(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Format an amount with exactly two decimals, rounding half away from zero
pub fn normalize_amount(amount: Decimal) -> String {
    round_amount(amount).to_string()
}

/// Keep only the digits of a user-entered routing number
pub fn sanitize_routing_number(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Reject non-positive amounts and amounts above the method limit
pub fn validate_amount(amount: Decimal, limit: Option<Decimal>) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::validation("Amount must be greater than zero"));
    }
    if let Some(limit) = limit {
        if amount > limit {
            return Err(Error::validation(format!(
                "Amount exceeds the limit of {}",
                normalize_amount(limit)
            )));
        }
    }
    Ok(())
}
