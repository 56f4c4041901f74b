//! External wallet hand-off port

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::result::Result;
use crate::domain::{HandoffReceipt, WalletProvider};

/// Parameters passed to the external wallet application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletFundingParams {
    pub wallet: WalletProvider,
    pub amount_usd: Decimal,
    pub recipient_owner_address: String,
}

/// Wallet hand-off trait
///
/// Implementations delegate the transfer to a wallet application the core
/// does not control. Errors should use `Error::HandOff` with a category so
/// callers can tell "not installed" from "cancelled".
#[async_trait]
pub trait WalletHandoff: Send + Sync {
    async fn start_mobile_wallet_funding(&self, params: &WalletFundingParams) -> Result<HandoffReceipt>;
}
