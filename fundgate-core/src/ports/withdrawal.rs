//! Withdrawal mutation port

use async_trait::async_trait;

use crate::domain::result::Result;
use crate::domain::{CryptoWithdrawalPayload, FiatWithdrawalPayload, WithdrawalReceipt};

/// Remote fund-moving mutations
///
/// The core never retries these; a failed call is reported as-is.
#[async_trait]
pub trait WithdrawalMutations: Send + Sync {
    async fn initiate_withdrawal(&self, payload: &CryptoWithdrawalPayload) -> Result<WithdrawalReceipt>;

    async fn initiate_fiat_withdrawal(&self, payload: &FiatWithdrawalPayload) -> Result<WithdrawalReceipt>;
}
