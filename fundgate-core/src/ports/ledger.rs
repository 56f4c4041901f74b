//! Ledger and activity query port

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::result::Result;
use crate::domain::ActivityEntry;

/// Read-only queries against the remote ledger
///
/// Both calls are idempotent and side-effect free, so the poller may call
/// them as often as it likes.
#[async_trait]
pub trait LedgerQuery: Send + Sync {
    /// Recent deposits, most recent first
    ///
    /// # Arguments
    /// * `page` - Zero-based page index
    /// * `page_size` - Entries per page
    async fn recent_deposits(&self, page: u32, page_size: u32) -> Result<Vec<ActivityEntry>>;

    /// Current station balance in USD
    async fn station_balance(&self) -> Result<Decimal>;
}
