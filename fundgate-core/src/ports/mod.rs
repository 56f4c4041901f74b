//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external collaborators: the wallet
//! application, the ledger, the withdrawal and passcode services, the
//! platform biometric capability and the auth store. The services depend
//! only on these traits, not on concrete implementations.

mod auth;
mod cache;
mod ledger;
mod wallet;
mod withdrawal;

pub use auth::{AuthStore, BiometricAuthorizer, PasscodeVerifier};
pub use cache::{CacheInvalidator, CacheScope, Clock};
pub use ledger::LedgerQuery;
pub use wallet::{WalletFundingParams, WalletHandoff};
pub use withdrawal::WithdrawalMutations;
