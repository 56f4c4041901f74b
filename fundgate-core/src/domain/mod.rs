//! Core domain entities
//!
//! Requests, sessions and outcomes of the money-movement flows. These are
//! pure data structures with validation logic - no I/O.

pub mod authorization;
pub mod funding;
pub mod method;
pub mod result;
pub mod withdrawal;

pub use authorization::{AuthorizationSession, Challenge, GateState, PasscodeVerification};
pub use funding::{
    ActivityEntry, ConfirmationSignal, FundingEvent, FundingRequest, FundingSession,
    FundingStatus, HandoffReceipt,
};
pub use method::{TradeSide, TransferFlow, TransferMethod, WalletProvider};
pub use withdrawal::{
    CryptoWithdrawalPayload, Destination, FiatWithdrawalPayload, SubmissionOutcome,
    WithdrawalReceipt, WithdrawalRequest,
};
