//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on one part of moving money in or out.

pub mod dispatcher;
pub mod gate;
pub mod logging;
pub mod poller;
pub mod session_guard;
pub mod transfer;

pub use dispatcher::WithdrawalDispatcher;
pub use gate::{AuthorizationGate, GateOutcome, GateSnapshot, PendingAction};
pub use logging::{events, EntryPoint, EventCount, LogEntry, LogEvent, LoggingService};
pub use poller::{FundingListener, FundingPoller};
pub use session_guard::{SessionGuard, SessionInvalidity};
pub use transfer::{TransferOutcome, TransferService};
