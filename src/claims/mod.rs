//! # Claims
//!
//! Claim initiation, status monitoring and the rules derived from a claim
//! history (retry eligibility, second-wave balances).
//!
//! Submodules:
//! - `repository`: storage contract for claim records
//! - `lifecycle`: user-gated claim initiation
//! - `monitor`: polling state machine over open claims
//! - `ledger`: last status each claim was announced with
//! - `outbox`: confirmed claims waiting to be persisted
//! - `retry`: retry eligibility

pub mod ledger;
pub mod lifecycle;
pub mod monitor;
pub mod outbox;
pub mod repository;
pub mod retry;

pub use ledger::{MemoryNotificationLedger, NotificationLedger};
pub use lifecycle::{ClaimLifecycleManager, ClaimResult, ClaimStage};
pub use monitor::{ClaimStatusMonitor, MonitorEvent, PassReport};
pub use outbox::ClaimOutbox;
pub use repository::{ClaimPage, ClaimQuery, ClaimsRepository, StatusUpdate, UpdateStatusRequest};
pub use retry::{is_retryable, retryable_claim};
