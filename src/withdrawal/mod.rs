//! Withdrawal Lifecycle Engine
//!
//! Mediates payout requests from the game-server plugin through a
//! human-approval gate before money moves.
//!
//! # State Machine
//!
//! ```text
//! PENDING → PROCESSING → APPROVED
//!    │           ├─────→ FAILED
//!    └───────────┴─────→ REJECTED
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Single Gate**: only the PENDING → PROCESSING winner reaches the payout executor
//! 2. **Persist-Before-Call**: PROCESSING is durable before any payout is sent
//! 3. **Tx Iff Approved**: a transaction id exists exactly on APPROVED rows
//! 4. **Terminal Is Final**: APPROVED/REJECTED/FAILED never leave through review

pub mod db;
pub mod error;
pub mod manager;
pub mod observer;
pub mod state;
pub mod types;


// Re-exports for convenience
pub use db::WithdrawalStore;
pub use error::WithdrawalError;
pub use manager::{DEFAULT_LIST_LIMIT, WithdrawalManager};
pub use observer::{ObserverRegistry, TracingObserver, WithdrawalObserver};
pub use state::WithdrawalStatus;
pub use types::{Metadata, NewWithdrawal, RequestId, WithdrawalRequest};
