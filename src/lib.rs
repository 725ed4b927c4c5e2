//! Withdrawal Bridge - human-approved payouts for game-server withdrawals
//!
//! A game-server plugin submits withdrawal requests; reviewers approve or
//! reject them; approval drives exactly one payout through the configured
//! payment rail.
//!
//! # Modules
//!
//! - [`withdrawal`] - Request store, lifecycle manager, observers
//! - [`payout`] - Payment executors (simulator, generic HTTP, Piteas)
//! - [`gateway`] - Intake REST API used by the plugin
//! - [`config`] - YAML configuration with environment overrides
//! - [`logging`] - tracing subscriber setup

pub mod config;
pub mod gateway;
pub mod logging;
pub mod payout;
pub mod withdrawal;

// Convenient re-exports at crate root
pub use config::{AppConfig, PayoutConfig};
pub use payout::{PaymentError, PaymentExecutor, build_executor};
pub use withdrawal::{
    NewWithdrawal, RequestId, WithdrawalError, WithdrawalManager, WithdrawalObserver,
    WithdrawalRequest, WithdrawalStatus, WithdrawalStore,
};
