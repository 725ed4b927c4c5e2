//! Withdrawal Error Types

use thiserror::Error;

use super::state::WithdrawalStatus;
use super::types::RequestId;
use crate::payout::PaymentError;

/// Withdrawal error types
///
/// Store errors pass through the manager unchanged. `PaymentFailed` is the
/// only error that is also recorded as durable state.
#[derive(Error, Debug)]
pub enum WithdrawalError {
    // === Lookup / State Errors ===
    #[error("Unknown request: {0}")]
    NotFound(RequestId),

    #[error("Cannot {action} request {id} from {current}")]
    InvalidState {
        id: RequestId,
        action: &'static str,
        current: WithdrawalStatus,
    },

    // === Payout Errors ===
    #[error("Wallet transfer failed for request {id}: {source}")]
    PaymentFailed {
        id: RequestId,
        #[source]
        source: PaymentError,
    },

    // === Validation Errors ===
    #[error("Invalid withdrawal request: {0}")]
    Validation(String),

    // === System Errors ===
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt row {id}: {reason}")]
    CorruptRow { id: RequestId, reason: String },

    #[error("Withdrawal store is closed")]
    StoreClosed,
}

impl WithdrawalError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            WithdrawalError::NotFound(_) => "NOT_FOUND",
            WithdrawalError::InvalidState { .. } => "INVALID_STATE",
            WithdrawalError::PaymentFailed { .. } => "PAYMENT_FAILED",
            WithdrawalError::Validation(_) => "VALIDATION_ERROR",
            WithdrawalError::Database(_) => "DATABASE_ERROR",
            WithdrawalError::CorruptRow { .. } => "CORRUPT_ROW",
            WithdrawalError::StoreClosed => "STORE_CLOSED",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            WithdrawalError::NotFound(_) => 404,
            WithdrawalError::InvalidState { .. } => 409,
            WithdrawalError::Validation(_) => 400,
            WithdrawalError::PaymentFailed { .. } => 502,
            WithdrawalError::Database(_) | WithdrawalError::CorruptRow { .. } => 500,
            WithdrawalError::StoreClosed => 503,
        }
    }

    /// Current status named by an `InvalidState` error
    pub fn current_status(&self) -> Option<WithdrawalStatus> {
        match self {
            WithdrawalError::InvalidState { current, .. } => Some(*current),
            _ => None,
        }
    }
}

impl From<validator::ValidationErrors> for WithdrawalError {
    fn from(e: validator::ValidationErrors) -> Self {
        WithdrawalError::Validation(e.to_string())
    }
}
