//! Withdrawal Status Definitions
//!
//! Status ids are the lowercase strings stored in the `status` column.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Withdrawal lifecycle states
///
/// ```text
/// PENDING → PROCESSING → APPROVED
///    │           ├─────→ FAILED
///    └───────────┴─────→ REJECTED
/// ```
///
/// Terminal states: APPROVED, REJECTED, FAILED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    /// Created, waiting for a human decision
    Pending,

    /// Approved by a human, payout in flight
    /// CRITICAL: a crash here leaves the row visible for reconciliation
    Processing,

    /// Terminal: payout sent, transaction id recorded
    Approved,

    /// Terminal: declined by a human
    Rejected,

    /// Terminal: payout attempt failed
    Failed,
}

impl WithdrawalStatus {
    pub const ALL: [WithdrawalStatus; 5] = [
        WithdrawalStatus::Pending,
        WithdrawalStatus::Processing,
        WithdrawalStatus::Approved,
        WithdrawalStatus::Rejected,
        WithdrawalStatus::Failed,
    ];

    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WithdrawalStatus::Approved | WithdrawalStatus::Rejected | WithdrawalStatus::Failed
        )
    }

    /// Whether a human decision (approve/reject) may still be recorded
    #[inline]
    pub fn is_reviewable(&self) -> bool {
        matches!(
            self,
            WithdrawalStatus::Pending | WithdrawalStatus::Processing
        )
    }

    /// Edges of the lifecycle graph.
    ///
    /// `Failed` is reachable from anywhere through the store's forced
    /// failure path, so it is not modelled here.
    pub fn can_transition_to(&self, next: WithdrawalStatus) -> bool {
        use WithdrawalStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Approved)
                | (Pending, Rejected)
                | (Processing, Approved)
                | (Processing, Rejected)
                | (Processing, Failed)
        )
    }

    /// Get the storage id
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Processing => "processing",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Rejected => "rejected",
            WithdrawalStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WithdrawalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(WithdrawalStatus::Pending),
            "processing" => Ok(WithdrawalStatus::Processing),
            "approved" => Ok(WithdrawalStatus::Approved),
            "rejected" => Ok(WithdrawalStatus::Rejected),
            "failed" => Ok(WithdrawalStatus::Failed),
            _ => Err(format!("Invalid withdrawal status: {}", s)),
        }
    }
}
