//! Simulated payouts for deployments without a real payment rail.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use super::{PaymentError, PaymentExecutor};
use crate::withdrawal::WithdrawalRequest;

pub const DEFAULT_DELAY: Duration = Duration::from_millis(250);

/// Always succeeds after a fixed delay with a `dummy-<uuid>` id
#[derive(Debug, Clone)]
pub struct SimulatedPayout {
    delay: Duration,
}

impl SimulatedPayout {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SimulatedPayout {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY)
    }
}

#[async_trait]
impl PaymentExecutor for SimulatedPayout {
    fn name(&self) -> &'static str {
        "simulator"
    }

    async fn send(&self, request: &WithdrawalRequest) -> Result<String, PaymentError> {
        tokio::time::sleep(self.delay).await;
        let transaction_id = format!("dummy-{}", Uuid::new_v4());
        info!(
            request_id = request.id,
            amount = %request.amount,
            currency = %request.currency,
            transaction_id = %transaction_id,
            "Simulated payout"
        );
        Ok(transaction_id)
    }
}
