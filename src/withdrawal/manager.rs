//! Withdrawal Manager
//!
//! Sequences store and payout calls and owns observer dispatch.
//!
//! # Approve Protocol
//!
//! ```text
//! mark_processing ──▶ executor.send ──ok──▶ mark_approved
//!                          │
//!                          └──err──▶ mark_failed + PaymentFailed
//! ```
//!
//! The store lock is released while the payout is in flight. A crash in
//! that window leaves the request in PROCESSING; nothing reconciles such
//! rows automatically, operators find them with `list(Some(Processing))`.

use std::sync::Arc;

use tracing::{error, info, warn};
use validator::Validate;

use super::db::WithdrawalStore;
use super::error::WithdrawalError;
use super::observer::{ObserverRegistry, WithdrawalObserver};
use super::state::WithdrawalStatus;
use super::types::{NewWithdrawal, RequestId, WithdrawalRequest};
use crate::payout::PaymentExecutor;

pub const DEFAULT_LIST_LIMIT: u32 = 50;

pub struct WithdrawalManager {
    store: Arc<WithdrawalStore>,
    executor: Arc<dyn PaymentExecutor>,
    observers: ObserverRegistry,
}

impl WithdrawalManager {
    pub fn new(store: Arc<WithdrawalStore>, executor: Arc<dyn PaymentExecutor>) -> Self {
        Self {
            store,
            executor,
            observers: ObserverRegistry::new(),
        }
    }

    /// Create a manager with observers registered up front
    pub fn with_observers(
        store: Arc<WithdrawalStore>,
        executor: Arc<dyn PaymentExecutor>,
        observers: impl IntoIterator<Item = Arc<dyn WithdrawalObserver>>,
    ) -> Self {
        let manager = Self::new(store, executor);
        for observer in observers {
            manager.register_observer(observer);
        }
        manager
    }

    pub fn register_observer(&self, observer: Arc<dyn WithdrawalObserver>) {
        self.observers.register(observer);
    }

    pub fn store(&self) -> &Arc<WithdrawalStore> {
        &self.store
    }

    pub fn executor_name(&self) -> &'static str {
        self.executor.name()
    }

    /// Validate, persist as PENDING, then notify observers
    ///
    /// Observer failures are logged and never reach the caller.
    pub async fn create_request(&self, input: NewWithdrawal) -> Result<WithdrawalRequest, WithdrawalError> {
        input.validate()?;

        let request = self.store.create(&input).await?;
        let failures = self.observers.dispatch(&request).await;
        if failures > 0 {
            warn!(
                request_id = request.id,
                failures = failures,
                "Withdrawal created but some observers failed"
            );
        }
        Ok(request)
    }

    pub async fn attach_message_reference(
        &self,
        id: RequestId,
        message_id: i64,
    ) -> Result<WithdrawalRequest, WithdrawalError> {
        self.store.set_review_message(id, message_id).await
    }

    /// Approve and pay out a PENDING request
    ///
    /// Only the caller that wins PENDING → PROCESSING reaches the executor;
    /// every other caller gets `InvalidState` and nothing is sent.
    pub async fn approve(
        &self,
        id: RequestId,
        actor_name: &str,
        actor_id: i64,
    ) -> Result<WithdrawalRequest, WithdrawalError> {
        let processing = self.store.mark_processing(id).await?;
        info!(
            request_id = id,
            actor = actor_name,
            executor = self.executor.name(),
            "Withdrawal approved, sending payout"
        );

        let transaction_id = match self.executor.send(&processing).await {
            Ok(tx_id) => tx_id,
            Err(e) => {
                error!(request_id = id, error = %e, "Wallet transfer failed");
                self.store.mark_failed(id, &e.to_string()).await?;
                return Err(WithdrawalError::PaymentFailed { id, source: e });
            }
        };

        match self
            .store
            .mark_approved(id, actor_name, actor_id, &transaction_id)
            .await
        {
            Ok(approved) => {
                info!(
                    request_id = id,
                    transaction_id = %transaction_id,
                    "Withdrawal paid"
                );
                Ok(approved)
            }
            Err(e) => {
                // Funds moved but the outcome is not recorded
                error!(
                    request_id = id,
                    transaction_id = %transaction_id,
                    error = %e,
                    "Payout sent but approval could not be recorded, manual reconciliation required"
                );
                Err(e)
            }
        }
    }

    pub async fn reject(
        &self,
        id: RequestId,
        actor_name: &str,
        actor_id: i64,
        reason: Option<&str>,
    ) -> Result<WithdrawalRequest, WithdrawalError> {
        self.store.mark_rejected(id, actor_name, actor_id, reason).await
    }

    pub async fn get_request(&self, id: RequestId) -> Result<WithdrawalRequest, WithdrawalError> {
        self.store.get(id).await
    }

    pub async fn list_pending(&self, limit: u32) -> Result<Vec<WithdrawalRequest>, WithdrawalError> {
        self.store.list(Some(WithdrawalStatus::Pending), limit).await
    }

    pub async fn list_requests(
        &self,
        status: Option<WithdrawalStatus>,
        limit: u32,
    ) -> Result<Vec<WithdrawalRequest>, WithdrawalError> {
        self.store.list(status, limit).await
    }
}
