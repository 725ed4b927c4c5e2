//! New-request observers
//!
//! Observers are notified after a request is durably created. A failing
//! or panicking observer is logged and skipped; it never fails the creation.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{error, info};

use super::types::WithdrawalRequest;

#[async_trait]
pub trait WithdrawalObserver: Send + Sync {
    /// Observer name for logging
    fn name(&self) -> &'static str;

    async fn on_created(&self, request: &WithdrawalRequest) -> anyhow::Result<()>;
}

/// Ordered list of observers
#[derive(Default)]
pub struct ObserverRegistry {
    observers: RwLock<Vec<Arc<dyn WithdrawalObserver>>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, observer: Arc<dyn WithdrawalObserver>) {
        let mut observers = self
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        info!(observer = observer.name(), "Withdrawal observer registered");
        observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current list; the lock is released before returning
    fn snapshot(&self) -> Vec<Arc<dyn WithdrawalObserver>> {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Notify every observer in registration order, outside the lock
    ///
    /// Returns the number of observers that failed or panicked.
    pub async fn dispatch(&self, request: &WithdrawalRequest) -> usize {
        let mut failures = 0;
        for observer in self.snapshot() {
            match AssertUnwindSafe(observer.on_created(request))
                .catch_unwind()
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    error!(
                        observer = observer.name(),
                        request_id = request.id,
                        error = %e,
                        "Failed to deliver withdrawal notification"
                    );
                }
                Err(panic) => {
                    failures += 1;
                    error!(
                        observer = observer.name(),
                        request_id = request.id,
                        panic = panic_message(panic.as_ref()),
                        "Withdrawal observer panicked"
                    );
                }
            }
        }
        failures
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Logs every new request
pub struct TracingObserver;

#[async_trait]
impl WithdrawalObserver for TracingObserver {
    fn name(&self) -> &'static str {
        "tracing"
    }

    async fn on_created(&self, request: &WithdrawalRequest) -> anyhow::Result<()> {
        info!(
            request_id = request.id,
            player = %request.player_name,
            amount = %request.amount,
            currency = %request.currency,
            "New withdrawal awaiting review"
        );
        Ok(())
    }
}
