//! Payout Executors
//!
//! A `PaymentExecutor` sends exactly one payment for one approved
//! withdrawal and returns the network transaction id.
//!
//! # Contract
//!
//! 1. **Single attempt**: no built-in retry, retry policy belongs to the caller
//! 2. **No deduplication**: replay protection comes from the withdrawal
//!    state machine (only the PENDING → PROCESSING winner calls `send`)
//! 3. **Bounded**: network variants fail with `PaymentError` after their timeout

pub mod http;
pub mod piteas;
pub mod simulator;

pub use http::{HttpPayout, HttpPayoutConfig};
pub use piteas::{PiteasConfig, PiteasPayout};
pub use simulator::SimulatedPayout;

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::PayoutConfig;
use crate::withdrawal::WithdrawalRequest;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Invalid payout configuration: {0}")]
    Config(String),

    #[error("Failed to contact payout endpoint: {0}")]
    Network(String),

    #[error("Payout request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed payout response: {0}")]
    MalformedResponse(String),

    #[error("Payout response missing transaction identifier")]
    MissingTransactionId,
}

impl From<reqwest::Error> for PaymentError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PaymentError::Network(format!("timed out: {}", e))
        } else if e.is_decode() {
            PaymentError::MalformedResponse(e.to_string())
        } else {
            PaymentError::Network(e.to_string())
        }
    }
}

#[async_trait]
pub trait PaymentExecutor: Send + Sync + Debug {
    /// Executor name for logging
    fn name(&self) -> &'static str;

    /// Send the payout for `request`, returning the transaction id
    async fn send(&self, request: &WithdrawalRequest) -> Result<String, PaymentError>;
}

/// Build the executor selected by configuration (once, at startup)
pub fn build_executor(config: &PayoutConfig) -> Result<Arc<dyn PaymentExecutor>, PaymentError> {
    let executor: Arc<dyn PaymentExecutor> = match config {
        PayoutConfig::Simulator { delay_ms } => {
            Arc::new(SimulatedPayout::new(std::time::Duration::from_millis(*delay_ms)))
        }
        PayoutConfig::Http(cfg) => Arc::new(HttpPayout::new(cfg.clone())?),
        PayoutConfig::Piteas(cfg) => Arc::new(PiteasPayout::new(cfg.clone())?),
    };
    tracing::info!(executor = executor.name(), "Payout executor ready");
    Ok(executor)
}

pub(crate) fn default_timeout_secs() -> u64 {
    30
}

/// Build a `reqwest` client carrying the executor's total timeout
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, PaymentError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PaymentError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Map a payout response to its JSON body
///
/// Any status >= 400 is an error carrying the (trimmed) response body, or
/// the read error when the body itself cannot be read.
pub(crate) async fn read_json_response(response: reqwest::Response) -> Result<Value, PaymentError> {
    let status = response.status();
    if status.as_u16() >= 400 {
        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
        return Err(PaymentError::Status {
            status: status.as_u16(),
            body: body.trim().to_string(),
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| PaymentError::MalformedResponse(e.to_string()))
}

/// First non-empty value among `keys`, in priority order
///
/// Strings must be non-empty; numbers are rendered as-is.
pub fn extract_transaction_id(body: &Value, keys: &[&str]) -> Result<String, PaymentError> {
    let object = body.as_object().ok_or_else(|| {
        PaymentError::MalformedResponse(format!("expected a JSON object, got {}", body))
    })?;

    keys.iter()
        .filter_map(|key| match object.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .next()
        .ok_or(PaymentError::MissingTransactionId)
}
