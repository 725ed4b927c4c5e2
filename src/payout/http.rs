//! Generic HTTP payout executor
//!
//! Posts the withdrawal as JSON to a configured endpoint and reads the
//! transaction id back from the response.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{PaymentError, PaymentExecutor, extract_transaction_id, http_client, read_json_response};
use crate::withdrawal::{Metadata, RequestId, WithdrawalRequest};

/// Accepted response fields, highest priority first
const TX_ID_KEYS: &[&str] = &["transaction_id", "txid", "id"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpPayoutConfig {
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "super::default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct HttpPayoutPayload<'a> {
    request_id: RequestId,
    player_name: &'a str,
    wallet_address: &'a str,
    /// Exact decimal string, never a float
    amount: String,
    currency: &'a str,
    metadata: &'a Metadata,
}

impl<'a> HttpPayoutPayload<'a> {
    fn from_request(request: &'a WithdrawalRequest) -> Self {
        Self {
            request_id: request.id,
            player_name: &request.player_name,
            wallet_address: &request.wallet_address,
            amount: request.amount.to_string(),
            currency: &request.currency,
            metadata: &request.metadata,
        }
    }
}

#[derive(Debug)]
pub struct HttpPayout {
    config: HttpPayoutConfig,
    client: reqwest::Client,
}

impl HttpPayout {
    pub fn new(config: HttpPayoutConfig) -> Result<Self, PaymentError> {
        if config.endpoint.trim().is_empty() {
            return Err(PaymentError::Config(
                "Wallet endpoint must be provided".to_string(),
            ));
        }
        let client = http_client(config.timeout_secs)?;

        info!(endpoint = %config.endpoint, "Initializing HTTP payout executor");
        Ok(Self { config, client })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

#[async_trait]
impl PaymentExecutor for HttpPayout {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn send(&self, request: &WithdrawalRequest) -> Result<String, PaymentError> {
        let payload = HttpPayoutPayload::from_request(request);

        let mut builder = self.client.post(&self.config.endpoint).json(&payload);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let body = read_json_response(response).await?;
        let transaction_id = extract_transaction_id(&body, TX_ID_KEYS)?;

        info!(
            request_id = request.id,
            transaction_id = %transaction_id,
            "Wallet payout completed"
        );
        Ok(transaction_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::withdrawal::WithdrawalStatus;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::str::FromStr;

    fn request() -> WithdrawalRequest {
        let now = Utc::now();
        let mut metadata = Metadata::new();
        metadata.insert("server".into(), json!("lobby"));
        WithdrawalRequest {
            id: 12,
            player_name: "Steve".into(),
            player_uuid: Some("uuid".into()),
            wallet_address: "bc1qxyz".into(),
            amount: Decimal::from_str("0.10").unwrap(),
            currency: "BTC".into(),
            status: WithdrawalStatus::Processing,
            created_at: now,
            updated_at: now,
            metadata,
            review_message_id: None,
            handled_by: None,
            handled_by_id: None,
            transaction_id: None,
            failure_reason: None,
        }
    }

    #[test]
    fn test_payload_shape() {
        let req = request();
        let payload = serde_json::to_value(HttpPayoutPayload::from_request(&req)).unwrap();
        assert_eq!(
            payload,
            json!({
                "request_id": 12,
                "player_name": "Steve",
                "wallet_address": "bc1qxyz",
                "amount": "0.10",
                "currency": "BTC",
                "metadata": {"server": "lobby"},
            })
        );
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        let err = HttpPayout::new(HttpPayoutConfig {
            endpoint: " ".into(),
            api_key: None,
            timeout_secs: 5,
        })
        .unwrap_err();
        assert!(matches!(err, PaymentError::Config(_)));
    }

    #[test]
    fn test_config_defaults() {
        let cfg: HttpPayoutConfig =
            serde_yaml::from_str("endpoint: http://127.0.0.1:9000/payout").unwrap();
        assert_eq!(cfg.timeout_secs, 30);
        assert!(cfg.api_key.is_none());
    }
}
