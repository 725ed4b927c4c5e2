//! Piteas payout rail
//!
//! Talks to a (self-hosted) Piteas API instance:
//! `POST {base}/api/projects/{project}/wallets/{wallet}/withdrawals`

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{PaymentError, PaymentExecutor, extract_transaction_id, http_client, read_json_response};
use crate::withdrawal::{Metadata, RequestId, WithdrawalRequest};

pub const DEFAULT_BASE_URL: &str = "https://api.piteas.io";

/// Accepted response fields, highest priority first
const TX_ID_KEYS: &[&str] = &["transactionHash", "transaction_id", "txid", "id"];

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiteasConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub wallet_id: String,
    #[serde(default)]
    pub asset_symbol: String,
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default = "super::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl PiteasConfig {
    /// Required settings that are absent or blank
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("api_key", &self.api_key),
            ("project_id", &self.project_id),
            ("wallet_id", &self.wallet_id),
            ("asset_symbol", &self.asset_symbol),
            ("network", &self.network),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PiteasPayload<'a> {
    address: &'a str,
    amount: String,
    asset: &'a str,
    network: &'a str,
    external_id: RequestId,
    player_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a Metadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memo: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<&'a str>,
}

#[derive(Debug)]
pub struct PiteasPayout {
    endpoint: Url,
    api_key: String,
    asset_symbol: String,
    network: String,
    priority: Option<String>,
    client: reqwest::Client,
}

impl PiteasPayout {
    pub fn new(config: PiteasConfig) -> Result<Self, PaymentError> {
        let missing = config.missing_fields();
        if !missing.is_empty() {
            return Err(PaymentError::Config(format!(
                "Piteas wallet provider selected but missing required settings: {}",
                missing.join(", ")
            )));
        }

        let endpoint = withdrawals_endpoint(&config.base_url, &config.project_id, &config.wallet_id)?;
        let client = http_client(config.timeout_secs)?;

        info!(
            endpoint = %endpoint,
            asset = %config.asset_symbol,
            network = %config.network,
            "Initializing Piteas payout executor"
        );

        Ok(Self {
            endpoint,
            api_key: config.api_key,
            asset_symbol: config.asset_symbol,
            network: config.network,
            priority: config.priority.filter(|p| !p.trim().is_empty()),
            client,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn payload<'a>(&'a self, request: &'a WithdrawalRequest) -> PiteasPayload<'a> {
        PiteasPayload {
            address: &request.wallet_address,
            amount: request.amount.to_string(),
            asset: &self.asset_symbol,
            network: &self.network,
            external_id: request.id,
            player_name: &request.player_name,
            metadata: Some(&request.metadata).filter(|m| !m.is_empty()),
            memo: request.memo(),
            priority: self.priority.as_deref(),
        }
    }
}

/// `{base}/api/projects/{project}/wallets/{wallet}/withdrawals`
fn withdrawals_endpoint(base_url: &str, project_id: &str, wallet_id: &str) -> Result<Url, PaymentError> {
    let mut url = Url::parse(base_url).map_err(|_| {
        PaymentError::Config("Piteas base URL must include a scheme (e.g. https://)".to_string())
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(PaymentError::Config(format!(
            "Piteas base URL has unsupported scheme: {}",
            url.scheme()
        )));
    }

    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| PaymentError::Config(format!("Invalid Piteas base URL: {}", base_url)))?;
        segments.pop_if_empty().extend([
            "api",
            "projects",
            project_id,
            "wallets",
            wallet_id,
            "withdrawals",
        ]);
    }
    Ok(url)
}

#[async_trait]
impl PaymentExecutor for PiteasPayout {
    fn name(&self) -> &'static str {
        "piteas"
    }

    async fn send(&self, request: &WithdrawalRequest) -> Result<String, PaymentError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&self.payload(request))
            .send()
            .await?;

        let body = read_json_response(response).await?;
        let transaction_id = extract_transaction_id(&body, TX_ID_KEYS)?;

        info!(
            request_id = request.id,
            transaction_id = %transaction_id,
            "Piteas payout completed"
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

    fn config() -> PiteasConfig {
        PiteasConfig {
            base_url: "https://wallet.example.com/".into(),
            api_key: "secret".into(),
            project_id: "proj-1".into(),
            wallet_id: "hot wallet".into(),
            asset_symbol: "USDT".into(),
            network: "tron".into(),
            priority: None,
            timeout_secs: 10,
        }
    }

    fn request(metadata: Metadata) -> WithdrawalRequest {
        let now = Utc::now();
        WithdrawalRequest {
            id: 77,
            player_name: "Alex".into(),
            player_uuid: None,
            wallet_address: "TXYZ".into(),
            amount: Decimal::new(2500, 2),
            currency: "USDT".into(),
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
    fn test_endpoint_path() {
        let payout = PiteasPayout::new(config()).unwrap();
        assert_eq!(
            payout.endpoint().as_str(),
            "https://wallet.example.com/api/projects/proj-1/wallets/hot%20wallet/withdrawals"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let url = withdrawals_endpoint("http://localhost:8080/piteas", "p", "w").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/piteas/api/projects/p/wallets/w/withdrawals"
        );
    }

    #[test]
    fn test_base_url_requires_scheme() {
        let mut cfg = config();
        cfg.base_url = "wallet.example.com".into();
        let err = PiteasPayout::new(cfg).unwrap_err();
        assert!(err.to_string().contains("scheme"));
    }

    #[test]
    fn test_missing_fields_reported_together() {
        let mut cfg = config();
        cfg.api_key.clear();
        cfg.network = " ".into();
        assert_eq!(cfg.missing_fields(), vec!["api_key", "network"]);

        let err = PiteasPayout::new(cfg).unwrap_err();
        assert!(err.to_string().contains("api_key, network"));
    }

    #[test]
    fn test_minimal_payload() {
        let payout = PiteasPayout::new(config()).unwrap();
        let req = request(Metadata::new());
        let payload = serde_json::to_value(payout.payload(&req)).unwrap();
        assert_eq!(
            payload,
            json!({
                "address": "TXYZ",
                "amount": "25.00",
                "asset": "USDT",
                "network": "tron",
                "externalId": 77,
                "playerName": "Alex",
            })
        );
    }

    #[test]
    fn test_payload_with_memo_and_priority() {
        let mut cfg = config();
        cfg.priority = Some("high".into());
        let payout = PiteasPayout::new(cfg).unwrap();

        let mut metadata = Metadata::new();
        metadata.insert("memo".into(), json!("12345"));
        let req = request(metadata);
        let payload = serde_json::to_value(payout.payload(&req)).unwrap();

        assert_eq!(payload["memo"], json!("12345"));
        assert_eq!(payload["priority"], json!("high"));
        assert_eq!(payload["metadata"], json!({"memo": "12345"}));
    }

    #[test]
    fn test_numeric_memo_forwarded() {
        let mut cfg = config();
        cfg.asset_symbol = "XRP".into();
        cfg.network = "xrpl".into();
        let payout = PiteasPayout::new(cfg).unwrap();

        let mut metadata = Metadata::new();
        metadata.insert("memo".into(), json!(12345));
        let req = request(metadata);
        let payload = serde_json::to_value(payout.payload(&req)).unwrap();

        assert_eq!(payload["memo"], json!(12345));
        assert_eq!(payload["metadata"], json!({"memo": 12345}));
    }

    #[test]
    fn test_empty_memo_omitted() {
        let payout = PiteasPayout::new(config()).unwrap();
        let mut metadata = Metadata::new();
        metadata.insert("memo".into(), json!(""));
        let payload = serde_json::to_value(payout.payload(&request(metadata))).unwrap();
        assert!(payload.get("memo").is_none());
    }
}
