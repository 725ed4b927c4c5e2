//! Gateway request/response types and error codes
//!
//! - `ApiResponse<T>`: unified response wrapper
//! - `ApiError`: `WithdrawalError` rendered as an HTTP response
//! - `error_codes`: numeric codes carried in `ApiResponse::code`

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::withdrawal::types::parse_exact_amount;
use crate::withdrawal::{Metadata, NewWithdrawal, WithdrawalError};

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or absent (error)
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: error_codes::SUCCESS,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

// ============================================================================
// Error Mapping
// ============================================================================

/// Error returned by every handler
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: error_codes::INVALID_PARAMETER,
            msg: msg.into(),
        }
    }
}

impl From<WithdrawalError> for ApiError {
    fn from(e: WithdrawalError) -> Self {
        let code = match &e {
            WithdrawalError::Validation(_) => error_codes::INVALID_PARAMETER,
            WithdrawalError::InvalidState { .. } => error_codes::INVALID_STATE,
            WithdrawalError::NotFound(_) => error_codes::WITHDRAWAL_NOT_FOUND,
            WithdrawalError::PaymentFailed { .. } => error_codes::PAYMENT_FAILED,
            WithdrawalError::StoreClosed => error_codes::SERVICE_UNAVAILABLE,
            WithdrawalError::Database(_) | WithdrawalError::CorruptRow { .. } => {
                error_codes::INTERNAL_ERROR
            }
        };
        let status =
            StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        // Storage details stay in the log
        let msg = if status.is_server_error() {
            tracing::error!(error = %e, code = e.code(), "Request failed");
            e.code().to_string()
        } else {
            e.to_string()
        };
        Self { status, code, msg }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::error(self.code, self.msg))).into_response()
    }
}

// ============================================================================
// Request DTOs
// ============================================================================

/// Amount as sent by the plugin: decimal string or JSON number
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Text(String),
    Number(serde_json::Number),
}

impl AmountInput {
    /// Exact decimal; input that would need rounding is rejected
    pub fn to_decimal(&self) -> Result<Decimal, String> {
        match self {
            AmountInput::Text(s) => parse_exact_amount(s),
            AmountInput::Number(n) => parse_exact_amount(&n.to_string()),
        }
    }
}

/// `POST /withdrawals` body
#[derive(Debug, Clone, Deserialize)]
pub struct CreateWithdrawalBody {
    pub player_name: String,
    pub wallet_address: String,
    pub amount: AmountInput,
    pub currency: String,
    #[serde(default)]
    pub player_uuid: Option<String>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

impl CreateWithdrawalBody {
    pub fn into_new_withdrawal(self) -> Result<NewWithdrawal, ApiError> {
        let amount = self.amount.to_decimal().map_err(ApiError::bad_request)?;
        let mut input = NewWithdrawal::new(
            self.player_name,
            self.wallet_address,
            amount,
            self.currency,
        )
        .with_metadata(self.metadata.unwrap_or_default());
        if let Some(uuid) = self.player_uuid.filter(|u| !u.is_empty()) {
            input = input.with_player_uuid(uuid);
        }
        Ok(input)
    }
}

/// `GET /withdrawals` query string
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<u32>,
}

// ============================================================================
// Response DTOs
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub git_hash: String,
    pub executor: String,
    pub timestamp_ms: i64,
}

// ============================================================================
// Error Codes
// ============================================================================

pub mod error_codes {
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const INVALID_STATE: i32 = 1002;

    // Resource errors (4xxx)
    pub const WITHDRAWAL_NOT_FOUND: i32 = 4001;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
    pub const PAYMENT_FAILED: i32 = 5002;
}
