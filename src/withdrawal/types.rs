//! Withdrawal Type Definitions

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::{Validate, ValidationError};

use super::state::WithdrawalStatus;

/// Store-assigned identity of a withdrawal request
pub type RequestId = i64;

/// Opaque key-value context supplied by the plugin
pub type Metadata = Map<String, Value>;

/// Persisted withdrawal request
///
/// Serialized with `amount` as an exact decimal string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: RequestId,
    pub player_name: String,
    pub player_uuid: Option<String>,
    pub wallet_address: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: WithdrawalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: Metadata,
    /// Presentation-layer message that renders this request
    pub review_message_id: Option<i64>,
    /// Display name of the approving/rejecting actor
    pub handled_by: Option<String>,
    pub handled_by_id: Option<i64>,
    /// Payment network transaction id, present iff approved
    pub transaction_id: Option<String>,
    pub failure_reason: Option<String>,
}

impl WithdrawalRequest {
    /// Memo / destination tag for the payment rail, taken from `metadata.memo`
    ///
    /// Forwarded as-is (numeric tags stay numbers); null, `false`, zero and
    /// empty values count as absent.
    pub fn memo(&self) -> Option<&Value> {
        self.metadata.get("memo").filter(|m| is_present(m))
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

// === Exact amount parsing ===

/// Largest scale a `Decimal` holds
const MAX_AMOUNT_SCALE: u32 = 28;

/// Parse a decimal amount without any rounding
///
/// Plain notation goes through `Decimal::from_str_exact`. Scientific
/// notation is applied to the exact mantissa by rescaling, so more than 28
/// fractional digits or an overflow is an error instead of a rounded value.
pub fn parse_exact_amount(raw: &str) -> Result<Decimal, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("amount cannot be empty".to_string());
    }

    let Some((mantissa, exponent)) = raw.split_once(['e', 'E']) else {
        return Decimal::from_str_exact(raw)
            .map_err(|e| format!("invalid amount {:?}: {}", raw, e));
    };

    let mut value = Decimal::from_str_exact(mantissa)
        .map_err(|e| format!("invalid amount {:?}: {}", raw, e))?;
    let exponent: i32 = exponent
        .parse()
        .map_err(|_| format!("invalid amount {:?}: bad exponent", raw))?;

    if exponent < 0 {
        let scale = i64::from(value.scale()) - i64::from(exponent);
        let scale = u32::try_from(scale)
            .ok()
            .filter(|s| *s <= MAX_AMOUNT_SCALE)
            .ok_or_else(|| format!("invalid amount {:?}: too many fractional digits", raw))?;
        value
            .set_scale(scale)
            .map_err(|e| format!("invalid amount {:?}: {}", raw, e))?;
    } else {
        for _ in 0..exponent {
            value = value
                .checked_mul(Decimal::TEN)
                .ok_or_else(|| format!("invalid amount {:?}: out of range", raw))?;
        }
    }
    Ok(value)
}

/// Decimal string or JSON number, parsed exactly
pub(crate) fn deserialize_exact_amount<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum AmountOrString {
        String(String),
        Number(serde_json::Number),
    }

    let raw = match AmountOrString::deserialize(deserializer)? {
        AmountOrString::String(s) => s,
        AmountOrString::Number(n) => n.to_string(),
    };
    parse_exact_amount(&raw).map_err(D::Error::custom)
}

/// Input for creating a withdrawal request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewWithdrawal {
    #[validate(custom(function = "non_blank"))]
    pub player_name: String,
    #[validate(custom(function = "non_blank"))]
    pub wallet_address: String,
    #[validate(custom(function = "positive_amount"))]
    #[serde(deserialize_with = "deserialize_exact_amount")]
    pub amount: Decimal,
    #[validate(custom(function = "non_blank"))]
    pub currency: String,
    #[serde(default)]
    pub player_uuid: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl NewWithdrawal {
    pub fn new(
        player_name: impl Into<String>,
        wallet_address: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            player_name: player_name.into(),
            wallet_address: wallet_address.into(),
            amount,
            currency: currency.into(),
            player_uuid: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_player_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.player_uuid = Some(uuid.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

fn non_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some(Cow::Borrowed("must not be empty"));
        return Err(err);
    }
    Ok(())
}

fn positive_amount(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        let mut err = ValidationError::new("non_positive");
        err.message = Some(Cow::Borrowed("must be greater than zero"));
        return Err(err);
    }
    Ok(())
}
