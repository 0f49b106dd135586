use crate::payments::error::PaymentError;
use bigdecimal::{BigDecimal, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorName {
    Sandbox,
    Http,
}

impl ProcessorName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessorName::Sandbox => "sandbox",
            ProcessorName::Http => "http",
        }
    }
}

impl std::fmt::Display for ProcessorName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProcessorName {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "sandbox" => Ok(ProcessorName::Sandbox),
            "http" => Ok(ProcessorName::Http),
            _ => Err(PaymentError::ValidationError {
                message: format!("unsupported processor mode: {}", value),
                field: Some("PROCESSOR_MODE".to_string()),
            }),
        }
    }
}

/// Decimal amount as a string plus ISO currency code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Money {
    pub amount: String,
    pub currency: String,
}

impl Money {
    pub fn new(amount: &BigDecimal, currency: impl Into<String>) -> Self {
        Self {
            amount: amount.with_scale(2).to_string(),
            currency: currency.into(),
        }
    }

    pub fn decimal(&self) -> Result<BigDecimal, PaymentError> {
        BigDecimal::from_str(&self.amount).map_err(|_| PaymentError::ValidationError {
            message: format!("invalid decimal amount: {}", self.amount),
            field: Some("amount".to_string()),
        })
    }

    pub fn validate_positive(&self, field: &str) -> Result<(), PaymentError> {
        let parsed = self.decimal()?;
        if parsed <= BigDecimal::zero() {
            return Err(PaymentError::ValidationError {
                message: "amount must be greater than zero".to_string(),
                field: Some(field.to_string()),
            });
        }
        if self.currency.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "currency is required".to_string(),
                field: Some("currency".to_string()),
            });
        }
        Ok(())
    }

    /// Amount in the currency's minor unit (centavos for PHP).
    pub fn minor_units(&self) -> Result<i64, PaymentError> {
        let scaled = (self.decimal()? * BigDecimal::from(100)).with_scale(0);
        scaled.to_i64().ok_or_else(|| PaymentError::ValidationError {
            message: format!("amount out of range: {}", self.amount),
            field: Some("amount".to_string()),
        })
    }

    pub fn from_minor_units(minor: i64, currency: impl Into<String>) -> Self {
        Self::new(&(BigDecimal::from(minor) / BigDecimal::from(100)), currency)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresConfirmation,
    Processing,
    Succeeded,
    Failed,
    Cancelled,
}

impl IntentStatus {
    pub fn parse_lenient(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "requires_confirmation" | "created" => Some(IntentStatus::RequiresConfirmation),
            "processing" | "pending" => Some(IntentStatus::Processing),
            "succeeded" | "success" => Some(IntentStatus::Succeeded),
            "failed" | "declined" => Some(IntentStatus::Failed),
            "cancelled" | "canceled" => Some(IntentStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundIntentRequest {
    pub refund_id: Uuid,
    pub booking_id: Uuid,
    pub amount: Money,
    pub reason: Option<String>,
    /// Stable per refund and approval so a retried create is not duplicated
    pub idempotency_key: String,
    pub metadata: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundIntent {
    pub intent_id: String,
    pub status: IntentStatus,
    pub amount: Money,
    pub provider_data: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentConfirmation {
    pub intent_id: String,
    pub status: IntentStatus,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookVerificationResult {
    pub valid: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub processor: ProcessorName,
    pub event_id: Option<String>,
    pub event_type: String,
    pub intent_id: Option<String>,
    pub status: Option<IntentStatus>,
    pub failure_reason: Option<String>,
    pub payload: JsonValue,
    pub received_at: String,
}
