use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::RefundProcessor;
use crate::payments::types::{
    IntentConfirmation, IntentStatus, Money, ProcessorName, RefundIntent, RefundIntentRequest,
    WebhookEvent, WebhookVerificationResult,
};
use crate::payments::utils::{parse_intent_event, verify_hmac_sha256_hex, ProcessorHttpClient};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct HttpProcessorConfig {
    pub base_url: String,
    pub secret_key: String,
    pub webhook_secret: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for HttpProcessorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4010".to_string(),
            secret_key: String::new(),
            webhook_secret: None,
            timeout_secs: 15,
            max_retries: 2,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    status: String,
    amount: i64,
    currency: String,
    #[serde(default)]
    failure_reason: Option<String>,
    #[serde(default)]
    metadata: Option<JsonValue>,
}

/// Refund processor spoken to over JSON/HTTP.
///
/// `POST {base}/v1/refund_intents` creates an intent,
/// `POST {base}/v1/refund_intents/{id}/confirm` confirms it. Amounts travel in
/// minor units and every call carries the secret key as a bearer token.
pub struct HttpRefundProcessor {
    config: HttpProcessorConfig,
    http: ProcessorHttpClient,
}

impl HttpRefundProcessor {
    pub fn new(config: HttpProcessorConfig) -> PaymentResult<Self> {
        if config.secret_key.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "PROCESSOR_SECRET_KEY is required for the http processor".to_string(),
                field: Some("PROCESSOR_SECRET_KEY".to_string()),
            });
        }
        let http = ProcessorHttpClient::new(
            ProcessorName::Http,
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )?;
        Ok(Self { config, http })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn status_of(raw: &str) -> PaymentResult<IntentStatus> {
        IntentStatus::parse_lenient(raw).ok_or_else(|| PaymentError::ProviderError {
            provider: ProcessorName::Http.to_string(),
            message: format!("unknown intent status '{}'", raw),
            provider_code: None,
            retryable: false,
        })
    }
}

#[async_trait]
impl RefundProcessor for HttpRefundProcessor {
    async fn create_refund_intent(
        &self,
        request: RefundIntentRequest,
    ) -> PaymentResult<RefundIntent> {
        request.amount.validate_positive("amount")?;

        let payload = serde_json::json!({
            "amount": request.amount.minor_units()?,
            "currency": request.amount.currency,
            "reference": request.refund_id,
            "booking_id": request.booking_id,
            "reason": request.reason,
            "metadata": request.metadata,
        });

        let raw: IntentResponse = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/v1/refund_intents"),
                Some(&self.config.secret_key),
                Some(&payload),
                &[
                    ("Content-Type", "application/json"),
                    ("Idempotency-Key", request.idempotency_key.as_str()),
                ],
            )
            .await?;

        info!(intent_id = %raw.id, refund_id = %request.refund_id, "refund intent created");

        Ok(RefundIntent {
            status: Self::status_of(&raw.status)?,
            amount: Money::from_minor_units(raw.amount, raw.currency),
            intent_id: raw.id,
            provider_data: raw.metadata,
        })
    }

    async fn confirm_refund_intent(&self, intent_id: &str) -> PaymentResult<IntentConfirmation> {
        let idempotency_key = format!("confirm-{}", intent_id);
        let result: PaymentResult<IntentResponse> = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint(&format!("/v1/refund_intents/{}/confirm", intent_id)),
                Some(&self.config.secret_key),
                None,
                &[("Idempotency-Key", idempotency_key.as_str())],
            )
            .await;

        let raw = match result {
            Ok(raw) => raw,
            Err(PaymentError::ProviderError { provider_code, .. })
                if provider_code.as_deref() == Some("404") =>
            {
                return Err(PaymentError::IntentNotFound {
                    intent_id: intent_id.to_string(),
                })
            }
            Err(e) => return Err(e),
        };

        Ok(IntentConfirmation {
            status: Self::status_of(&raw.status)?,
            intent_id: raw.id,
            failure_reason: raw.failure_reason,
        })
    }

    fn name(&self) -> ProcessorName {
        ProcessorName::Http
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> PaymentResult<WebhookVerificationResult> {
        let secret = self
            .config
            .webhook_secret
            .as_deref()
            .unwrap_or(&self.config.secret_key);
        let valid = verify_hmac_sha256_hex(payload, secret, signature);
        Ok(WebhookVerificationResult {
            valid,
            reason: if valid {
                None
            } else {
                Some("invalid processor signature".to_string())
            },
        })
    }

    fn parse_webhook_event(&self, payload: &[u8]) -> PaymentResult<WebhookEvent> {
        parse_intent_event(ProcessorName::Http, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::utils::sign_hmac_sha256_hex;

    fn processor() -> HttpRefundProcessor {
        HttpRefundProcessor::new(HttpProcessorConfig {
            secret_key: "sk_test".to_string(),
            webhook_secret: Some("whsec_test".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn requires_secret_key() {
        assert!(HttpRefundProcessor::new(HttpProcessorConfig::default()).is_err());
    }

    #[test]
    fn endpoint_joins_base_url() {
        let p = HttpRefundProcessor::new(HttpProcessorConfig {
            base_url: "https://processor.test/".to_string(),
            secret_key: "sk".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            p.endpoint("/v1/refund_intents"),
            "https://processor.test/v1/refund_intents"
        );
    }

    #[test]
    fn webhook_signature_uses_webhook_secret() {
        let p = processor();
        let payload = br#"{"type":"refund_intent.succeeded","data":{"id":"ri_1"}}"#;
        let good = sign_hmac_sha256_hex(payload, "whsec_test").unwrap();
        let bad = sign_hmac_sha256_hex(payload, "sk_test").unwrap();

        assert!(p.verify_webhook(payload, &good).unwrap().valid);
        let result = p.verify_webhook(payload, &bad).unwrap();
        assert!(!result.valid);
        assert!(result.reason.is_some());

        let event = p.parse_webhook_event(payload).unwrap();
        assert_eq!(event.status, Some(IntentStatus::Succeeded));
        assert_eq!(event.processor, ProcessorName::Http);
    }
}
