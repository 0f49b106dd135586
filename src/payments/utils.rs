use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::types::{IntentStatus, ProcessorName, WebhookEvent};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::warn;

pub const EVENT_INTENT_SUCCEEDED: &str = "refund_intent.succeeded";
pub const EVENT_INTENT_FAILED: &str = "refund_intent.failed";

#[derive(Clone)]
pub struct ProcessorHttpClient {
    client: Client,
    processor: ProcessorName,
    timeout: Duration,
    max_retries: u32,
}

impl ProcessorHttpClient {
    pub fn new(processor: ProcessorName, timeout: Duration, max_retries: u32) -> PaymentResult<Self> {
        let client =
            Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| PaymentError::NetworkError {
                    message: format!("failed to initialize HTTP client: {}", e),
                })?;

        Ok(Self {
            client,
            processor,
            timeout,
            max_retries,
        })
    }

    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        bearer_token: Option<&str>,
        body: Option<&JsonValue>,
        additional_headers: &[(&str, &str)],
    ) -> PaymentResult<T> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            let mut request = self.client.request(method.clone(), url);
            request = request.timeout(self.timeout);

            if let Some(token) = bearer_token {
                request = request.bearer_auth(token);
            }
            for (k, v) in additional_headers {
                request = request.header(*k, *v);
            }
            if let Some(payload) = body {
                request = request.json(payload);
            }

            let response = request
                .send()
                .await
                .map_err(|e| PaymentError::NetworkError {
                    message: format!("processor request failed: {}", e),
                });

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    if status.is_success() {
                        return serde_json::from_str::<T>(&text).map_err(|e| {
                            PaymentError::ProviderError {
                                provider: self.processor.to_string(),
                                message: format!("invalid processor JSON response: {}", e),
                                provider_code: None,
                                retryable: false,
                            }
                        });
                    }

                    if status.as_u16() == 429 {
                        if attempt < self.max_retries {
                            tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                            continue;
                        }
                        return Err(PaymentError::RateLimitError {
                            message: "processor rate limit exceeded".to_string(),
                            retry_after_seconds: None,
                        });
                    }

                    if status.is_server_error() && attempt < self.max_retries {
                        warn!(
                            status = %status,
                            attempt = attempt + 1,
                            processor = %self.processor,
                            "processor server error, retrying"
                        );
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }

                    return Err(PaymentError::ProviderError {
                        provider: self.processor.to_string(),
                        message: format!("HTTP {}: {}", status, text),
                        provider_code: Some(status.as_u16().to_string()),
                        retryable: status.is_server_error(),
                    });
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(PaymentError::NetworkError {
            message: "processor request failed".to_string(),
        }))
    }
}

type HmacSha256 = hmac::Hmac<sha2::Sha256>;

pub fn sign_hmac_sha256_hex(payload: &[u8], secret: &str) -> Option<String> {
    use hmac::Mac;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload);
    Some(hex::encode(mac.finalize().into_bytes()))
}

pub fn verify_hmac_sha256_hex(payload: &[u8], secret: &str, signature: &str) -> bool {
    let Some(computed) = sign_hmac_sha256_hex(payload, secret) else {
        return false;
    };
    let signature = signature.trim();
    let signature = signature.strip_prefix("sha256=").unwrap_or(signature);
    secure_eq(computed.as_bytes(), signature.to_lowercase().as_bytes())
}

pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Parse the processor's refund intent event envelope:
/// `{"id": "...", "type": "refund_intent.succeeded", "data": {"id": "ri_..", "status": "..", "failure_reason": ..}}`
pub fn parse_intent_event(processor: ProcessorName, payload: &[u8]) -> PaymentResult<WebhookEvent> {
    let parsed: JsonValue =
        serde_json::from_slice(payload).map_err(|e| PaymentError::WebhookVerificationError {
            message: format!("invalid webhook JSON payload: {}", e),
        })?;

    let event_type = parsed
        .get("type")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();
    let data = parsed.get("data");
    let intent_id = data
        .and_then(|v| v.get("id"))
        .and_then(|v| v.as_str())
        .map(|v| v.to_string());
    let status = data
        .and_then(|v| v.get("status"))
        .and_then(|v| v.as_str())
        .and_then(IntentStatus::parse_lenient)
        .or(match event_type.as_str() {
            EVENT_INTENT_SUCCEEDED => Some(IntentStatus::Succeeded),
            EVENT_INTENT_FAILED => Some(IntentStatus::Failed),
            _ => None,
        });
    let failure_reason = data
        .and_then(|v| v.get("failure_reason"))
        .and_then(|v| v.as_str())
        .map(|v| v.to_string());

    Ok(WebhookEvent {
        processor,
        event_id: parsed
            .get("id")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string()),
        event_type,
        intent_id,
        status,
        failure_reason,
        payload: parsed,
        received_at: chrono::Utc::now().to_rfc3339(),
    })
}
