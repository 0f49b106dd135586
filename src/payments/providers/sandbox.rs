//! In-process refund processor for local runs and tests.

use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::RefundProcessor;
use crate::payments::types::{
    IntentConfirmation, IntentStatus, ProcessorName, RefundIntent, RefundIntentRequest,
    WebhookEvent, WebhookVerificationResult,
};
use crate::payments::utils::{
    parse_intent_event, sign_hmac_sha256_hex, verify_hmac_sha256_hex, EVENT_INTENT_FAILED,
    EVENT_INTENT_SUCCEEDED,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

pub const SANDBOX_WEBHOOK_SECRET: &str = "whsec_sandbox";

/// How the sandbox answers the next calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxBehaviour {
    /// Intents are created and confirmations succeed immediately
    Succeed,
    FailIntentCreation,
    /// Confirmation errors out as if the processor were down
    FailConfirmation,
    /// Confirmation answers with a final `failed` status
    DeclineConfirmation,
    /// Confirmation answers `processing`; the outcome comes by webhook
    DeferConfirmation,
    /// Every call sleeps before succeeding
    Stall(Duration),
}

#[derive(Debug, Clone)]
struct SandboxIntent {
    request: RefundIntentRequest,
    status: IntentStatus,
}

pub struct SandboxProcessor {
    behaviour: Mutex<SandboxBehaviour>,
    intents: Mutex<HashMap<String, SandboxIntent>>,
    webhook_secret: String,
}

impl SandboxProcessor {
    pub fn new(behaviour: SandboxBehaviour) -> Self {
        Self::with_webhook_secret(behaviour, SANDBOX_WEBHOOK_SECRET)
    }

    pub fn with_webhook_secret(behaviour: SandboxBehaviour, secret: impl Into<String>) -> Self {
        Self {
            behaviour: Mutex::new(behaviour),
            intents: Mutex::new(HashMap::new()),
            webhook_secret: secret.into(),
        }
    }

    pub fn set_behaviour(&self, behaviour: SandboxBehaviour) {
        *lock(&self.behaviour) = behaviour;
    }

    pub fn behaviour(&self) -> SandboxBehaviour {
        *lock(&self.behaviour)
    }

    pub fn intent_count(&self) -> usize {
        lock(&self.intents).len()
    }

    pub fn intent_status(&self, intent_id: &str) -> Option<IntentStatus> {
        lock(&self.intents).get(intent_id).map(|i| i.status)
    }

    pub fn intent_request(&self, intent_id: &str) -> Option<RefundIntentRequest> {
        lock(&self.intents).get(intent_id).map(|i| i.request.clone())
    }

    /// Body of the webhook the sandbox would send for a deferred intent.
    pub fn event_payload(
        &self,
        intent_id: &str,
        succeeded: bool,
        failure_reason: Option<&str>,
    ) -> Vec<u8> {
        let (event_type, status) = if succeeded {
            (EVENT_INTENT_SUCCEEDED, "succeeded")
        } else {
            (EVENT_INTENT_FAILED, "failed")
        };
        serde_json::json!({
            "id": format!("evt_{}", Uuid::new_v4().simple()),
            "type": event_type,
            "data": {
                "id": intent_id,
                "status": status,
                "failure_reason": failure_reason,
            }
        })
        .to_string()
        .into_bytes()
    }

    pub fn sign(&self, payload: &[u8]) -> String {
        sign_hmac_sha256_hex(payload, &self.webhook_secret).unwrap_or_default()
    }

    async fn stall_if_configured(&self) {
        if let SandboxBehaviour::Stall(delay) = self.behaviour() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for SandboxProcessor {
    fn default() -> Self {
        Self::new(SandboxBehaviour::Succeed)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl RefundProcessor for SandboxProcessor {
    async fn create_refund_intent(
        &self,
        request: RefundIntentRequest,
    ) -> PaymentResult<RefundIntent> {
        request.amount.validate_positive("amount")?;
        self.stall_if_configured().await;

        if self.behaviour() == SandboxBehaviour::FailIntentCreation {
            return Err(PaymentError::ProviderError {
                provider: ProcessorName::Sandbox.to_string(),
                message: "sandbox configured to reject intent creation".to_string(),
                provider_code: Some("intent_creation_failed".to_string()),
                retryable: false,
            });
        }

        let mut intents = lock(&self.intents);
        if let Some((id, existing)) = intents
            .iter()
            .find(|(_, i)| i.request.idempotency_key == request.idempotency_key)
        {
            return Ok(RefundIntent {
                intent_id: id.clone(),
                status: existing.status,
                amount: existing.request.amount.clone(),
                provider_data: None,
            });
        }

        let intent_id = format!("ri_sandbox_{}", Uuid::new_v4().simple());
        let amount = request.amount.clone();
        intents.insert(
            intent_id.clone(),
            SandboxIntent {
                request,
                status: IntentStatus::RequiresConfirmation,
            },
        );
        info!(intent_id = %intent_id, amount = %amount.amount, "sandbox refund intent created");

        Ok(RefundIntent {
            intent_id,
            status: IntentStatus::RequiresConfirmation,
            amount,
            provider_data: Some(serde_json::json!({ "sandbox": true })),
        })
    }

    async fn confirm_refund_intent(&self, intent_id: &str) -> PaymentResult<IntentConfirmation> {
        self.stall_if_configured().await;

        let behaviour = self.behaviour();
        let mut intents = lock(&self.intents);
        let intent = intents
            .get_mut(intent_id)
            .ok_or_else(|| PaymentError::IntentNotFound {
                intent_id: intent_id.to_string(),
            })?;

        let (status, failure_reason) = match behaviour {
            SandboxBehaviour::FailConfirmation => {
                return Err(PaymentError::ProviderError {
                    provider: ProcessorName::Sandbox.to_string(),
                    message: "sandbox configured to fail confirmation".to_string(),
                    provider_code: Some("confirmation_failed".to_string()),
                    retryable: true,
                })
            }
            SandboxBehaviour::DeclineConfirmation => (
                IntentStatus::Failed,
                Some("sandbox declined the refund".to_string()),
            ),
            SandboxBehaviour::DeferConfirmation => (IntentStatus::Processing, None),
            SandboxBehaviour::Succeed
            | SandboxBehaviour::FailIntentCreation
            | SandboxBehaviour::Stall(_) => (IntentStatus::Succeeded, None),
        };
        intent.status = status;

        Ok(IntentConfirmation {
            intent_id: intent_id.to_string(),
            status,
            failure_reason,
        })
    }

    fn name(&self) -> ProcessorName {
        ProcessorName::Sandbox
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> PaymentResult<WebhookVerificationResult> {
        let valid = verify_hmac_sha256_hex(payload, &self.webhook_secret, signature);
        Ok(WebhookVerificationResult {
            valid,
            reason: if valid {
                None
            } else {
                Some("invalid sandbox signature".to_string())
            },
        })
    }

    fn parse_webhook_event(&self, payload: &[u8]) -> PaymentResult<WebhookEvent> {
        parse_intent_event(ProcessorName::Sandbox, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::types::Money;

    fn intent_request(key: &str) -> RefundIntentRequest {
        RefundIntentRequest {
            refund_id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            amount: Money {
                amount: "4800.00".to_string(),
                currency: "PHP".to_string(),
            },
            reason: Some("guest cancelled".to_string()),
            idempotency_key: key.to_string(),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn succeed_behaviour_confirms_intents() {
        let sandbox = SandboxProcessor::default();
        let intent = sandbox.create_refund_intent(intent_request("k1")).await.unwrap();
        let confirmation = sandbox.confirm_refund_intent(&intent.intent_id).await.unwrap();
        assert_eq!(confirmation.status, IntentStatus::Succeeded);
        assert_eq!(
            sandbox.intent_status(&intent.intent_id),
            Some(IntentStatus::Succeeded)
        );
    }

    #[tokio::test]
    async fn same_idempotency_key_returns_same_intent() {
        let sandbox = SandboxProcessor::default();
        let first = sandbox.create_refund_intent(intent_request("same")).await.unwrap();
        let second = sandbox.create_refund_intent(intent_request("same")).await.unwrap();
        assert_eq!(first.intent_id, second.intent_id);
        assert_eq!(sandbox.intent_count(), 1);
    }

    #[tokio::test]
    async fn configured_failures() {
        let sandbox = SandboxProcessor::new(SandboxBehaviour::FailIntentCreation);
        assert!(sandbox.create_refund_intent(intent_request("k")).await.is_err());

        sandbox.set_behaviour(SandboxBehaviour::Succeed);
        let intent = sandbox.create_refund_intent(intent_request("k")).await.unwrap();

        sandbox.set_behaviour(SandboxBehaviour::DeclineConfirmation);
        let confirmation = sandbox.confirm_refund_intent(&intent.intent_id).await.unwrap();
        assert_eq!(confirmation.status, IntentStatus::Failed);
        assert!(confirmation.failure_reason.is_some());

        assert!(matches!(
            sandbox.confirm_refund_intent("ri_unknown").await,
            Err(PaymentError::IntentNotFound { .. })
        ));
    }

    #[test]
    fn signed_events_verify() {
        let sandbox = SandboxProcessor::default();
        let payload = sandbox.event_payload("ri_1", false, Some("bank rejected"));
        let signature = sandbox.sign(&payload);

        assert!(sandbox.verify_webhook(&payload, &signature).unwrap().valid);
        assert!(!sandbox.verify_webhook(&payload, "deadbeef").unwrap().valid);

        let event = sandbox.parse_webhook_event(&payload).unwrap();
        assert_eq!(event.intent_id.as_deref(), Some("ri_1"));
        assert_eq!(event.status, Some(IntentStatus::Failed));
        assert_eq!(event.failure_reason.as_deref(), Some("bank rejected"));
    }
}
