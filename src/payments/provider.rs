use crate::payments::error::PaymentResult;
use crate::payments::types::{
    IntentConfirmation, ProcessorName, RefundIntent, RefundIntentRequest, WebhookEvent,
    WebhookVerificationResult,
};
use async_trait::async_trait;

/// External processor that returns platform-held funds to the customer.
///
/// Refunds are two-step: an intent is created when an administrator approves
/// the request and confirmed later to move the money. A confirmation may
/// answer `processing`, in which case the final outcome arrives as a signed
/// webhook.
#[async_trait]
pub trait RefundProcessor: Send + Sync {
    async fn create_refund_intent(&self, request: RefundIntentRequest)
        -> PaymentResult<RefundIntent>;

    async fn confirm_refund_intent(&self, intent_id: &str) -> PaymentResult<IntentConfirmation>;

    fn name(&self) -> ProcessorName;

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> PaymentResult<WebhookVerificationResult>;

    fn parse_webhook_event(&self, payload: &[u8]) -> PaymentResult<WebhookEvent>;
}
