use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::error::{AppError, AppErrorKind, AuthorizationError, DomainError, ValidationError};
use crate::logging::mask_identifier;
use crate::payments::types::{IntentStatus, WebhookEvent};
use crate::payments::utils::{EVENT_INTENT_FAILED, EVENT_INTENT_SUCCEEDED};
use crate::refunds::RefundStatus;
use crate::services::refund_lifecycle::{
    ProcessorEventOutcome, ProcessorOutcome, RefundLifecycleController,
};

#[derive(Debug, Error)]
pub enum WebhookProcessorError {
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Already processed")]
    AlreadyProcessed,
    #[error("Unknown refund intent: {0}")]
    UnknownIntent(String),
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Processing error: {0}")]
    ProcessingError(AppError),
}

impl From<WebhookProcessorError> for AppError {
    fn from(err: WebhookProcessorError) -> Self {
        match err {
            WebhookProcessorError::InvalidSignature => {
                AppError::new(AppErrorKind::Authorization(AuthorizationError::Unauthenticated {
                    reason: "invalid webhook signature".to_string(),
                }))
            }
            WebhookProcessorError::AlreadyProcessed => {
                AppError::new(AppErrorKind::Domain(DomainError::InvalidState {
                    refund_id: String::new(),
                    status: "resolved".to_string(),
                    action: "apply processor event".to_string(),
                }))
            }
            WebhookProcessorError::UnknownIntent(intent_id) => {
                AppError::new(AppErrorKind::Domain(DomainError::IntentNotFound { intent_id }))
            }
            WebhookProcessorError::InvalidPayload(reason) => {
                AppError::new(AppErrorKind::Validation(ValidationError::InvalidFormat {
                    field: "payload".to_string(),
                    reason,
                }))
            }
            WebhookProcessorError::ProcessingError(inner) => inner,
        }
    }
}

/// Result of a webhook that was accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied {
        refund_id: String,
        status: RefundStatus,
    },
    /// Event type the service does not act on
    Ignored { event_type: String },
    /// Outcome for an intent the administrator has not confirmed yet
    NotConfirmed { refund_id: String },
}

/// Verifies and applies refund intent callbacks from the processor.
pub struct WebhookProcessor {
    controller: Arc<RefundLifecycleController>,
}

impl WebhookProcessor {
    pub fn new(controller: Arc<RefundLifecycleController>) -> Self {
        Self { controller }
    }

    /// `payload` must be the raw request body; the signature covers its bytes.
    pub async fn process_webhook(
        &self,
        signature: Option<&str>,
        payload: &[u8],
    ) -> Result<WebhookOutcome, WebhookProcessorError> {
        let processor = self.controller.processor();
        let signature = signature
            .filter(|s| !s.trim().is_empty())
            .ok_or(WebhookProcessorError::InvalidSignature)?;

        let verification = processor
            .verify_webhook(payload, signature)
            .map_err(|e| WebhookProcessorError::ProcessingError(e.into()))?;
        if !verification.valid {
            error!(
                processor = %processor.name(),
                signature = %mask_identifier(signature),
                reason = ?verification.reason,
                "Invalid webhook signature"
            );
            return Err(WebhookProcessorError::InvalidSignature);
        }

        let event = processor
            .parse_webhook_event(payload)
            .map_err(|e| WebhookProcessorError::InvalidPayload(e.to_string()))?;

        let Some(outcome) = Self::outcome_of(&event) else {
            warn!(event_type = %event.event_type, "Unknown webhook event type");
            return Ok(WebhookOutcome::Ignored {
                event_type: event.event_type,
            });
        };

        let intent_id = event.intent_id.as_deref().ok_or_else(|| {
            WebhookProcessorError::InvalidPayload("missing refund intent id".to_string())
        })?;

        info!(
            event_id = ?event.event_id,
            event_type = %event.event_type,
            intent_id = %intent_id,
            "Processing refund intent webhook"
        );

        match self
            .controller
            .apply_processor_event(intent_id, outcome)
            .await
        {
            Ok(ProcessorEventOutcome::Applied(refund)) => {
                info!(refund_id = %refund.id, status = %refund.status, "Webhook processed successfully");
                Ok(WebhookOutcome::Applied {
                    refund_id: refund.id.to_string(),
                    status: refund.status,
                })
            }
            Ok(ProcessorEventOutcome::NotYetConfirmed(refund)) => {
                Ok(WebhookOutcome::NotConfirmed {
                    refund_id: refund.id.to_string(),
                })
            }
            Ok(ProcessorEventOutcome::AlreadyResolved(refund)) => {
                info!(refund_id = %refund.id, "Webhook already processed");
                Err(WebhookProcessorError::AlreadyProcessed)
            }
            Err(e) => match e.kind {
                AppErrorKind::Domain(DomainError::IntentNotFound { intent_id }) => {
                    warn!(intent_id = %intent_id, "Webhook for unknown refund intent");
                    Err(WebhookProcessorError::UnknownIntent(intent_id))
                }
                _ => {
                    warn!(intent_id = %intent_id, error = %e, "Webhook processing failed");
                    Err(WebhookProcessorError::ProcessingError(e))
                }
            },
        }
    }

    fn outcome_of(event: &WebhookEvent) -> Option<ProcessorOutcome> {
        match (event.event_type.as_str(), event.status) {
            (EVENT_INTENT_SUCCEEDED, _) | (_, Some(IntentStatus::Succeeded)) => {
                Some(ProcessorOutcome::Succeeded)
            }
            (EVENT_INTENT_FAILED, _)
            | (_, Some(IntentStatus::Failed))
            | (_, Some(IntentStatus::Cancelled)) => Some(ProcessorOutcome::Failed {
                reason: event.failure_reason.clone(),
            }),
            _ => None,
        }
    }
}
