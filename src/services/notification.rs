use crate::refunds::{RefundRequest, RefundStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NotificationType {
    RefundRequested,
    RefundApproved,
    RefundUnderManualReview,
    RefundRejected,
    RefundProcessing,
    RefundCompleted,
    RefundPartiallyCompleted,
    RefundFailed,
}

impl NotificationType {
    /// The customer-facing notification for entering `status`.
    pub fn for_status(status: RefundStatus) -> Self {
        match status {
            RefundStatus::Pending => NotificationType::RefundRequested,
            RefundStatus::Approved => NotificationType::RefundApproved,
            RefundStatus::ManualReview => NotificationType::RefundUnderManualReview,
            RefundStatus::Rejected => NotificationType::RefundRejected,
            RefundStatus::Processing => NotificationType::RefundProcessing,
            RefundStatus::Completed => NotificationType::RefundCompleted,
            RefundStatus::PartialCompleted => NotificationType::RefundPartiallyCompleted,
            RefundStatus::Failed => NotificationType::RefundFailed,
        }
    }
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Delivers lifecycle notifications to the customer.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify(
        &self,
        refund: &RefundRequest,
        notification_type: NotificationType,
        message: &str,
    ) -> Result<(), NotificationError>;
}

/// Log-only dispatcher; stands in until a real channel (email, push) is wired.
#[derive(Debug, Default)]
pub struct NotificationService;

impl NotificationService {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationDispatcher for NotificationService {
    async fn notify(
        &self,
        refund: &RefundRequest,
        notification_type: NotificationType,
        message: &str,
    ) -> Result<(), NotificationError> {
        match notification_type {
            NotificationType::RefundFailed | NotificationType::RefundRejected => {
                warn!(
                    refund_id = %refund.id,
                    client_id = %refund.client_id,
                    status = %refund.status,
                    "🔔 NOTIFICATION: {:?} - {}", notification_type, message
                );
            }
            _ => {
                info!(
                    refund_id = %refund.id,
                    client_id = %refund.client_id,
                    status = %refund.status,
                    amount = %refund.refund_amount,
                    "🔔 NOTIFICATION: {:?} - {}", notification_type, message
                );
            }
        }
        Ok(())
    }
}
