use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    #[error("Refund intent not found: {intent_id}")]
    IntentNotFound { intent_id: String },

    #[error("Refund declined: {message}")]
    RefundDeclinedError {
        message: String,
        provider_code: Option<String>,
    },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimitError {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    #[error("Processor call timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Webhook verification failed: {message}")]
    WebhookVerificationError { message: String },

    #[error("Provider error: provider={provider}, message={message}")]
    ProviderError {
        provider: String,
        message: String,
        provider_code: Option<String>,
        retryable: bool,
    },
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::ValidationError { .. } => false,
            PaymentError::IntentNotFound { .. } => false,
            PaymentError::RefundDeclinedError { .. } => false,
            PaymentError::NetworkError { .. } => true,
            PaymentError::RateLimitError { .. } => true,
            PaymentError::Timeout { .. } => true,
            PaymentError::WebhookVerificationError { .. } => false,
            PaymentError::ProviderError { retryable, .. } => *retryable,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            PaymentError::ValidationError { message, .. } => message.clone(),
            PaymentError::IntentNotFound { intent_id } => {
                format!("Processor has no refund intent '{}'", intent_id)
            }
            PaymentError::RefundDeclinedError { message, .. } => {
                format!("Refund was declined by the processor: {}", message)
            }
            PaymentError::NetworkError { .. } => {
                "Payment processor is temporarily unavailable".to_string()
            }
            PaymentError::RateLimitError { .. } => {
                "Too many requests to payment processor. Please retry shortly".to_string()
            }
            PaymentError::Timeout { timeout_secs } => {
                format!("Payment processor did not answer within {} seconds", timeout_secs)
            }
            PaymentError::WebhookVerificationError { .. } => {
                "Invalid webhook signature".to_string()
            }
            PaymentError::ProviderError { message, .. } => {
                format!("Payment processor returned an error: {}", message)
            }
        }
    }
}

impl From<PaymentError> for crate::error::AppError {
    fn from(err: PaymentError) -> Self {
        use crate::error::{AppError, AppErrorKind, ExternalError};

        let kind = match &err {
            PaymentError::Timeout { timeout_secs } => ExternalError::Timeout {
                service: "Payment processor".to_string(),
                timeout_secs: *timeout_secs,
            },
            PaymentError::ProviderError { provider, .. } => ExternalError::PaymentProcessor {
                processor: provider.clone(),
                message: err.user_message(),
                is_retryable: err.is_retryable(),
            },
            _ => ExternalError::PaymentProcessor {
                processor: "refunds".to_string(),
                message: err.user_message(),
                is_retryable: err.is_retryable(),
            },
        };
        AppError::new(AppErrorKind::External(kind))
    }
}
