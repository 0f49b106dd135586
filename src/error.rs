//! Error handling for the refund service
//!
//! This module provides a unified error system with HTTP status mapping,
//! user-friendly messages, and structured error codes for client handling.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::refunds::{BreakdownError, InvalidTransition, PolicyError};

/// Machine-readable error codes returned to API clients
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Domain errors (4xx)
    #[serde(rename = "INVALID_STATE")]
    InvalidState,
    #[serde(rename = "NOT_FOUND")]
    NotFound,
    #[serde(rename = "DUPLICATE_REQUEST")]
    DuplicateRequest,
    #[serde(rename = "BOOKING_NOT_REFUNDABLE")]
    BookingNotRefundable,
    #[serde(rename = "CONCURRENT_MODIFICATION")]
    ConcurrentModification,

    // Caller errors
    #[serde(rename = "UNAUTHORIZED")]
    Unauthorized,
    #[serde(rename = "FORBIDDEN")]
    Forbidden,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,

    // Infrastructure errors (5xx)
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "CACHE_ERROR")]
    CacheError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,

    // External errors (502, 504)
    #[serde(rename = "PROCESSOR_ERROR")]
    ProcessorError,

    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

/// Business rule violations in the refund lifecycle
#[derive(Debug, Clone)]
pub enum DomainError {
    /// The requested action is not legal from the refund's current status
    InvalidState {
        refund_id: String,
        status: String,
        action: String,
    },
    RefundNotFound { refund_id: String },
    BookingNotFound { booking_id: String },
    /// No refund request carries the given processor intent
    IntentNotFound { intent_id: String },
    /// An active refund request already exists for the booking
    DuplicateRequest {
        booking_id: String,
        existing_refund_id: Option<String>,
    },
    BookingNotRefundable { booking_id: String, reason: String },
    /// Another writer changed the request since it was read
    ConcurrentModification { refund_id: String },
}

impl DomainError {
    pub fn invalid_state(refund_id: impl ToString, transition: InvalidTransition) -> Self {
        DomainError::InvalidState {
            refund_id: refund_id.to_string(),
            status: transition.from.to_string(),
            action: transition.action.to_string(),
        }
    }
}

/// Infrastructure-level errors (database, cache, configuration)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    Database { message: String, is_retryable: bool },
    Cache { message: String },
    Configuration { message: String },
}

/// Payment processor errors. A timed out call is still a processor error for
/// clients; only the status differs.
#[derive(Debug, Clone)]
pub enum ExternalError {
    PaymentProcessor {
        processor: String,
        message: String,
        is_retryable: bool,
    },
    Timeout { service: String, timeout_secs: u64 },
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    MissingField { field: String },
    /// Trimmed text shorter than the required minimum
    TooShort { field: String, min: usize },
    InvalidAmount { amount: String, reason: String },
    InvalidFormat { field: String, reason: String },
    OutOfRange {
        field: String,
        min: Option<String>,
        max: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub enum AuthorizationError {
    /// Identity headers are missing or malformed
    Unauthenticated { reason: String },
    Forbidden { reason: String },
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Validation(ValidationError),
    Authorization(AuthorizationError),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
            context: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::InvalidState { .. } => 409,
                DomainError::RefundNotFound { .. } => 404,
                DomainError::BookingNotFound { .. } => 404,
                DomainError::IntentNotFound { .. } => 404,
                DomainError::DuplicateRequest { .. } => 409,
                DomainError::BookingNotRefundable { .. } => 422,
                DomainError::ConcurrentModification { .. } => 409,
            },
            AppErrorKind::Infrastructure(_) => 500,
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProcessor { .. } => 502,
                ExternalError::Timeout { .. } => 504,
            },
            AppErrorKind::Validation(_) => 400,
            AppErrorKind::Authorization(err) => match err {
                AuthorizationError::Unauthenticated { .. } => 401,
                AuthorizationError::Forbidden { .. } => 403,
            },
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::InvalidState { .. } => ErrorCode::InvalidState,
                DomainError::RefundNotFound { .. }
                | DomainError::BookingNotFound { .. }
                | DomainError::IntentNotFound { .. } => ErrorCode::NotFound,
                DomainError::DuplicateRequest { .. } => ErrorCode::DuplicateRequest,
                DomainError::BookingNotRefundable { .. } => ErrorCode::BookingNotRefundable,
                DomainError::ConcurrentModification { .. } => ErrorCode::ConcurrentModification,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => ErrorCode::DatabaseError,
                InfrastructureError::Cache { .. } => ErrorCode::CacheError,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProcessor { .. } | ExternalError::Timeout { .. } => {
                    ErrorCode::ProcessorError
                }
            },
            AppErrorKind::Validation(_) => ErrorCode::ValidationError,
            AppErrorKind::Authorization(err) => match err {
                AuthorizationError::Unauthenticated { .. } => ErrorCode::Unauthorized,
                AuthorizationError::Forbidden { .. } => ErrorCode::Forbidden,
            },
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::InvalidState {
                    refund_id,
                    status,
                    action,
                } => format!(
                    "Refund '{}' is {} and cannot {}",
                    refund_id,
                    status,
                    action.replace('_', " ")
                ),
                DomainError::RefundNotFound { refund_id } => {
                    format!("Refund request '{}' not found", refund_id)
                }
                DomainError::BookingNotFound { booking_id } => {
                    format!("Booking '{}' not found", booking_id)
                }
                DomainError::IntentNotFound { intent_id } => {
                    format!("No refund request uses refund intent '{}'", intent_id)
                }
                DomainError::DuplicateRequest { booking_id, .. } => format!(
                    "Booking '{}' already has a refund request in progress",
                    booking_id
                ),
                DomainError::BookingNotRefundable { booking_id, reason } => {
                    format!("Booking '{}' cannot be refunded: {}", booking_id, reason)
                }
                DomainError::ConcurrentModification { refund_id } => format!(
                    "Refund '{}' was modified by another request. Reload and try again",
                    refund_id
                ),
            },
            AppErrorKind::Infrastructure(_) => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProcessor {
                    processor,
                    message,
                    is_retryable,
                } => {
                    if *is_retryable {
                        format!(
                            "Payment processor ({}) is temporarily unavailable: {}",
                            processor, message
                        )
                    } else {
                        format!("Payment processor ({}) rejected the refund: {}", processor, message)
                    }
                }
                ExternalError::Timeout {
                    service,
                    timeout_secs,
                } => format!(
                    "{} request timed out after {} seconds. Please try again",
                    service, timeout_secs
                ),
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::MissingField { field } => {
                    format!("Required field '{}' is missing", field)
                }
                ValidationError::TooShort { field, min } => {
                    format!("Field '{}' must be at least {} characters", field, min)
                }
                ValidationError::InvalidAmount { amount, reason } => {
                    format!("Invalid amount '{}': {}", amount, reason)
                }
                ValidationError::InvalidFormat { field, reason } => {
                    format!("Field '{}' is invalid: {}", field, reason)
                }
                ValidationError::OutOfRange { field, min, max } => match (min, max) {
                    (Some(min), Some(max)) => {
                        format!("Field '{}' must be between {} and {}", field, min, max)
                    }
                    (Some(min), None) => format!("Field '{}' must be at least {}", field, min),
                    (None, Some(max)) => format!("Field '{}' must be at most {}", field, max),
                    (None, None) => format!("Field '{}' is out of acceptable range", field),
                },
            },
            AppErrorKind::Authorization(err) => match err {
                AuthorizationError::Unauthenticated { reason } => {
                    format!("Authentication required: {}", reason)
                }
                AuthorizationError::Forbidden { reason } => {
                    format!("Not allowed: {}", reason)
                }
            },
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Domain(err) => {
                matches!(err, DomainError::ConcurrentModification { .. })
            }
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { is_retryable, .. } => *is_retryable,
                InfrastructureError::Cache { .. } => true,
                InfrastructureError::Configuration { .. } => false,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProcessor { is_retryable, .. } => *is_retryable,
                ExternalError::Timeout { .. } => true,
            },
            AppErrorKind::Validation(_) | AppErrorKind::Authorization(_) => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{} ({})", self.user_message(), context),
            None => write!(f, "{}", self.user_message()),
        }
    }
}

impl std::error::Error for AppError {}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        AppError::new(AppErrorKind::Domain(err))
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::new(AppErrorKind::Validation(err))
    }
}

impl From<AuthorizationError> for AppError {
    fn from(err: AuthorizationError) -> Self {
        AppError::new(AppErrorKind::Authorization(err))
    }
}

impl From<BreakdownError> for AppError {
    fn from(err: BreakdownError) -> Self {
        match err {
            BreakdownError::AmountOutOfRange { max, .. } => {
                AppError::new(AppErrorKind::Validation(ValidationError::OutOfRange {
                    field: "customAmount".to_string(),
                    min: Some("0".to_string()),
                    max: Some(max.to_string()),
                }))
            }
            BreakdownError::TooPrecise { amount } => {
                AppError::new(AppErrorKind::Validation(ValidationError::InvalidAmount {
                    amount: amount.to_string(),
                    reason: "amounts are limited to two decimal places".to_string(),
                }))
            }
        }
    }
}

impl From<PolicyError> for AppError {
    fn from(err: PolicyError) -> Self {
        AppError::new(AppErrorKind::Infrastructure(
            InfrastructureError::Configuration {
                message: err.to_string(),
            },
        ))
    }
}

// From<DatabaseError>, From<CacheError> and From<PaymentError> live next to
// their error types.
