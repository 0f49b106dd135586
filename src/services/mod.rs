//! Services module for refund business logic

pub mod notification;
pub mod refund_facade;
pub mod refund_lifecycle;
pub mod webhook_processor;

pub use notification::{NotificationDispatcher, NotificationService, NotificationType};
pub use refund_facade::{
    format_currency, presentation, BadgeTone, RefundFacade, RefundStatistics, RefundView,
    STATUS_PRESENTATION,
};
pub use refund_lifecycle::{
    ControllerSettings, ProcessorEventOutcome, ProcessorOutcome, RefundLifecycleController,
    RefundPreview, MIN_NOTES_LENGTH, MIN_REASON_LENGTH,
};
pub use webhook_processor::{WebhookOutcome, WebhookProcessor, WebhookProcessorError};
