//! Refund processor integration: the processor trait, its HTTP and sandbox
//! implementations, and the shared HTTP/HMAC helpers.

pub mod error;
pub mod factory;
pub mod provider;
pub mod providers;
pub mod types;
pub mod utils;

pub use error::{PaymentError, PaymentResult};
pub use factory::ProcessorFactory;
pub use provider::RefundProcessor;
pub use types::{IntentConfirmation, IntentStatus, ProcessorName, RefundIntent, RefundIntentRequest};
