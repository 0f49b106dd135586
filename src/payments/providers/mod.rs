pub mod http;
pub mod sandbox;

pub use http::{HttpProcessorConfig, HttpRefundProcessor};
pub use sandbox::{SandboxBehaviour, SandboxProcessor, SANDBOX_WEBHOOK_SECRET};
