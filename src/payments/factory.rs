use crate::config::ProcessorConfig;
use crate::payments::error::PaymentResult;
use crate::payments::provider::RefundProcessor;
use crate::payments::providers::{
    HttpProcessorConfig, HttpRefundProcessor, SandboxBehaviour, SandboxProcessor,
    SANDBOX_WEBHOOK_SECRET,
};
use crate::payments::types::ProcessorName;
use std::sync::Arc;
use tracing::info;

pub struct ProcessorFactory {
    config: ProcessorConfig,
}

impl ProcessorFactory {
    pub fn with_config(config: ProcessorConfig) -> Self {
        Self { config }
    }

    pub fn build(&self) -> PaymentResult<Arc<dyn RefundProcessor>> {
        let processor: Arc<dyn RefundProcessor> = match self.config.mode {
            ProcessorName::Http => Arc::new(HttpRefundProcessor::new(HttpProcessorConfig {
                base_url: self.config.base_url.clone(),
                secret_key: self.config.secret_key.clone(),
                webhook_secret: self.config.webhook_secret.clone(),
                timeout_secs: self.config.timeout_secs,
                max_retries: self.config.max_retries,
            })?),
            ProcessorName::Sandbox => Arc::new(SandboxProcessor::with_webhook_secret(
                SandboxBehaviour::Succeed,
                self.config
                    .webhook_secret
                    .clone()
                    .unwrap_or_else(|| SANDBOX_WEBHOOK_SECRET.to_string()),
            )),
        };

        info!(processor = %processor.name(), "refund processor configured");
        Ok(processor)
    }
}
