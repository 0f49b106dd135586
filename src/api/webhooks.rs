use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::json;
use tracing::info;

use super::RefundApiState;
use crate::error::AppError;
use crate::middleware::error::get_request_id_from_headers;
use crate::services::{WebhookOutcome, WebhookProcessorError};

pub const SIGNATURE_HEADER: &str = "x-processor-signature";

/// POST /webhooks/processor
///
/// Replays of already-resolved intents answer 200 so the processor stops
/// retrying; every other failure is reported with its error status.
pub async fn handle_processor_webhook(
    State(state): State<RefundApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    info!(bytes = body.len(), "Received processor webhook");
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    match state.webhooks.process_webhook(signature, &body).await {
        Ok(WebhookOutcome::Applied { refund_id, status }) => {
            state.invalidate_statistics().await;
            Ok((
                StatusCode::OK,
                Json(json!({ "status": "applied", "refundId": refund_id, "refundStatus": status })),
            ))
        }
        Ok(WebhookOutcome::NotConfirmed { refund_id }) => Ok((
            StatusCode::OK,
            Json(json!({ "status": "not_confirmed", "refundId": refund_id })),
        )),
        Ok(WebhookOutcome::Ignored { event_type }) => Ok((
            StatusCode::OK,
            Json(json!({ "status": "ignored", "eventType": event_type })),
        )),
        Err(WebhookProcessorError::AlreadyProcessed) => Ok((
            StatusCode::OK,
            Json(json!({ "status": "already_processed" })),
        )),
        Err(e) => {
            let error = AppError::from(e);
            Err(match get_request_id_from_headers(&headers) {
                Some(id) => error.with_request_id(id),
                None => error,
            })
        }
    }
}
