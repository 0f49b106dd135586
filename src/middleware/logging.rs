//! Request id generation and per-request logging.

use axum::{extract::Request, middleware::Next, response::Response};
use http::{HeaderValue, Request as HttpRequest};
use std::future::Future;
use std::time::Instant;
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

/// Generates an `x-request-id` for requests that do not carry one.
#[derive(Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &HttpRequest<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Logs method, path, status and latency inside a span carrying the request id.
pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let span = tracing::info_span!(
        "http_request",
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    async move {
        let started = Instant::now();
        info!("Request started");

        let response = next.run(request).await;

        let status = response.status().as_u16();
        let latency_ms = started.elapsed().as_millis() as u64;
        match status {
            500..=599 => error!(status, latency_ms, "Request failed"),
            400..=499 => warn!(status, latency_ms, "Request rejected"),
            _ => info!(status, latency_ms, "Request completed"),
        }
        response
    }
    .instrument(span)
    .await
}

/// Times a call to an external service and logs its outcome.
pub async fn log_external_call<T, E, F>(service: &str, operation: &str, call: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let started = Instant::now();
    let result = call.await;
    let duration_ms = started.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => info!(service, operation, duration_ms, "External call succeeded"),
        Err(e) => warn!(service, operation, duration_ms, error = %e, "External call failed"),
    }
    result
}
