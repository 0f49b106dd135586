//! HTTP surface of the refund service.

pub mod admin_refunds;
pub mod auth;
pub mod refunds;
pub mod webhooks;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::warn;

use crate::cache::keys::refunds::StatisticsKey;
use crate::cache::{Cache, RedisCache};
use crate::error::AppResult;
use crate::health::{self, HealthChecker};
use crate::middleware::logging::{request_logging_middleware, UuidRequestId};
use crate::refunds::{RefundQuery, RefundStatus};
use crate::security::Actor;
use crate::services::{
    RefundFacade, RefundLifecycleController, RefundStatistics, WebhookProcessor,
};

#[derive(Clone)]
pub struct RefundApiState {
    pub controller: Arc<RefundLifecycleController>,
    pub facade: Arc<RefundFacade>,
    pub webhooks: Arc<WebhookProcessor>,
    pub cache: Option<RedisCache>,
    pub stats_ttl: Duration,
}

impl RefundApiState {
    pub fn new(controller: Arc<RefundLifecycleController>, facade: RefundFacade) -> Self {
        Self {
            webhooks: Arc::new(WebhookProcessor::new(controller.clone())),
            controller,
            facade: Arc::new(facade),
            cache: None,
            stats_ttl: Duration::from_secs(60),
        }
    }

    pub fn with_cache(mut self, cache: RedisCache, ttl: Duration) -> Self {
        self.cache = Some(cache);
        self.stats_ttl = ttl;
        self
    }

    /// Admin statistics over every request, served from Redis when possible.
    pub async fn statistics(&self, admin: &Actor) -> AppResult<RefundStatistics> {
        let key = StatisticsKey.to_string();

        if let Some(cache) = &self.cache {
            match <RedisCache as Cache<RefundStatistics>>::get(cache, &key).await {
                Ok(Some(stats)) => return Ok(stats),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Statistics cache read failed"),
            }
        }

        let all = self
            .controller
            .list_all(admin, &RefundQuery::default())
            .await?;
        let stats = self.facade.statistics(&all.items);

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(&key, &stats, Some(self.stats_ttl)).await {
                warn!(error = %e, "Statistics cache write failed");
            }
        }
        Ok(stats)
    }

    /// Drop cached statistics after any state change.
    pub async fn invalidate_statistics(&self) {
        if let Some(cache) = &self.cache {
            let key = StatisticsKey.to_string();
            if let Err(e) = <RedisCache as Cache<RefundStatistics>>::delete(cache, &key).await {
                warn!(error = %e, "Statistics cache invalidation failed");
            }
        }
    }
}

/// Parse an optional `status` query value.
pub(crate) fn parse_status(raw: Option<&str>) -> AppResult<Option<RefundStatus>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => value.parse::<RefundStatus>().map(Some).map_err(|e| {
            crate::error::ValidationError::InvalidFormat {
                field: "status".to_string(),
                reason: e.to_string(),
            }
            .into()
        }),
    }
}

pub fn routes(state: RefundApiState) -> Router {
    Router::new()
        .route("/refunds", post(refunds::create_refund))
        .route("/refunds/mine", get(refunds::list_my_refunds))
        .route("/refunds/preview", get(refunds::preview_refund))
        .route("/refunds/{id}", get(refunds::get_refund))
        .route("/admin/refunds", get(admin_refunds::list_refunds))
        .route(
            "/admin/refunds/confirm-intent",
            post(admin_refunds::confirm_intent),
        )
        .route("/admin/refunds/{id}", get(admin_refunds::get_refund))
        .route(
            "/admin/refunds/{id}/process",
            post(admin_refunds::process_refund),
        )
        .route(
            "/admin/refunds/{id}/complete-personal",
            post(admin_refunds::complete_personal),
        )
        .route("/webhooks/processor", post(webhooks::handle_processor_webhook))
        .with_state(state)
}

/// Refund routes plus health probes, wrapped in request id and logging layers.
pub fn app(state: RefundApiState, checker: HealthChecker) -> Router {
    routes(state).merge(health::routes(checker)).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
            .layer(axum::middleware::from_fn(request_logging_middleware))
            .layer(PropagateRequestIdLayer::x_request_id()),
    )
}
