//! Health check module
//! Provides health status for the service and its dependencies

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{error, info};

use crate::cache::RedisCache;
use crate::payments::provider::RefundProcessor;
use crate::payments::types::ProcessorName;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Health status response
#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub checks: HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize, Clone)]
pub struct ComponentHealth {
    pub status: ComponentState,
    pub response_time_ms: Option<u128>,
    pub details: Option<String>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ComponentState {
    Up,
    Down,
    Warning,
}

impl HealthStatus {
    pub fn new() -> Self {
        Self {
            status: HealthState::Healthy,
            checks: HashMap::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self.status, HealthState::Healthy)
    }

    /// Ready unless a required component is down.
    pub fn is_ready(&self) -> bool {
        !matches!(self.status, HealthState::Unhealthy)
    }

    fn record(&mut self, component: &str, health: ComponentHealth) {
        self.status = match (self.status, health.status) {
            (_, ComponentState::Down) | (HealthState::Unhealthy, _) => HealthState::Unhealthy,
            (_, ComponentState::Warning) | (HealthState::Degraded, _) => HealthState::Degraded,
            _ => HealthState::Healthy,
        };
        self.checks.insert(component.to_string(), health);
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentHealth {
    pub fn up(response_time_ms: Option<u128>) -> Self {
        Self {
            status: ComponentState::Up,
            response_time_ms,
            details: None,
        }
    }

    pub fn down(details: Option<String>) -> Self {
        Self {
            status: ComponentState::Down,
            response_time_ms: None,
            details,
        }
    }

    pub fn warning(response_time_ms: Option<u128>, details: Option<String>) -> Self {
        Self {
            status: ComponentState::Warning,
            response_time_ms,
            details,
        }
    }
}

/// Health checker for the service
#[derive(Clone)]
pub struct HealthChecker {
    #[cfg(feature = "database")]
    db_pool: Option<sqlx::PgPool>,
    cache: Option<RedisCache>,
    processor: Arc<dyn RefundProcessor>,
}

impl HealthChecker {
    pub fn new(processor: Arc<dyn RefundProcessor>) -> Self {
        Self {
            #[cfg(feature = "database")]
            db_pool: None,
            cache: None,
            processor,
        }
    }

    #[cfg(feature = "database")]
    pub fn with_database(mut self, pool: sqlx::PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    pub fn with_cache(mut self, cache: RedisCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Check every component, each bounded by a 5s timeout.
    pub async fn check_health(&self) -> HealthStatus {
        let mut health_status = HealthStatus::new();

        health_status.record("database", self.check_database().await);
        health_status.record("cache", self.check_cache().await);
        health_status.record("processor", self.check_processor());

        health_status
    }

    #[cfg(feature = "database")]
    async fn check_database(&self) -> ComponentHealth {
        match &self.db_pool {
            Some(pool) => {
                timed_check("Database", async {
                    crate::database::health_check(pool)
                        .await
                        .map_err(|e| e.to_string())
                })
                .await
            }
            None => ComponentHealth::warning(None, Some("in-memory store".to_string())),
        }
    }

    #[cfg(not(feature = "database"))]
    async fn check_database(&self) -> ComponentHealth {
        ComponentHealth::warning(None, Some("in-memory store".to_string()))
    }

    async fn check_cache(&self) -> ComponentHealth {
        match &self.cache {
            Some(cache) => {
                timed_check("Cache", async {
                    crate::cache::health_check(cache.pool())
                        .await
                        .map_err(|e| e.to_string())
                })
                .await
            }
            None => ComponentHealth::warning(None, Some("cache disabled".to_string())),
        }
    }

    fn check_processor(&self) -> ComponentHealth {
        match self.processor.name() {
            ProcessorName::Sandbox => {
                ComponentHealth::warning(None, Some("sandbox processor in use".to_string()))
            }
            ProcessorName::Http => ComponentHealth::up(None),
        }
    }
}

async fn timed_check<F>(component: &str, check: F) -> ComponentHealth
where
    F: std::future::Future<Output = Result<(), String>>,
{
    let start = Instant::now();
    match timeout(CHECK_TIMEOUT, check).await {
        Ok(Ok(())) => {
            let response_time = start.elapsed().as_millis();
            info!("{} health check: OK ({}ms)", component, response_time);
            ComponentHealth::up(Some(response_time))
        }
        Ok(Err(e)) => {
            error!("{} health check failed: {}", component, e);
            ComponentHealth::down(Some(e))
        }
        Err(_) => {
            error!("{} health check timed out", component);
            ComponentHealth::down(Some("Timeout".to_string()))
        }
    }
}

pub fn routes(checker: HealthChecker) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/health/live", get(liveness))
        .with_state(checker)
}

async fn health(State(checker): State<HealthChecker>) -> (StatusCode, Json<HealthStatus>) {
    let status = checker.check_health().await;
    let code = if status.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}

async fn readiness(State(checker): State<HealthChecker>) -> StatusCode {
    if checker.check_health().await.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn liveness() -> StatusCode {
    StatusCode::OK
}
