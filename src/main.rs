use rental_refunds::api::{self, RefundApiState};
use rental_refunds::cache::{build_cache, init_cache_pool};
use rental_refunds::config::AppConfig;
use rental_refunds::database::{BookingStore, MemoryBookingStore, MemoryRefundStore, RefundStore};
use rental_refunds::health::HealthChecker;
use rental_refunds::logging::init_tracing;
use rental_refunds::payments::ProcessorFactory;
use rental_refunds::services::{
    ControllerSettings, NotificationService, RefundFacade, RefundLifecycleController,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing(&config.logging);
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        skip_externals = config.skip_externals,
        "🚀 Starting rental refund service"
    );

    let mut health_checker_pool = None;
    let (refund_store, booking_store): (Arc<dyn RefundStore>, Arc<dyn BookingStore>) =
        match &config.database {
            #[cfg(feature = "database")]
            Some(db_config) => {
                info!("📊 Initializing database connection pool...");
                let pool = rental_refunds::database::init_pool_from_config(db_config).await?;
                if db_config.run_migrations {
                    rental_refunds::database::run_migrations(&pool).await?;
                }
                info!(
                    max_connections = pool.options().get_max_connections(),
                    "✅ Database connection pool initialized"
                );
                health_checker_pool = Some(pool.clone());
                (
                    Arc::new(rental_refunds::database::PgRefundStore::new(pool.clone())),
                    Arc::new(rental_refunds::database::PgBookingStore::new(pool)),
                )
            }
            #[cfg(not(feature = "database"))]
            Some(_) => {
                warn!("Built without the database feature; using in-memory stores");
                (
                    Arc::new(MemoryRefundStore::new()),
                    Arc::new(MemoryBookingStore::new()),
                )
            }
            None => {
                info!("⏭️  Skipping database initialization (SKIP_EXTERNALS=true), using in-memory stores");
                (
                    Arc::new(MemoryRefundStore::new()),
                    Arc::new(MemoryBookingStore::new()),
                )
            }
        };

    let redis_cache = match &config.cache {
        Some(cache_config) => match init_cache_pool(cache_config).await {
            Ok(pool) => {
                info!("✅ Cache connection pool initialized");
                Some(build_cache(pool, cache_config))
            }
            Err(e) => {
                warn!(error = %e, "Redis unavailable; statistics will not be cached");
                None
            }
        },
        None => {
            info!("⏭️  Skipping Redis initialization (SKIP_EXTERNALS=true)");
            None
        }
    };

    let processor = ProcessorFactory::with_config(config.processor.clone()).build()?;

    let controller = Arc::new(RefundLifecycleController::new(
        refund_store,
        booking_store,
        processor.clone(),
        Arc::new(NotificationService::new()),
        config.refund.policy.clone(),
        ControllerSettings {
            processor_timeout: config.processor.timeout(),
            currency: config.refund.currency.clone(),
        },
    ));

    let mut api_state = RefundApiState::new(
        controller,
        RefundFacade::new(config.refund.currency_symbol.clone()),
    );
    let mut health_checker = HealthChecker::new(processor);
    if let Some(cache) = redis_cache {
        let ttl = Duration::from_secs(config.cache.as_ref().map_or(60, |c| c.default_ttl));
        health_checker = health_checker.with_cache(cache.clone());
        api_state = api_state.with_cache(cache, ttl);
    }
    #[cfg(feature = "database")]
    if let Some(pool) = health_checker_pool.take() {
        health_checker = health_checker.with_database(pool);
    }
    #[cfg(not(feature = "database"))]
    let _: Option<()> = health_checker_pool.take();

    let app = api::app(api_state, health_checker);

    let addr: SocketAddr = config.server.bind_address().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("❌ Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "🚀 Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}
