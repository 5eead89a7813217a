//! Booking Engine Server
//!
//! Main server process: connects the `PostgreSQL` store, the Redis hold
//! registry, and the Redpanda publisher; runs migrations; spawns the hold
//! expiry worker and the outbox dispatcher; and serves the HTTP API until
//! Ctrl+C.
//!
//! # Usage
//!
//! ```bash
//! # Start infrastructure
//! docker compose up -d
//!
//! # Run server
//! cargo run --bin server
//! ```

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use booker_core::{BookingStore, Clock, EventPublisher, HoldRegistry, SystemClock};
use booker_postgres::{PostgresBookingStore, PostgresCatalog};
use booker_redis::RedisHoldRegistry;
use booker_redpanda::RedpandaPublisher;
use booker_server::workers::{HoldExpiryWorker, OutboxDispatcher};
use booker_server::{api, metrics, AppState, Config, Coordinator};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,booker_server=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting booking engine server...");

    let config = Config::from_env();
    tracing::info!(
        postgres = %config.postgres.url,
        redis = %config.redis.url,
        redpanda = %config.redpanda.brokers,
        "Configuration loaded"
    );

    // Prometheus endpoint
    let metrics_addr: std::net::SocketAddr =
        format!("{}:{}", config.server.metrics_host, config.server.metrics_port).parse()?;
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()?;
    metrics::register_business_metrics();

    // Booking store + catalogue share one bounded pool
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.postgres.max_connections)
        .min_connections(config.postgres.min_connections)
        .acquire_timeout(std::time::Duration::from_secs(config.postgres.connect_timeout))
        .connect(&config.postgres.url)
        .await?;

    let store = PostgresBookingStore::from_pool(pool.clone());
    store.run_migrations().await?;
    let store: Arc<dyn BookingStore> = Arc::new(store);
    let catalog = Arc::new(PostgresCatalog::new(pool));

    let holds: Arc<dyn HoldRegistry> = Arc::new(RedisHoldRegistry::new(&config.redis.url).await?);
    let publisher: Arc<dyn EventPublisher> = Arc::new(
        RedpandaPublisher::builder()
            .brokers(&config.redpanda.brokers)
            .acks(&config.redpanda.acks)
            .build()?,
    );
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let coordinator = Arc::new(Coordinator::new(
        store.clone(),
        holds.clone(),
        clock.clone(),
        config.booking.hold_ttl(),
    ));

    // Background workers share the store and registry, nothing else
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let expiry_worker = HoldExpiryWorker::new(
        store.clone(),
        holds.clone(),
        clock.clone(),
        config.booking.expiry_tick_interval(),
    );
    tokio::spawn(expiry_worker.run(shutdown_rx.clone()));

    let dispatcher = OutboxDispatcher::new(
        store.clone(),
        publisher,
        config.booking.outbox_batch_size,
        config.booking.outbox_max_retries,
        config.booking.outbox_tick_interval(),
    );
    tokio::spawn(dispatcher.run(shutdown_rx));

    let config = Arc::new(config);
    let state = AppState::new(config.clone(), coordinator, store, catalog);
    let app = api::router(state);

    let addr: std::net::SocketAddr =
        format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, metrics = %metrics_addr, "Booking engine server is running");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("Shutting down gracefully...");
    let _ = shutdown_tx.send(true);

    Ok(())
}
