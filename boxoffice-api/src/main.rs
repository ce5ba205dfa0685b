use anyhow::Context;
use boxoffice_api::{app, AppState};
use boxoffice_booking::{
    start_payment_workers, BookingPolicy, BookingService, ExpirySweeper, PaymentWorker,
    RetryPolicy, SimulatedGateway,
};
use boxoffice_core::repository::{EventRepository, UserRepository};
use boxoffice_store::{
    Config, DbClient, PgBookingRepository, PgEventRepository, PgUserRepository, RedisPaymentQueue,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "boxoffice_api=debug,boxoffice_booking=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Boxoffice API on port {}", config.server.port);

    // Postgres
    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    // Redis payment queue
    let queue = Arc::new(
        RedisPaymentQueue::new(&config.redis.url, &config.redis.queue_key)
            .await
            .context("Failed to connect to Redis")?,
    );

    let events: Arc<dyn EventRepository> = Arc::new(PgEventRepository::new(db.pool.clone()));
    let users: Arc<dyn UserRepository> = Arc::new(PgUserRepository::new(db.pool.clone()));
    let policy = BookingPolicy::from_minutes(config.booking.payment_deadline_minutes)
        .context("Invalid booking policy")?;
    let service = Arc::new(BookingService::new(
        Arc::new(PgBookingRepository::new(db.pool.clone())),
        events.clone(),
        queue.clone(),
        policy,
    ));

    let retry = RetryPolicy::builder()
        .max_retries(config.payments.max_retries)
        .initial_delay(config.payments.initial_backoff())
        .max_delay(config.payments.max_backoff())
        .build();

    // Background tasks
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = Arc::new(PaymentWorker::new(
        service.clone(),
        queue,
        Arc::new(SimulatedGateway::new(config.payments.gateway_delay())),
        retry.clone(),
    ));
    let mut background =
        start_payment_workers(worker, config.payments.workers, shutdown_rx.clone()).await;

    let sweeper = Arc::new(ExpirySweeper::new(
        service.clone(),
        config.booking.sweep_interval(),
        retry,
    ));
    background.push(tokio::spawn(sweeper.run(shutdown_rx)));

    let app = app(AppState::new(service, events, users));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("HTTP server stopped, waiting for background tasks");
    // Receivers may already be gone if every task exited on its own.
    let _ = shutdown_tx.send(true);
    for handle in background {
        if let Err(e) = handle.await {
            tracing::error!("Background task panicked: {}", e);
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
