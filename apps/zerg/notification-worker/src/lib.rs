//! Notification Worker Service
//!
//! Consumes admin notification events from a Redis stream and emails every
//! recipient.
//!
//! ## Architecture
//!
//! ```text
//! Redis Stream (service-requests)
//!   ↓ (Consumer Group: notification-workers)
//! StreamWorker<NotificationSubscriber>
//!   ↓ (decodes the envelope)
//! Dispatcher
//!   ↓ (one email per recipient)
//! MailTransport (SMTP relay / Mailpit)
//! ```
//!
//! ## Features
//!
//! - Consumer group support for horizontal scaling
//! - Every delivery is acknowledged once processed; no retry, no DLQ
//! - Graceful shutdown handling
//! - Health check endpoints for Kubernetes probes
//! - Prometheus metrics

mod settings;

pub use settings::WorkerSettings;

use admin_notifications::{
    Dispatcher, MailTransport, NotificationSubscriber, RelayConfig, SmtpMailTransport,
};
use axum::Router;
use core_config::{redis::RedisConfig, server::HealthServerConfig, Environment, FromEnv};
use eyre::{Result, WrapErr};
use redis::aio::ConnectionManager;
use std::sync::Arc;
use stream_worker::{health_router, metrics, HealthState, StreamWorker, WorkerConfig};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

const APP_NAME: &str = env!("CARGO_PKG_NAME");
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Start the health HTTP server
///
/// Provides endpoints for:
/// - Liveness probes: `/health`, `/healthz`
/// - Readiness probes: `/ready`, `/readyz`
/// - Stream monitoring: `/stream/info`
/// - Prometheus metrics: `/metrics`
async fn start_health_server(health_state: HealthState, config: HealthServerConfig) -> Result<()> {
    let app: Router = health_router(health_state);

    let addr = config.address();
    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("Failed to bind health server to {}", addr))?;

    info!(address = %addr, "Health server listening");

    axum::serve(listener, app)
        .await
        .wrap_err("Health server failed")?;

    Ok(())
}

/// Redis connections used by one worker process.
///
/// The worker parks on a blocking `XREADGROUP` for up to
/// `block_timeout_ms`, which holds the multiplexed connection it runs on.
/// Health endpoints get their own connection so `/ready` and
/// `/stream/info` answer while the worker is blocked.
pub struct RedisConnections {
    pub worker: Arc<ConnectionManager>,
    pub health: Arc<ConnectionManager>,
}

/// Open the worker and health connections to Redis.
pub async fn connect_redis(config: &RedisConfig) -> Result<RedisConnections> {
    let client =
        redis::Client::open(config.uri.as_str()).wrap_err("Invalid Redis connection string")?;
    let worker = ConnectionManager::new(client.clone())
        .await
        .wrap_err("Failed to connect to Redis")?;
    let health = ConnectionManager::new(client)
        .await
        .wrap_err("Failed to open Redis health connection")?;

    Ok(RedisConnections {
        worker: Arc::new(worker),
        health: Arc::new(health),
    })
}

/// Run the notification worker
///
/// 1. Sets up structured logging (env-aware: JSON for prod, pretty for dev)
/// 2. Loads relay, Redis and worker configuration
/// 3. Connects to Redis
/// 4. Selects the mail transport (SMTP relay in production, Mailpit in development)
/// 5. Runs the stream worker until SIGINT/SIGTERM
///
/// # Errors
///
/// Returns an error if:
/// - A required environment variable is missing or malformed
/// - Redis connection fails
/// - The SMTP transport cannot be configured
/// - The worker cannot create its consumer group
pub async fn run() -> Result<()> {
    core_config::tracing::install_color_eyre();

    // Initialize tracing (env-aware: JSON for prod, pretty for dev)
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    // Initialize Prometheus metrics
    metrics::init_metrics();

    info!(name = APP_NAME, version = APP_VERSION, "Starting notification worker service");
    info!("Environment: {:?}", environment);

    let relay = RelayConfig::from_env().wrap_err("Failed to load relay configuration")?;
    let settings = WorkerSettings::from_env().wrap_err("Failed to load worker settings")?;
    let health_config =
        HealthServerConfig::from_env().wrap_err("Failed to load health server configuration")?;
    let redis_config = RedisConfig::from_env().wrap_err("Failed to load Redis configuration")?;

    let worker_config = settings.apply(relay.worker_config());
    info!(
        stream = %worker_config.stream_name,
        consumer_group = %worker_config.consumer_group,
        consumer_id = %worker_config.consumer_id,
        sender = %relay.sender_address,
        block_timeout_ms = ?worker_config.block_timeout_ms,
        batch_size = worker_config.batch_size,
        max_concurrent_jobs = worker_config.max_concurrent_jobs,
        "Worker configuration loaded"
    );

    info!("Connecting to Redis...");
    let redis = connect_redis(&redis_config).await?;
    info!("Connected to Redis successfully");

    // Set up a shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn shutdown signal handler
    tokio::spawn(async move {
        if let Err(e) = shutdown_signal().await {
            error!("Error waiting for shutdown signal: {}", e);
        }
        let _ = shutdown_tx.send(true);
    });

    // Start health server in background
    let health_state = HealthState::new(redis.health, APP_NAME, APP_VERSION, worker_config.clone());
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_state, health_config).await {
            error!(error = %e, "Health server failed");
        }
    });

    // Select mail transport based on environment and run worker
    let transport = match environment {
        Environment::Production => {
            info!("Using SMTP relay for production");
            SmtpMailTransport::from_env().wrap_err(
                "SMTP configuration error. Ensure SMTP_HOST (and credentials) are set.",
            )?
        }
        Environment::Development => {
            info!("Using local SMTP catcher for development (Mailpit/MailHog)");
            SmtpMailTransport::mailhog().wrap_err("Local SMTP configuration error")?
        }
    };

    run_worker(redis.worker, transport, &relay, worker_config, shutdown_rx).await?;

    info!("Notification worker service stopped");
    Ok(())
}

/// Relay notifications from the stream until `shutdown_rx` flips to `true`.
pub async fn run_worker<T>(
    redis: Arc<ConnectionManager>,
    transport: T,
    relay: &RelayConfig,
    worker_config: WorkerConfig,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<()>
where
    T: MailTransport + 'static,
{
    // Not fatal: the server may come up after the worker does
    match transport.health_check().await {
        Ok(()) => info!(transport = transport.name(), "Mail transport reachable"),
        Err(e) => warn!(transport = transport.name(), error = %e, "Mail transport not reachable yet"),
    }

    let dispatcher = Dispatcher::new(transport, &relay.sender_address);
    let subscriber = Arc::new(NotificationSubscriber::new(dispatcher));

    info!("Starting notification processor...");
    let worker = StreamWorker::with_arc_processor(redis, subscriber, worker_config);
    worker
        .run(shutdown_rx)
        .await
        .wrap_err("Notification worker failed")?;

    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
        .wrap_err("Failed to install SIGTERM handler")?;

    #[cfg(unix)]
    let terminate = async move {
        terminate.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = signal::ctrl_c() => {
            result.wrap_err("Failed to listen for Ctrl+C")?;
            info!("Received Ctrl+C, initiating shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        },
    }

    Ok(())
}
