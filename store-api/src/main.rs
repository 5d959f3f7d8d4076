//! store-api: order ingestion service
//!
//! Startup: store (retried) → schema → channel → listener. Serves until
//! Ctrl+C or SIGTERM, then drains in-flight requests and stops the relay.

use std::sync::Arc;

use store_api::api;
use store_api::bootstrap::{self, Startup, StartupPhase};
use store_api::config::{Config, NotifyMode};
use store_api::db::{PgOrderStore, PgOutboxStore};
use store_api::notifier::Notifier;
use store_api::relay::OutboxRelay;
use store_api::service::OrderService;
use store_api::state::AppState;
use tokio_util::sync::CancellationToken;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = Config::from_env()?;
    tracing::info!(
        http_port = config.http_port,
        notify_mode = ?config.notify_mode,
        channel = %config.orders_channel,
        "Starting store-api"
    );

    let mut startup = Startup::new();
    let deps = bootstrap::bootstrap(&config, &mut startup).await?;

    let mut store = PgOrderStore::new(deps.pool.clone());
    if let Some(channel) = config.outbox_channel() {
        store = store.with_outbox(channel);
    }
    let notifier = Notifier::new(deps.publisher.clone(), config.orders_channel.clone());
    let orders = OrderService::new(Arc::new(store), notifier)
        .with_notify_mode(config.notify_mode)
        .with_product_id_policy(config.product_id_policy);

    let app = api::create_router(AppState::new(orders));

    let shutdown = CancellationToken::new();

    let relay_handle = (config.notify_mode == NotifyMode::Outbox).then(|| {
        let relay = OutboxRelay::new(
            Arc::new(PgOutboxStore::new(deps.pool.clone())),
            deps.publisher.clone(),
            config.outbox_batch_size,
            config.outbox_poll_interval,
        );
        tokio::spawn(relay.run(shutdown.clone()))
    });

    let http_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    startup.advance(StartupPhase::Serving)?;
    tracing::info!("Server starting on port {}", config.http_port);

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            server_shutdown.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Some(handle) = relay_handle {
        if let Err(e) = handle.await {
            tracing::error!("Outbox relay task failed: {e}");
        }
    }
    deps.pool.close().await;

    tracing::info!("store-api stopped");
    Ok(())
}

/// `RUST_LOG` filter, `LOG_FORMAT=json` for structured output
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "store_api=info,tower_http=info".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
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
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
