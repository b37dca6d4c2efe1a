//! Ticketgate - ticket verification and check-in server for event scanners.
//!
//! Serves the scanner pages and a JSON API backed by a Google Sheet, with an
//! in-memory participant cache in front of the sheet.

mod error;
mod routes;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ticketgate_core::{Config, ParticipantCache, TicketService};

use routes::AppState;

/// Log file prefix used when `LOG_DIR` is set
const LOG_FILE_PREFIX: &str = "ticketgate.log";

/// Initialize the tracing subscriber for logging.
///
/// Use RUST_LOG to control the level (default `info`). When LOG_DIR is set,
/// logs are also written to a daily rolling file; keep the returned guard
/// alive so buffered lines are flushed on exit.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match std::env::var("LOG_DIR") {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .init();

    guard
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();
    info!("Ticketgate starting");

    let config = Config::load().context("Failed to load configuration")?;
    let store = config
        .sheets_client()
        .context("Failed to set up Sheets record store")?;
    info!(
        spreadsheet = %config.spreadsheet_id,
        range = %config.layout.read_range(),
        ttl_secs = config.cache_ttl_secs,
        "Record store configured"
    );

    let cache = Arc::new(ParticipantCache::new(Arc::new(store), config.cache_ttl()));

    // Warm the cache; a failure here is served around by the lazy refresh
    if let Err(e) = cache.reload().await {
        warn!(error = %e, "Initial participant load failed, will retry on first lookup");
    }

    let state = AppState {
        tickets: TicketService::new(cache),
    };

    let app = routes::app_router(state, &config.static_dir)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(CatchPanicLayer::new());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(addr = %listener.local_addr()?, "Ticket scanner server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Ticketgate shutting down");
    Ok(())
}
