use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use anyhow::{Context, Result};
use presence_scannerd::api;
use presence_scannerd::config::Config;
use presence_scannerd::mdns;
use presence_scannerd::scanner::ScannerHandle;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("presence_scannerd=info"))
        )
        .init();

    tracing::info!("Starting presence-scannerd");

    // Load config
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/presence-scanner/scannerd.toml".to_string());

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    tracing::info!("Loaded config from {}", config_path);

    // Each query round starts its own daemon on the configured interface
    let engine = mdns::Engine::new(&config.mdns);

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Start the scanner task
    let (query_tx, query_rx) = mpsc::channel(64);
    let (hash_tx, hash_rx) = watch::channel(String::new());
    let scanner = ScannerHandle::spawn(&config.scanner, query_tx, hash_tx, cancel.clone());

    // Spawn mDNS browser task
    let browser_cancel = cancel.clone();
    let browser_scanner = scanner.clone();
    let browser_handle = tokio::spawn(async move {
        if let Err(e) = mdns::browser::run_browser(engine, query_rx, browser_scanner, browser_cancel).await {
            tracing::error!("mDNS browser error: {}", e);
        }
    });

    if config.scanner.autostart {
        scanner.start().await.context("Failed to start scanner")?;
    }

    // Build API router
    let app_state = api::routes::AppState {
        scanner: scanner.clone(),
        hash_rx,
    };
    let app = api::routes::router(app_state);

    // Bind HTTP server
    let listener = tokio::net::TcpListener::bind(&config.api.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.api.listen))?;

    tracing::info!("API listening on {}", config.api.listen);

    // Run server with graceful shutdown
    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutdown signal received");

    // Stop timers first so no further queries reach the engine
    if let Err(e) = scanner.stop().await {
        tracing::error!("Failed to stop scanner: {}", e);
    }

    // Trigger cancellation
    cancel.cancel();

    // Wait for all tasks to complete
    let _ = tokio::join!(browser_handle, server_handle);

    tracing::info!("Shutdown complete");
    Ok(())
}
