use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mediabroker_core::{load_config, load_config_from_env, validate_config, Broker, Config};
use mediabroker_server::api::create_router;
use mediabroker_server::state::AppState;

/// Default configuration file, used when it exists and no path is given.
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = read_config()?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("ffmpeg: {:?}", config.engine.ffmpeg_path);
    info!("ffprobe: {:?}", config.engine.ffprobe_path);
    info!("Extractor: {:?}", config.extractor.program);

    let broker = Broker::from_config(&config).context("Failed to build format catalog")?;
    info!("Format catalog loaded with {} formats", broker.catalog().len());

    let state = Arc::new(AppState::new(config.clone(), Arc::new(broker)));
    let shutdown = state.shutdown_token().clone();

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Loads the configuration from `MEDIABROKER_CONFIG`, then `config.toml`,
/// then defaults plus environment overrides.
fn read_config() -> Result<Config> {
    let config_path = match std::env::var("MEDIABROKER_CONFIG") {
        Ok(path) => Some(PathBuf::from(path)),
        Err(_) => {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            default.exists().then_some(default)
        }
    };

    match config_path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))
        }
        None => {
            info!("No configuration file, using defaults and environment");
            load_config_from_env().context("Failed to load config from environment")
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM), then cancel running
/// downloads so their response bodies end.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, cancelling downloads");
    shutdown.cancel();
}
