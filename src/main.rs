use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use travel_booking::cli::{run_command, Cli};
use travel_booking::config::Config;
use travel_booking::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Client subcommands talk to a running server and print their own output
    if cli.command.is_some() {
        return run_command(&cli).await;
    }

    // Load configuration, logging at the CLI level until the configured one is known
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(env_filter(cli.log_level.as_deref().unwrap_or("info")))
        .finish();
    let config = Config::load_with(&cli.config, bootstrap)?;

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(env_filter(&log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting travel-booking v{}", env!("CARGO_PKG_VERSION"));

    // Ensure data directory exists
    std::fs::create_dir_all(&config.server.data_dir).with_context(|| {
        format!(
            "Failed to create data directory: {}",
            config.server.data_dir.display()
        )
    })?;

    let store = travel_booking::db::open_store(&config.database, &config.server.data_dir).await?;
    let state = Arc::new(AppState::new(config.clone(), store));

    // Bootstrap admin account
    if let (Some(email), Some(password)) = (&config.auth.admin_email, &config.auth.admin_password)
    {
        state.auth.ensure_admin(email, password).await?;
    }

    let router = travel_booking::api::create_router(state);

    let api_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.api_port)
        .parse()
        .context("Invalid API address")?;
    let listener = tokio::net::TcpListener::bind(api_addr)
        .await
        .with_context(|| format!("Failed to bind {}", api_addr))?;
    tracing::info!("API server listening on http://{}", api_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// `RUST_LOG` when set, else the given level
fn env_filter(level: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
