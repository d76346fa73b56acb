//! eda-server - EDA dashboard backend
//!
//! Configuration priority: command line → environment → TOML file →
//! compiled defaults.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use eda_common::config::{resolve_config_path, TomlConfig};
use eda_server::api::buildinfo::BuildInfo;
use eda_server::session::SessionStore;
use eda_server::{build_router, AppState};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for eda-server
#[derive(Parser, Debug)]
#[command(name = "eda-server")]
#[command(about = "Dataset session backend for the EDA dashboard")]
#[command(version)]
struct Args {
    /// Interface to bind
    #[arg(long, env = "EDA_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "EDA_PORT")]
    port: Option<u16>,

    /// Path to the TOML config file
    #[arg(short, long, env = "EDA_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let mut config = TomlConfig::load_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;
    config.apply_overrides(args.host, args.port);

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "eda_server={level},eda_common={level},tower_http={level}",
                    level = config.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting EDA dashboard backend (eda-server) {}",
        BuildInfo::current()
    );
    match &config_path {
        Some(path) if path.exists() => info!("Configuration: {}", path.display()),
        _ => info!("Configuration: compiled defaults"),
    }

    let state = AppState::new(config.clone());

    if let Some(ttl) = config.session_idle_ttl() {
        info!(
            ttl_secs = ttl.as_secs(),
            interval_secs = config.eviction_interval_secs,
            "Idle session eviction enabled"
        );
        tokio::spawn(eviction_sweeper(
            state.sessions.clone(),
            ttl,
            config.eviction_interval(),
        ));
    } else {
        warn!("Idle session eviction disabled: sessions are kept until shutdown");
    }

    let app = build_router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("eda-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("eda-server stopped");
    Ok(())
}

/// Periodically drop sessions idle for longer than `ttl`
async fn eviction_sweeper(
    sessions: SessionStore,
    ttl: std::time::Duration,
    interval: std::time::Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let evicted = sessions.evict_idle(ttl).await;
        if !evicted.is_empty() {
            info!(count = evicted.len(), "Idle session sweep complete");
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
