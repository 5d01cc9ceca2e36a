//! attn-offline - offline asset cache server for the kiosk
//!
//! Precaches the kiosk's static assets from the upstream origin on startup
//! and serves them cache-first, so the kiosk front end keeps loading without
//! a network connection.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use attn_common::config::ConfigResolver;
use attn_offline::controller::CacheController;
use attn_offline::network::HttpNetwork;
use attn_offline::{build_router, AppState};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for attn-offline
#[derive(Parser, Debug)]
#[command(name = "attn-offline")]
#[command(about = "Offline asset cache for the attendance kiosk")]
#[command(version)]
struct Args {
    /// Config file (overrides ATTN_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address (overrides offline.bind)
    #[arg(short, long, env = "ATTN_OFFLINE_BIND")]
    bind: Option<SocketAddr>,

    /// Origin serving the kiosk assets (overrides offline.upstream)
    #[arg(short, long, env = "ATTN_OFFLINE_UPSTREAM")]
    upstream: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let resolver = ConfigResolver::new(args.config.clone());
    let config = resolver.resolve().context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "attn_offline={level},tower_http={level}",
                    level = config.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "attn-offline v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let mut offline = config.offline;
    if let Some(upstream) = args.upstream {
        offline.upstream = upstream;
    }
    let bind: SocketAddr = match args.bind {
        Some(addr) => addr,
        None => offline
            .bind
            .parse()
            .with_context(|| format!("Invalid offline.bind address {}", offline.bind))?,
    };
    info!("Upstream: {}", offline.upstream);
    info!("Generation: {}", offline.generation_name());

    let network = HttpNetwork::new(offline.fetch_timeout()).context("Failed to build HTTP client")?;
    let controller = Arc::new(CacheController::new(offline, Arc::new(network))?);

    // Requests bypass the cache until an install succeeds
    if let Err(e) = controller.install().await {
        warn!("Precache failed, serving pass-through until installed: {}", e);
    }

    let app = build_router(AppState::new(controller));

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
