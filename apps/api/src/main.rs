//! # shopdesk API server
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        shopdesk-api                                     │
//! │                                                                         │
//! │  Back office / till ──► HTTP (8080) ──► Router ──► shopdesk-db        │
//! │  Shoppers ───────────►  /shop/{slug}       │          │                │
//! │                                            ▼          ▼                │
//! │                                      CurrentActor   SQLite (WAL)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```bash
//! shopdesk-api                         # platform config dir, then defaults
//! shopdesk-api --config ./shopdesk.toml
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context};
use shopdesk_api::{build_router, AppState, JwtManager, ServiceConfig};
use shopdesk_db::{Database, DbConfig};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = parse_args()?;
    let config = ServiceConfig::load(config_path).context("Failed to load configuration")?;

    init_tracing(&config.logging.filter);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting shopdesk API server...");

    if config.uses_dev_secret() {
        warn!("Using the built-in development JWT secret; set SHOPDESK_JWT_SECRET in production");
    }

    let db = Database::new(DbConfig::new(config.database.path.clone()).max_connections(config.database.max_connections))
        .await
        .with_context(|| format!("Failed to open database at {}", config.database.path.display()))?
        .with_rules(config.business.rules());
    info!(path = %config.database.path.display(), "Database ready");

    let jwt = JwtManager::new(config.auth.jwt_secret.clone(), config.auth.token_lifetime_secs);
    let app = build_router(AppState::new(db.clone(), jwt));

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// `--config <path>` is the only flag.
fn parse_args() -> anyhow::Result<Option<PathBuf>> {
    let mut args = std::env::args().skip(1);
    let mut config_path = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => match args.next() {
                Some(path) => config_path = Some(PathBuf::from(path)),
                None => bail!("--config needs a path"),
            },
            other => bail!("Unknown argument: {}", other),
        }
    }
    Ok(config_path)
}

/// `RUST_LOG` wins over the configured filter.
fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
