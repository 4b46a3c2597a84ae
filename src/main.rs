/// fast-pypi - private Python package index
///
/// Serves the PEP 503 simple repository API and the legacy upload API on top of
/// a local filesystem or Azure Blob storage backend.

mod access;
mod api;
mod config;
mod context;
mod error;
mod server;
mod storage;

use config::ServerConfig;
use context::AppContext;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fast_pypi=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = ServerConfig::from_env()?;
    tracing::debug!("Loaded configuration: {:?}", config);

    // Create application context (validates config and builds the storage backend)
    let ctx = AppContext::new(config)?;

    // Start server
    server::serve(ctx).await?;

    Ok(())
}
