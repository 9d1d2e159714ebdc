//! arcade-worker entry point.
//!
//! Boots the caching interceptor and serves JSON-line events on stdio.
//! Logging goes to stderr to avoid interfering with the protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use arcade_client::{FetchClient, FetchConfig, Interceptor};
use arcade_core::{AppConfig, CacheDb};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod host;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        origin = %config.origin,
        version = %config.cache_version,
        db = %config.db_path.display(),
        "Starting arcade-worker on stdio"
    );

    let db = CacheDb::open(&config.db_path).await?;
    let network = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let out = Arc::new(host::LineWriter::stdout());
    let worker_host = Arc::new(host::StdioHost::new(out.clone()));
    let interceptor = Interceptor::new(&config, db, network, worker_host)?;

    let server = handler::WorkerServer::new(interceptor, out);
    server.run(BufReader::new(tokio::io::stdin())).await?;

    Ok(())
}
