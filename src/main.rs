mod cache;
mod config;
mod lawapi;
mod markdown;
mod openai;
mod search;
mod tools;

pub const USER_AGENT: &str = concat!("lexgate/", env!("CARGO_PKG_VERSION"), " (MCP Server)");

use clap::Parser;
use rmcp::{ServiceExt, transport::stdio};
use tools::LexGate;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // before tracing init so RUST_LOG may come from .env
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lexgate=info".parse()?),
        )
        .init();

    match dotenv {
        Ok(path) => info!(path = %path.display(), "loaded environment file"),
        Err(e) => debug!("no environment file loaded: {e}"),
    }

    let config = config::Config::parse();
    let cache = config.cache();
    info!(
        ttl_secs = cache.ttl.as_secs(),
        capacity = cache.capacity,
        "starting lexgate MCP server"
    );

    let service = LexGate::new(cache)?
        .serve(stdio())
        .await
        .inspect_err(|e| tracing::error!("failed to start server: {e}"))?;

    service.waiting().await?;
    info!("server stopped");
    Ok(())
}
