//! Read-only PostgreSQL query gateway, exposed as an MCP server.
//!
//! Connects to every configured logical database at startup, serves the
//! `execute_query` tool over the selected transport, and drains all
//! connections exactly once on the way out.

mod config;
mod gateway;
mod registry;
mod rows;
mod server;
mod tools;

use std::sync::Arc;

use common::config::GatewayConfig;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::ServerConfig;
use gateway::QueryGateway;
use registry::ConnectionRegistry;
use tools::ToolRouter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (if present) before anything else
    common::config::load_dotenv();

    // Logs go to stderr, stdout is reserved for the stdio transport
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    info!("Initializing PostgreSQL MCP server");

    let server_config = ServerConfig::load()?;
    let gateway_config = GatewayConfig::load();

    let registry = Arc::new(ConnectionRegistry::initialize(&gateway_config).await);
    info!(
        databases = registry.len(),
        configured = gateway_config.databases.len(),
        "Connection registry initialized"
    );

    let gateway = Arc::new(QueryGateway::new(registry.clone()));
    let router = Arc::new(ToolRouter::new(gateway));

    let result = server::serve(server_config, router).await;

    // Every exit path drains the registry before the process stops
    info!("Shutting down PostgreSQL MCP server");
    registry.shutdown().await;

    result.map_err(Into::into)
}
