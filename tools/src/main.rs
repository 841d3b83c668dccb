//! dockhand-mcp — serves the Docker container tools to an MCP client over stdio

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dockhand_tools::config::{self, ConfigSource, LoggingConfig};
use dockhand_tools::mcp::McpServer;
use dockhand_tools::runtime::DockerRuntime;
use dockhand_tools::{Dispatcher, RuntimeClient, ToolRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    let (config, source) = config::load_config()?;
    init_tracing(&config.logging);

    info!("Docker MCP Server running");
    match &source {
        ConfigSource::File(path) => info!("Loaded config from {}", path.display()),
        ConfigSource::Defaults(path) => {
            warn!("Config file not found at {}, using defaults", path.display())
        }
    }

    // The daemon must be reachable before any tool is registered
    let runtime = DockerRuntime::connect(&config.docker)
        .context("Failed to configure Docker client")?;
    let client = RuntimeClient::new(Arc::new(runtime));
    client
        .ping()
        .await
        .context("Failed to reach the Docker daemon")?;

    let registry = ToolRegistry::with_builtin_tools().context("Failed to register tools")?;
    let dispatcher = Dispatcher::new(Arc::new(registry), client)
        .with_call_timeout(config.tools.call_timeout());

    let server = McpServer::new(Arc::new(dispatcher), config.server.name.clone());
    server
        .serve(tokio::io::BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
        .context("MCP server failed")?;

    Ok(())
}

/// Log to stderr; stdout carries protocol frames
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true);

    if logging.json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}
