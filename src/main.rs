//! Snowline - MCP server for the ServiceNow table API
//!
//! This binary runs as an MCP server using stdio transport.
//!
//! # Configuration
//!
//! Set the following environment variables (or use a `.env` file):
//!
//! - `SERVICENOW_INSTANCE`: Instance name or base URL
//! - `SERVICENOW_USERNAME`: User name for basic authentication
//! - `SERVICENOW_PASSWORD`: Password for basic authentication
//!
//! Missing variables do not stop the server; the first tool call reports them.
//!
//! # Usage
//!
//! ```bash
//! SERVICENOW_INSTANCE=acme SERVICENOW_USERNAME=svc SERVICENOW_PASSWORD=xxx ./snowline
//! ```

use anyhow::{Context, Result};
use rmcp::{transport::stdio, ServiceExt};
use tracing_subscriber::{fmt, EnvFilter};

use snowline::{client, config, server};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore errors if not found)
    dotenvy::dotenv().ok();

    // stdout is reserved for MCP JSON-RPC messages
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("snowline=info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("Starting Snowline MCP server v{}", env!("CARGO_PKG_VERSION"));

    let server = match config::Config::from_env() {
        Ok(config) => {
            tracing::debug!("Configuration loaded, base_url: {}", config.base_url());

            let sn_client =
                client::SnClient::new(&config).context("Failed to create ServiceNow client")?;

            tracing::info!("Testing connection to ServiceNow...");
            if let Err(e) = sn_client.test_connection().await {
                tracing::error!(error = %sn_client.describe_error(&e), "Connection test failed");
                tracing::warn!(
                    "Server will start but may not be able to reach ServiceNow. \
                     Check configuration and network connectivity."
                );
            }

            server::SnowlineServer::with_client(sn_client)
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "ServiceNow configuration incomplete; tools will report it when called"
            );
            server::SnowlineServer::new()
        }
    };

    tracing::info!("Server initialized, starting stdio transport");

    let service = server
        .serve(stdio())
        .await
        .inspect_err(|e| {
            tracing::error!("serving error: {:?}", e);
        })
        .context("Failed to start server")?;

    tracing::info!("Server running, waiting for requests");

    service
        .waiting()
        .await
        .context("Server error during operation")?;

    tracing::info!("Server shutting down");

    Ok(())
}
