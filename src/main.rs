use anyhow::Context;
use rmcp::{ServiceExt, transport::stdio};
use std::path::PathBuf;
use symbol_search::{Config, Result, SymbolServer, logging};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the MCP protocol
    logging::init();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref()).context("Failed to load configuration")?;

    tracing::info!("Starting symbol-search MCP server");

    let server = SymbolServer::from_config(&config);
    let service = server.serve(stdio()).await.inspect_err(|e| {
        tracing::error!("Error serving MCP server: {:?}", e);
    })?;

    service.waiting().await?;

    Ok(())
}
