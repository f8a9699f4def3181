#![cfg(feature = "server-http")]
// ABOUTME: HTTP server implementation using rmcp StreamableHttpService
// ABOUTME: Session-based MCP over HTTP with SSE keep-alive, plus a health probe

use crate::official_server::SparqlGateMcpServer;
use anyhow::Context;
use axum::Router;
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
    pub keep_alive_seconds: u64,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            keep_alive_seconds: 15,
        }
    }
}

impl HttpServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Router with the MCP service under `/mcp` and `GET /health`
pub fn build_http_app(server: SparqlGateMcpServer, config: &HttpServerConfig) -> Router {
    let http_service = StreamableHttpService::new(
        move || Ok(server.clone()),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig {
            sse_keep_alive: Some(Duration::from_secs(config.keep_alive_seconds)),
            stateful_mode: true,
            ..Default::default()
        },
    );

    Router::new()
        .nest_service("/mcp", http_service)
        .route("/health", axum::routing::get(health_check))
}

pub async fn start_http_server(
    server: SparqlGateMcpServer,
    config: HttpServerConfig,
) -> anyhow::Result<()> {
    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("Invalid bind address: {}", config.bind_address()))?;

    let app = build_http_app(server, &config);

    info!("SparqlGate MCP HTTP server listening on http://{}", addr);
    info!("  POST http://{}/mcp - Initialize session and send MCP requests", addr);
    info!("  GET  http://{}/mcp - Open SSE stream (requires Mcp-Session-Id header)", addr);
    info!("  GET  http://{}/health - Health check", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(shutdown.clone()));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .context("HTTP server error")?;

    info!("SparqlGate MCP HTTP server stopped");
    Ok(())
}

async fn cancel_on_ctrl_c(token: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
            token.cancel();
        }
        Err(e) => warn!("Unable to listen for shutdown signal: {}", e),
    }
}

async fn health_check() -> &'static str {
    "OK"
}
