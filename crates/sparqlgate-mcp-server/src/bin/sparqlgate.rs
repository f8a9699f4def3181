use anyhow::{Context, Result};
use atty::Stream;
use clap::{Parser, Subcommand};
use rmcp::ServiceExt;
use sparqlgate_core::{ConfigManager, SparqlGateConfig};
use sparqlgate_mcp_server::SparqlGateMcpServer;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "sparqlgate",
    version,
    author,
    about = "SparqlGate - SPARQL query tools for MCP clients",
    long_about = "SparqlGate exposes a SPARQL endpoint to MCP clients through a small catalog of \
                  query tools with input sanitization, timeouts, compact results and output size limits."
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    verbose: bool,

    #[arg(long, global = true, help = "Configuration file path")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Start MCP server with specified transport")]
    Start {
        #[command(subcommand)]
        transport: TransportType,
    },

    #[command(about = "Inspect configuration")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum TransportType {
    #[command(about = "Start with STDIO transport (default)")]
    Stdio,

    #[command(about = "Start with HTTP streaming transport")]
    Http {
        #[arg(short = 'H', long, help = "Host to bind to", default_value = "127.0.0.1")]
        host: String,

        #[arg(short, long, help = "Port to bind to", default_value = "3000")]
        port: u16,

        #[arg(long, help = "SSE keep-alive interval in seconds", default_value = "15")]
        keep_alive: u64,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    #[command(about = "Print the resolved configuration as TOML")]
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_mgr = match &cli.config {
        Some(path) => ConfigManager::load_from(path),
        None => ConfigManager::load(),
    }
    .context("Failed to load configuration")?;

    match cli.command {
        Commands::Start { transport } => {
            handle_start(transport, config_mgr.into_config(), cli.verbose).await?;
        }
        Commands::Config {
            action: ConfigAction::Show,
        } => {
            handle_config_show(&config_mgr)?;
        }
    }

    Ok(())
}

async fn handle_start(
    transport: TransportType,
    config: SparqlGateConfig,
    verbose: bool,
) -> Result<()> {
    match transport {
        TransportType::Stdio => {
            // stdout carries the protocol; logs go to .sparqlgate/logs/mcp-server.log
            let log_dir = std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(".sparqlgate")
                .join("logs");
            std::fs::create_dir_all(&log_dir)
                .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

            let file_appender = tracing_appender::rolling::never(&log_dir, "mcp-server.log");
            let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

            let subscriber = tracing_subscriber::fmt()
                .with_writer(non_blocking)
                .with_env_filter(env_filter(&config, verbose))
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber).ok();

            let server = SparqlGateMcpServer::from_config(&config)
                .context("Failed to initialize SPARQL executor")?;

            if atty::is(Stream::Stderr) {
                eprintln!(
                    "SparqlGate MCP server (stdio) -> {}",
                    config.endpoint.url
                );
            }
            info!("Starting SparqlGate MCP server on stdio");

            let service = server
                .serve(rmcp::transport::stdio())
                .await
                .map_err(|e| anyhow::anyhow!("MCP server startup failed: {}", e))?;

            service
                .waiting()
                .await
                .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

            // Flush buffered log lines before exit
            drop(_guard);
        }
        TransportType::Http {
            host,
            port,
            keep_alive,
        } => {
            let subscriber = tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(env_filter(&config, verbose))
                .with_ansi(atty::is(Stream::Stderr))
                .finish();
            tracing::subscriber::set_global_default(subscriber).ok();

            #[cfg(not(feature = "server-http"))]
            {
                let _ = (host, port, keep_alive);
                eprintln!("HTTP transport requires the 'server-http' feature");
                eprintln!("   cargo build --release --features server-http");
                eprintln!("Or use STDIO transport:");
                eprintln!("   sparqlgate start stdio");

                return Err(anyhow::anyhow!(
                    "HTTP transport not enabled - rebuild with 'server-http' feature"
                ));
            }

            #[cfg(feature = "server-http")]
            {
                use sparqlgate_mcp_server::{start_http_server, HttpServerConfig};

                let server = SparqlGateMcpServer::from_config(&config)
                    .context("Failed to initialize SPARQL executor")?;
                let http_config = HttpServerConfig {
                    host,
                    port,
                    keep_alive_seconds: keep_alive,
                };

                info!(endpoint = %config.endpoint.url, "Starting SparqlGate MCP server on HTTP");
                start_http_server(server, http_config).await?;
            }
        }
    }

    Ok(())
}

fn handle_config_show(config_mgr: &ConfigManager) -> Result<()> {
    let source = config_mgr
        .config_path()
        .map(Path::display)
        .map(|p| p.to_string())
        .unwrap_or_else(|| "defaults".to_string());

    println!("# Source: {} (environment overrides applied)", source);
    println!("{}", config_mgr.to_toml().context("Failed to render configuration")?);
    Ok(())
}

/// RUST_LOG wins; otherwise `--verbose` means debug, else the configured level
fn env_filter(config: &SparqlGateConfig, verbose: bool) -> EnvFilter {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directive = log_directive(rust_log.as_deref(), config, verbose);
    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
}

fn log_directive(rust_log: Option<&str>, config: &SparqlGateConfig, verbose: bool) -> String {
    match rust_log.map(str::trim).filter(|d| !d.is_empty()) {
        Some(directive) => directive.to_string(),
        None if verbose => "debug".to_string(),
        None => config.logging.level.clone(),
    }
}
