// ABOUTME: MCP server entry (stdio/http) for the SPARQL tool catalog
// ABOUTME: Thin runtime layer wiring transports to SparqlGateMcpServer

pub mod official_server;
#[cfg(feature = "server-http")]
pub mod http_server;

pub use official_server::*;
#[cfg(feature = "server-http")]
pub use http_server::*;
