// ABOUTME: MCP tool layer for SPARQL endpoints
// ABOUTME: Provides SparqlToolExecutor, query templates and the audit trail for the MCP server

pub mod audit_logger;
pub mod outcome;
pub mod templates;
pub mod tool_executor;

pub use audit_logger::AuditLogger;
pub use outcome::{ToolOutcome, ToolResponse};
pub use tool_executor::{SparqlToolExecutor, DEFAULT_LIMIT, MAX_LIMIT};
