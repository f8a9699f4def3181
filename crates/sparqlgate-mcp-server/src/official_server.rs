// ABOUTME: MCP server exposing the SPARQL tool catalog through the official rmcp SDK
// ABOUTME: Renders tool outcomes with an error flag and appends every call to the audit trail

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sparqlgate_core::SparqlGateConfig;
use sparqlgate_mcp_tools::{AuditLogger, SparqlToolExecutor, ToolResponse};
use sparqlgate_query::QueryExecutor;
use std::sync::Arc;
use tracing::warn;

pub const SERVER_INSTRUCTIONS: &str = "SparqlGate answers questions from RDF knowledge graphs. \
Use sparql_query for SELECT queries on the configured endpoint (common prefixes are pre-declared), \
external_sparql_query for public endpoints, describe_resource to profile one URI, \
search_labels to find resources by label text and list_coded_entities for code lists. \
Results of up to 5 rows are records; larger results are headers plus rows. \
Outputs over the size budget come back wrapped as { _truncated, _message, data }: paginate or add LIMIT.";

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SparqlQueryRequest {
    /// Complete SPARQL SELECT query; add LIMIT for large graphs
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ExternalSparqlQueryRequest {
    /// Absolute http(s) URL of the SPARQL endpoint
    pub endpoint: String,
    /// Complete SPARQL SELECT query including PREFIX declarations
    pub query: String,
}

// Optional arguments are carried as raw JSON; `SparqlToolExecutor` validates them.

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DescribeResourceRequest {
    /// Absolute URI of the resource
    pub uri: String,
    /// Maximum rows per facet (default 50, max 500)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<u64>")]
    pub limit: Option<JsonValue>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchLabelsRequest {
    /// Text to look for inside rdfs:label values (case-insensitive)
    pub text: String,
    /// Language tag to restrict labels to (e.g. "en")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub language: Option<JsonValue>,
    /// Page size (default 50, max 500)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<u64>")]
    pub limit: Option<JsonValue>,
    /// Rows to skip (default 0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<u64>")]
    pub offset: Option<JsonValue>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListCodedEntitiesRequest {
    /// Absolute URI of the class whose members carry skos:notation codes
    pub class_uri: String,
    /// Page size (default 50, max 500)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<u64>")]
    pub limit: Option<JsonValue>,
    /// Rows to skip (default 0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<u64>")]
    pub offset: Option<JsonValue>,
}

#[derive(Clone)]
pub struct SparqlGateMcpServer {
    tools: Arc<SparqlToolExecutor>,
    audit: Option<Arc<AuditLogger>>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl SparqlGateMcpServer {
    pub fn new(tools: Arc<SparqlToolExecutor>, audit: Option<Arc<AuditLogger>>) -> Self {
        Self {
            tools,
            audit,
            tool_router: Self::tool_router(),
        }
    }

    /// HTTP executor and audit trail as configured.
    ///
    /// An audit file that cannot be opened disables auditing with a warning.
    pub fn from_config(config: &SparqlGateConfig) -> sparqlgate_core::Result<Self> {
        let tools = SparqlToolExecutor::from_config(config)?;
        Ok(Self::new(Arc::new(tools), open_audit(config)))
    }

    /// Like `from_config` but with a caller-provided query executor
    pub fn with_executor(executor: Arc<dyn QueryExecutor>, config: &SparqlGateConfig) -> Self {
        let tools = SparqlToolExecutor::new(executor, config);
        Self::new(Arc::new(tools), open_audit(config))
    }

    #[tool(
        description = "Run a SPARQL SELECT query on the configured endpoint. Common prefixes (rdf, rdfs, owl, xsd, skos, dcterms, foaf, schema) are declared for you. Required: query."
    )]
    async fn sparql_query(
        &self,
        params: Parameters<SparqlQueryRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch("sparql_query", &params.0).await
    }

    #[tool(
        description = "Run a SPARQL SELECT query on a public endpoint such as https://query.wikidata.org/sparql. No prefixes are added and a shorter timeout applies. Required: endpoint, query."
    )]
    async fn external_sparql_query(
        &self,
        params: Parameters<ExternalSparqlQueryRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch("external_sparql_query", &params.0).await
    }

    #[tool(
        description = "Profile a resource: its types, its outgoing property values and the resources linking to it. Required: uri. Optional: limit per facet."
    )]
    async fn describe_resource(
        &self,
        params: Parameters<DescribeResourceRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch("describe_resource", &params.0).await
    }

    #[tool(
        description = "Find resources whose rdfs:label contains some text. Returns one page of matches with pagination (total, has_more, next_offset). Required: text. Optional: language, limit, offset."
    )]
    async fn search_labels(
        &self,
        params: Parameters<SearchLabelsRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch("search_labels", &params.0).await
    }

    #[tool(
        description = "List members of a SKOS code list class, one record per skos:notation code with label, parent label and alternative label, ordered by code. Required: class_uri. Optional: limit, offset."
    )]
    async fn list_coded_entities(
        &self,
        params: Parameters<ListCodedEntitiesRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch("list_coded_entities", &params.0).await
    }
}

impl SparqlGateMcpServer {
    /// Run one tool and render its outcome; pipeline failures never escape as protocol errors
    async fn dispatch<T: Serialize>(
        &self,
        tool_name: &str,
        request: &T,
    ) -> Result<CallToolResult, McpError> {
        let args = serde_json::to_value(request)
            .map_err(|e| McpError::invalid_params(format!("Unreadable arguments: {}", e), None))?;

        let response = self.tools.execute(tool_name, args.clone()).await;

        if let Some(audit) = &self.audit {
            audit.record(tool_name, &args, &response.audit_summary());
        }

        Ok(render(response))
    }
}

fn render(response: ToolResponse) -> CallToolResult {
    let is_error = response.is_error();
    let content = vec![Content::text(response.text)];
    if is_error {
        CallToolResult::error(content)
    } else {
        CallToolResult::success(content)
    }
}

fn open_audit(config: &SparqlGateConfig) -> Option<Arc<AuditLogger>> {
    if !config.audit.enabled {
        return None;
    }
    match AuditLogger::open(&config.audit.path) {
        Ok(logger) => Some(Arc::new(logger)),
        Err(e) => {
            warn!(
                path = %config.audit.path.display(),
                "Audit log unavailable, continuing without it: {}",
                e
            );
            None
        }
    }
}

#[tool_handler]
impl ServerHandler for SparqlGateMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_logging()
                .build(),
            ..Default::default()
        }
    }
}
