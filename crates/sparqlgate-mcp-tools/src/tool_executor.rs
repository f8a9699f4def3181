// ABOUTME: Tool executor running the SPARQL pipelines behind each catalog tool
// ABOUTME: Validates arguments, builds queries, fans out, compresses and size-limits results

use crate::outcome::{ToolOutcome, ToolResponse};
use crate::templates;
use serde_json::{json, Value as JsonValue};
use sparqlgate_core::{
    DuplicateKeyPolicy, EndpointConfig, PaginationInfo, QueryBuilder, Result, ResultSet,
    SparqlError, SparqlGateConfig, SparqlQuery,
};
use sparqlgate_query::reconcile::read_count;
use sparqlgate_query::{
    compress, fan_out, AuxiliarySource, CountSource, HttpQueryExecutor, KeyedSource,
    OutputTruncator, QueryExecutor, QueryTarget, ReconcileRequest, Reconciler,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const TOOL_PROGRESS_LOG_TARGET: &str = "sparqlgate::mcp::tools";

/// Page size when a tool call omits `limit`
pub const DEFAULT_LIMIT: u64 = 50;
/// Larger `limit` values are capped to this
pub const MAX_LIMIT: u64 = 500;

/// Executes catalog tools by name with JSON arguments.
///
/// Never returns an error: every failure becomes a `ToolOutcome::Failure`.
pub struct SparqlToolExecutor {
    executor: Arc<dyn QueryExecutor>,
    endpoint: EndpointConfig,
    truncator: OutputTruncator,
    duplicate_policy: DuplicateKeyPolicy,
}

impl SparqlToolExecutor {
    /// Executor speaking HTTP to the configured endpoint
    pub fn from_config(config: &SparqlGateConfig) -> Result<Self> {
        let executor = HttpQueryExecutor::new(config.endpoint.prefix_block())?;
        Ok(Self::new(Arc::new(executor), config))
    }

    pub fn new(executor: Arc<dyn QueryExecutor>, config: &SparqlGateConfig) -> Self {
        info!(
            endpoint = %config.endpoint.url,
            max_output_chars = config.output.max_chars,
            "SparqlToolExecutor initialized"
        );

        Self {
            executor,
            endpoint: config.endpoint.clone(),
            truncator: OutputTruncator::new(config.output.max_chars),
            duplicate_policy: config.reconcile.duplicate_policy,
        }
    }

    pub async fn execute(&self, tool_name: &str, parameters: JsonValue) -> ToolResponse {
        log_tool_call_start(tool_name, &parameters);

        let result = match tool_name {
            "sparql_query" => self.execute_sparql_query(&parameters).await,
            "external_sparql_query" => self.execute_external_sparql_query(&parameters).await,
            "describe_resource" => self.execute_describe_resource(&parameters).await,
            "search_labels" => self.execute_search_labels(&parameters).await,
            "list_coded_entities" => self.execute_list_coded_entities(&parameters).await,
            _ => Err(SparqlError::validation(format!("Unknown tool: {}", tool_name))),
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                log_tool_call_error(tool_name, &err);
                ToolOutcome::failure(&err)
            }
        };

        let limited = self.truncator.truncate(&outcome.to_json_string());
        let response = ToolResponse {
            outcome,
            text: limited.text,
            truncated: limited.truncated,
        };

        log_tool_call_finish(tool_name, &response);
        response
    }

    async fn execute_sparql_query(&self, params: &JsonValue) -> Result<ToolOutcome> {
        let query = SparqlQuery::caller_supplied(required_str(params, "query")?);
        let target = QueryTarget::trusted(&self.endpoint);
        let rows = self.executor.execute(&query, &target).await?;
        compressed_outcome(&rows)
    }

    async fn execute_external_sparql_query(&self, params: &JsonValue) -> Result<ToolOutcome> {
        let target = QueryTarget::external(required_str(params, "endpoint")?, &self.endpoint)?;
        let query = SparqlQuery::caller_supplied(required_str(params, "query")?);
        let rows = self.executor.execute(&query, &target).await?;
        compressed_outcome(&rows)
    }

    async fn execute_describe_resource(&self, params: &JsonValue) -> Result<ToolOutcome> {
        let uri = required_str(params, "uri")?;
        let limit = limit_param(params)?;

        let facet = |template: &'static str| {
            QueryBuilder::new(template)
                .uri("uri", uri)?
                .number("limit", limit)
                .build()
        };
        let queries = [
            facet(templates::DESCRIBE_TYPES)?,
            facet(templates::DESCRIBE_PROPERTIES)?,
            facet(templates::DESCRIBE_INCOMING)?,
        ];

        let [types, properties, incoming] = self.fan_out_trusted(queries).await?;
        let row_count = types.len() + properties.len() + incoming.len();

        Ok(ToolOutcome::success(
            json!({
                "uri": uri,
                "types": compress(&types),
                "properties": compress(&properties),
                "incoming": compress(&incoming),
            }),
            Some(row_count),
        ))
    }

    async fn execute_search_labels(&self, params: &JsonValue) -> Result<ToolOutcome> {
        let text = required_str(params, "text")?;
        let language = optional_str(params, "language")?.unwrap_or("");
        let limit = limit_param(params)?;
        let offset = offset_param(params)?;

        let data_query = QueryBuilder::new(templates::SEARCH_LABELS)
            .literal("text", text)
            .literal("language", language)
            .number("limit", limit)
            .number("offset", offset)
            .build()?;
        let count_query = QueryBuilder::new(templates::SEARCH_LABELS_COUNT)
            .literal("text", text)
            .literal("language", language)
            .build()?;

        let [items, count] = self.fan_out_trusted([data_query, count_query]).await?;
        let total = read_count(&count, "total")?;
        let pagination = PaginationInfo::new(total, items.len() as u64, offset);

        Ok(ToolOutcome::success(
            json!({
                "items": compress(&items),
                "pagination": pagination,
            }),
            Some(items.len()),
        ))
    }

    async fn execute_list_coded_entities(&self, params: &JsonValue) -> Result<ToolOutcome> {
        let class_uri = required_str(params, "class_uri")?;
        let limit = limit_param(params)?;
        let offset = offset_param(params)?;

        let class_query = |template: &'static str| {
            QueryBuilder::new(template).uri("class", class_uri)
        };
        let page_query = |template: &'static str| {
            class_query(template)?
                .number("limit", limit)
                .number("offset", offset)
                .build()
        };
        let request = ReconcileRequest {
            primary: KeyedSource::new(page_query(templates::CODED_ENTITIES)?, "code", "label"),
            auxiliaries: vec![
                AuxiliarySource {
                    field: "parent".to_string(),
                    source: KeyedSource::new(
                        page_query(templates::CODED_ENTITY_PARENTS)?,
                        "code",
                        "parent",
                    ),
                },
                AuxiliarySource {
                    field: "alt_label".to_string(),
                    source: KeyedSource::new(
                        page_query(templates::CODED_ENTITY_ALT_LABELS)?,
                        "code",
                        "altLabel",
                    ),
                },
            ],
            count: CountSource {
                query: class_query(templates::CODED_ENTITIES_COUNT)?.build()?,
                count_var: "total".to_string(),
            },
            offset,
        };

        let reconciler = Reconciler::new(
            Arc::clone(&self.executor),
            QueryTarget::trusted(&self.endpoint),
            self.duplicate_policy,
        );
        let page = reconciler.reconcile(request).await?;
        let row_count = page.records.len();

        Ok(ToolOutcome::success(
            json!({
                "records": page.records,
                "pagination": page.pagination,
            }),
            Some(row_count),
        ))
    }

    /// Run `N` built queries concurrently against the trusted endpoint
    async fn fan_out_trusted<const N: usize>(
        &self,
        queries: [SparqlQuery; N],
    ) -> Result<[ResultSet; N]> {
        let target = QueryTarget::trusted(&self.endpoint);
        let jobs = queries
            .into_iter()
            .map(|query| (query, target.clone()))
            .collect();

        fan_out(Arc::clone(&self.executor), jobs)
            .await?
            .try_into()
            .map_err(|_| SparqlError::Internal("fan-out result count mismatch".to_string()))
    }
}

fn compressed_outcome(rows: &ResultSet) -> Result<ToolOutcome> {
    let data = serde_json::to_value(compress(rows))
        .map_err(|e| SparqlError::Internal(format!("failed to encode result: {}", e)))?;
    Ok(ToolOutcome::success(data, Some(rows.len())))
}

fn required_str<'a>(params: &'a JsonValue, name: &str) -> Result<&'a str> {
    match optional_str(params, name)? {
        Some(value) if !value.trim().is_empty() => Ok(value),
        Some(_) => Err(SparqlError::validation(format!(
            "Argument '{}' must not be empty",
            name
        ))),
        None => Err(SparqlError::validation(format!(
            "Missing required argument '{}'",
            name
        ))),
    }
}

fn optional_str<'a>(params: &'a JsonValue, name: &str) -> Result<Option<&'a str>> {
    match params.get(name) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(SparqlError::validation(format!(
            "Argument '{}' must be a string, got {}",
            name, other
        ))),
    }
}

fn optional_u64(params: &JsonValue, name: &str) -> Result<Option<u64>> {
    match params.get(name) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| {
            SparqlError::validation(format!(
                "Argument '{}' must be a non-negative integer, got {}",
                name, value
            ))
        }),
    }
}

/// `limit`, defaulted and capped
fn limit_param(params: &JsonValue) -> Result<u64> {
    match optional_u64(params, "limit")? {
        None => Ok(DEFAULT_LIMIT),
        Some(0) => Err(SparqlError::validation("Argument 'limit' must be at least 1")),
        Some(limit) if limit > MAX_LIMIT => {
            debug!(requested = limit, cap = MAX_LIMIT, "Capping limit");
            Ok(MAX_LIMIT)
        }
        Some(limit) => Ok(limit),
    }
}

fn offset_param(params: &JsonValue) -> Result<u64> {
    Ok(optional_u64(params, "offset")?.unwrap_or(0))
}

fn log_tool_call_start(tool_name: &str, parameters: &JsonValue) {
    info!(
        target: TOOL_PROGRESS_LOG_TARGET,
        tool = tool_name,
        "Tool call started"
    );
    debug!(
        target: TOOL_PROGRESS_LOG_TARGET,
        tool = tool_name,
        "Tool input payload: {}",
        parameters
    );
}

fn log_tool_call_finish(tool_name: &str, response: &ToolResponse) {
    info!(
        target: TOOL_PROGRESS_LOG_TARGET,
        tool = tool_name,
        is_error = response.is_error(),
        truncated = response.truncated,
        chars = response.text.chars().count(),
        "Tool call completed"
    );
    debug!(
        target: TOOL_PROGRESS_LOG_TARGET,
        tool = tool_name,
        "Tool output payload: {}",
        response.text
    );
}

fn log_tool_call_error(tool_name: &str, err: &SparqlError) {
    match err {
        SparqlError::Validation(_) => warn!(
            target: TOOL_PROGRESS_LOG_TARGET,
            tool = tool_name,
            "Tool arguments rejected: {}",
            err
        ),
        _ => error!(
            target: TOOL_PROGRESS_LOG_TARGET,
            tool = tool_name,
            kind = err.kind(),
            "Tool call failed: {}",
            err
        ),
    }
}
