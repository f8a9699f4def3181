// ABOUTME: SPARQL protocol client executing one query against one endpoint
// ABOUTME: Enforces a per-call deadline and maps transport/parse failures to SparqlError

use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, Response};
use serde_json::Value as JsonValue;
use sparqlgate_core::{sanitize_uri, EndpointConfig, Result, ResultSet, SparqlError, SparqlQuery};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Media type of SPARQL 1.1 Query Results JSON
pub const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

/// Form field carrying the query text
pub const QUERY_FORM_FIELD: &str = "query";

/// Longest endpoint error body echoed into an error message
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Where and how a single query runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTarget {
    pub endpoint_url: String,
    pub inject_prefixes: bool,
    pub timeout: Duration,
    /// Cap on the response body; `None` reads it whole
    pub max_response_bytes: Option<usize>,
}

impl QueryTarget {
    pub fn new(endpoint_url: impl Into<String>, inject_prefixes: bool, timeout: Duration) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            inject_prefixes,
            timeout,
            max_response_bytes: None,
        }
    }

    pub fn with_max_response_bytes(mut self, limit: usize) -> Self {
        self.max_response_bytes = Some(limit);
        self
    }

    /// The configured internal endpoint: prefixes injected, internal deadline
    pub fn trusted(config: &EndpointConfig) -> Self {
        Self::new(config.url.clone(), true, config.internal_timeout())
    }

    /// A caller-supplied endpoint: validated, no prefixes, external deadline, capped body
    pub fn external(url: &str, config: &EndpointConfig) -> Result<Self> {
        let url = sanitize_uri(url)?;
        Ok(Self::new(url, false, config.external_timeout())
            .with_max_response_bytes(config.external_max_response_bytes))
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Executes queries; implemented over HTTP and by test doubles
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, query: &SparqlQuery, target: &QueryTarget) -> Result<ResultSet>;
}

/// HTTP executor speaking the SPARQL 1.1 protocol (POST, form-encoded)
#[derive(Clone)]
pub struct HttpQueryExecutor {
    client: Client,
    prefixes: String,
}

impl fmt::Debug for HttpQueryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpQueryExecutor")
            .field("prefix_lines", &self.prefixes.lines().count())
            .finish()
    }
}

impl HttpQueryExecutor {
    /// `prefixes` is the block prepended when a target asks for injection
    pub fn new(prefixes: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SparqlError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self::with_client(client, prefixes))
    }

    pub fn with_client(client: Client, prefixes: impl Into<String>) -> Self {
        Self {
            client,
            prefixes: prefixes.into(),
        }
    }

    async fn send(&self, query: &SparqlQuery, target: &QueryTarget) -> Result<ResultSet> {
        let response = self
            .client
            .post(&target.endpoint_url)
            .header(ACCEPT, SPARQL_RESULTS_JSON)
            .header(USER_AGENT, concat!("sparqlgate/", env!("CARGO_PKG_VERSION")))
            .form(&[(QUERY_FORM_FIELD, query.as_str())])
            .send()
            .await
            .map_err(map_network_error)?;

        if !response.status().is_success() {
            return Err(map_status_error(response).await);
        }

        let body = read_body(response, target).await?;
        let value: JsonValue = serde_json::from_slice(&body)
            .map_err(|e| SparqlError::parse(format!("response is not JSON: {}", e)))?;

        ResultSet::from_sparql_json(value)
    }
}

#[async_trait]
impl QueryExecutor for HttpQueryExecutor {
    async fn execute(&self, query: &SparqlQuery, target: &QueryTarget) -> Result<ResultSet> {
        let query = if target.inject_prefixes {
            query.with_prefixes(&self.prefixes)
        } else {
            query.clone()
        };

        debug!(
            endpoint = %target.endpoint_url,
            timeout_ms = target.timeout_ms(),
            "Executing SPARQL query: {}",
            query
        );

        // Dropping the request future on expiry aborts the in-flight call.
        match tokio::time::timeout(target.timeout, self.send(&query, target)).await {
            Ok(Ok(result_set)) => {
                debug!(
                    endpoint = %target.endpoint_url,
                    rows = result_set.len(),
                    "SPARQL query completed"
                );
                Ok(result_set)
            }
            Ok(Err(err)) => {
                error!(
                    endpoint = %target.endpoint_url,
                    kind = err.kind(),
                    "SPARQL query failed: {}",
                    err
                );
                Err(err)
            }
            Err(_) => {
                warn!(
                    endpoint = %target.endpoint_url,
                    timeout_ms = target.timeout_ms(),
                    "SPARQL query timed out"
                );
                Err(SparqlError::Timeout {
                    endpoint: target.endpoint_url.clone(),
                    timeout_ms: target.timeout_ms(),
                })
            }
        }
    }
}

/// Map a non-2xx response, keeping a bounded slice of the body
async fn map_status_error(response: Response) -> SparqlError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let body = body.trim();

    let message = if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.chars().take(MAX_ERROR_BODY_CHARS).collect()
    };

    SparqlError::Http {
        status: status.as_u16(),
        message,
    }
}

async fn read_body(mut response: Response, target: &QueryTarget) -> Result<Vec<u8>> {
    let Some(limit) = target.max_response_bytes else {
        let body = response.bytes().await.map_err(map_network_error)?;
        return Ok(body.to_vec());
    };

    let too_large = || SparqlError::ResponseTooLarge {
        endpoint: target.endpoint_url.clone(),
        limit_bytes: limit,
    };

    if response.content_length().is_some_and(|len| len > limit as u64) {
        return Err(too_large());
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(map_network_error)? {
        if body.len() + chunk.len() > limit {
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

fn map_network_error(e: reqwest::Error) -> SparqlError {
    if e.is_connect() {
        SparqlError::Transport(format!("connection failed: {}", e))
    } else if e.is_decode() || e.is_body() {
        SparqlError::Transport(format!("failed to read response: {}", e))
    } else {
        SparqlError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trusted_target_injects_prefixes_with_internal_deadline() {
        let config = EndpointConfig::default();
        let target = QueryTarget::trusted(&config);
        assert!(target.inject_prefixes);
        assert_eq!(target.timeout, Duration::from_millis(config.internal_timeout_ms));
        assert_eq!(target.endpoint_url, config.url);
    }

    #[test]
    fn external_target_is_validated_and_bounded_tighter() {
        let config = EndpointConfig::default();
        let target = QueryTarget::external("https://query.wikidata.org/sparql", &config).unwrap();
        assert!(!target.inject_prefixes);
        assert!(target.timeout < QueryTarget::trusted(&config).timeout);
        assert_eq!(target.max_response_bytes, Some(config.external_max_response_bytes));
        assert_eq!(QueryTarget::trusted(&config).max_response_bytes, None);

        let err = QueryTarget::external("file:///etc/passwd", &config).unwrap_err();
        assert!(matches!(err, SparqlError::Validation(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let executor = HttpQueryExecutor::new("").unwrap();
        // Port 9 (discard) on localhost is closed on typical hosts
        let target = QueryTarget::new("http://127.0.0.1:9/sparql", false, Duration::from_secs(5));
        let err = executor
            .execute(&SparqlQuery::caller_supplied("SELECT * WHERE { ?s ?p ?o }"), &target)
            .await
            .unwrap_err();
        assert!(matches!(err, SparqlError::Transport(_) | SparqlError::Timeout { .. }));
    }
}
