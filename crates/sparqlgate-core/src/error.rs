use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SparqlError {
    /// Caller input rejected before any network call was attempted
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Query to {endpoint} timed out after {timeout_ms}ms")]
    Timeout { endpoint: String, timeout_ms: u64 },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Response body did not have the `{ head, results }` shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Response body grew past the byte cap of its target
    #[error("Response from {endpoint} exceeded {limit_bytes} bytes")]
    ResponseTooLarge { endpoint: String, limit_bytes: usize },

    /// Connection-level failure with no HTTP status (DNS, refused, TLS)
    #[error("Transport error: {0}")]
    Transport(String),

    /// A fan-out task panicked or was cancelled
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SparqlError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Short machine-friendly kind, used in logs and audit summaries
    pub fn kind(&self) -> &'static str {
        match self {
            SparqlError::Validation(_) => "validation",
            SparqlError::Timeout { .. } => "timeout",
            SparqlError::Http { .. } => "http",
            SparqlError::Parse(_) => "parse",
            SparqlError::ResponseTooLarge { .. } => "response_too_large",
            SparqlError::Transport(_) => "transport",
            SparqlError::Internal(_) => "internal",
        }
    }

    /// Hint shown to the caller alongside the error message
    pub fn suggestion(&self) -> Option<String> {
        match self {
            SparqlError::Validation(_) => Some(
                "Check the arguments: URIs must be absolute http(s) URIs without spaces or <>\"{}|\\^` characters"
                    .to_string(),
            ),
            SparqlError::Timeout { .. } => Some(
                "Narrow the query (add LIMIT, more specific patterns) or retry later".to_string(),
            ),
            SparqlError::Http { status, .. } if *status == 400 => {
                Some("The endpoint rejected the query; check the SPARQL syntax and prefixes".to_string())
            }
            SparqlError::Http { status, .. } if *status >= 500 => {
                Some("The endpoint reported a server error; retry later".to_string())
            }
            SparqlError::Http { .. } => None,
            SparqlError::Parse(_) => Some(
                "Only SELECT queries returning SPARQL JSON results are supported".to_string(),
            ),
            SparqlError::ResponseTooLarge { .. } => Some(
                "Add LIMIT or project fewer variables to shrink the result".to_string(),
            ),
            SparqlError::Transport(_) => {
                Some("Verify the endpoint URL is reachable from this host".to_string())
            }
            SparqlError::Internal(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SparqlError>;
