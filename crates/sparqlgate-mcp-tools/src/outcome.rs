use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use sparqlgate_core::SparqlError;

/// Per-invocation result of a tool, consumed once by the dispatch boundary
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolOutcome {
    #[serde(rename_all = "camelCase")]
    Success {
        data: JsonValue,
        #[serde(skip_serializing_if = "Option::is_none")]
        row_count: Option<usize>,
    },
    Failure {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        suggestion: Option<String>,
    },
}

impl ToolOutcome {
    pub fn success(data: JsonValue, row_count: Option<usize>) -> Self {
        ToolOutcome::Success { data, row_count }
    }

    pub fn failure(error: &SparqlError) -> Self {
        ToolOutcome::Failure {
            error: error.to_string(),
            suggestion: error.suggestion(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolOutcome::Failure { .. })
    }

    /// Serialized form; falls back to a bare failure object if `data` cannot be written
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            json!({ "error": format!("failed to serialize tool output: {}", e) }).to_string()
        })
    }
}

/// Rendered tool output ready for the transport
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResponse {
    pub outcome: ToolOutcome,
    /// Serialized outcome after the size budget was applied
    pub text: String,
    pub truncated: bool,
}

impl ToolResponse {
    pub fn is_error(&self) -> bool {
        self.outcome.is_error()
    }

    /// One-line summary for the audit trail
    pub fn audit_summary(&self) -> String {
        let mut summary = match &self.outcome {
            ToolOutcome::Success {
                row_count: Some(n), ..
            } => format!("ok rows={}", n),
            ToolOutcome::Success { .. } => "ok".to_string(),
            ToolOutcome::Failure { error, .. } => format!("error: {}", error),
        };
        if self.truncated {
            summary.push_str(" truncated");
        }
        summary
    }
}
