// ABOUTME: Output size budget enforcement for serialized tool results
// ABOUTME: Re-wraps oversized payloads as valid JSON holding their well-formed leading prefix

use serde_json::{json, Value as JsonValue};
use tracing::{debug, warn};

/// Reference output budget in characters
pub const DEFAULT_MAX_OUTPUT_CHARS: usize = 50_000;

/// Candidate cut points tried before giving up on a partial payload
const MAX_REPAIR_ATTEMPTS: usize = 32;

/// Result of applying the size budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Truncated {
    pub text: String,
    pub truncated: bool,
}

/// Enforces a maximum serialized size, always emitting valid JSON
#[derive(Debug, Clone, Copy)]
pub struct OutputTruncator {
    limit_chars: usize,
}

impl Default for OutputTruncator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_OUTPUT_CHARS)
    }
}

impl OutputTruncator {
    pub fn new(limit_chars: usize) -> Self {
        Self { limit_chars }
    }

    pub fn limit_chars(&self) -> usize {
        self.limit_chars
    }

    pub fn truncate(&self, text: &str) -> Truncated {
        truncate(text, self.limit_chars)
    }
}

/// Pass `text` through if it fits, otherwise replace it with
/// `{ "_truncated": true, "_message": ..., "data": <partial> }` where
/// `data` is the longest prefix ending at a closing bracket that parses once
/// its open containers are closed.
pub fn truncate(text: &str, limit_chars: usize) -> Truncated {
    let original_chars = text.chars().count();
    if original_chars <= limit_chars {
        return Truncated {
            text: text.to_string(),
            truncated: false,
        };
    }

    let message = format!(
        "Output truncated: {} characters exceeded the {} character limit. `data` holds the leading complete portion; narrow the query or paginate for the rest.",
        original_chars, limit_chars
    );
    let overhead = envelope(&message, JsonValue::Null).chars().count() - "null".len();

    let mut window = limit_chars.saturating_sub(overhead);
    for _ in 0..MAX_REPAIR_ATTEMPTS {
        if window == 0 {
            break;
        }
        let Some(partial) = longest_valid_prefix(text, window) else {
            break;
        };
        let wrapped = envelope(&message, partial);
        let wrapped_chars = wrapped.chars().count();
        if wrapped_chars <= limit_chars {
            warn!(
                original_chars,
                limit_chars,
                emitted_chars = wrapped_chars,
                "Tool output exceeded size budget, truncated"
            );
            return Truncated {
                text: wrapped,
                truncated: true,
            };
        }
        // Re-serialization came out longer than the source slice; shrink and retry.
        window = window.saturating_sub(wrapped_chars - limit_chars + 1);
    }

    warn!(
        original_chars,
        limit_chars, "No well-formed prefix fits the size budget, emitting marker only"
    );
    let text = envelope(&message, JsonValue::Null);
    if text.chars().count() <= limit_chars {
        return Truncated {
            text,
            truncated: true,
        };
    }
    // Budget too small for the message itself.
    Truncated {
        text: json!({ "_truncated": true, "data": null }).to_string(),
        truncated: true,
    }
}

fn envelope(message: &str, data: JsonValue) -> String {
    json!({
        "_truncated": true,
        "_message": message,
        "data": data,
    })
    .to_string()
}

/// Parse the best-effort prefix of the first `window_chars` characters
fn longest_valid_prefix(text: &str, window_chars: usize) -> Option<JsonValue> {
    let cut_at = text
        .char_indices()
        .nth(window_chars)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    let window = &text[..cut_at];

    let mut tried = 0;
    for end in closing_boundaries(window).into_iter().rev() {
        if tried == MAX_REPAIR_ATTEMPTS {
            break;
        }
        tried += 1;

        let Some(repaired) = close_open_containers(&window[..end]) else {
            continue;
        };
        match serde_json::from_str::<JsonValue>(&repaired) {
            Ok(value) => return Some(value),
            Err(e) => debug!("Discarding truncation candidate at byte {}: {}", end, e),
        }
    }
    None
}

/// Byte offsets just past each `}` or `]` that closes a nested (non-root) value
fn closing_boundaries(window: &str) -> Vec<usize> {
    let mut boundaries = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, byte) in window.bytes().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                if depth > 0 {
                    boundaries.push(idx + 1);
                }
            }
            _ => {}
        }
    }
    boundaries
}

/// Append the closers for every container still open at the end of `prefix`
fn close_open_containers(prefix: &str) -> Option<String> {
    let mut stack: Vec<u8> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for byte in prefix.bytes() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => stack.push(b'}'),
            b'[' => stack.push(b']'),
            b'}' | b']' => {
                if stack.pop() != Some(byte) {
                    return None;
                }
            }
            _ => {}
        }
    }

    if in_string {
        return None;
    }

    let mut repaired = String::with_capacity(prefix.len() + stack.len());
    repaired.push_str(prefix);
    repaired.extend(stack.iter().rev().map(|b| *b as char));
    Some(repaired)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn large_payload(target_chars: usize) -> String {
        let mut rows = Vec::new();
        let mut i = 0;
        loop {
            rows.push(json!({
                "code": format!("{:06}", i),
                "label": format!("Comune di \"Esempio\" n. {} àèìòù ß", i),
                "parent": {"code": format!("{:03}", i % 107), "label": "Provincia"}
            }));
            let text = json!({ "data": rows, "rowCount": rows.len() }).to_string();
            if text.chars().count() >= target_chars {
                return text;
            }
            i += 1;
        }
    }

    #[test]
    fn small_payload_passes_through() {
        let text = r#"{"data":[{"a":"1"}],"rowCount":1}"#;
        let out = truncate(text, 1000);
        assert!(!out.truncated);
        assert_eq!(out.text, text);
    }

    #[test]
    fn payload_at_limit_is_not_truncated() {
        let text = "[1,2,3]";
        assert!(!truncate(text, text.len()).truncated);
    }

    #[test]
    fn oversized_payload_is_rewrapped_as_valid_json() {
        let payload = large_payload(60_000);
        assert!(payload.chars().count() >= 60_000);

        let out = truncate(&payload, 50_000);
        assert!(out.truncated);
        assert!(out.text.chars().count() <= 50_000);

        let value: JsonValue = serde_json::from_str(&out.text).expect("valid JSON");
        assert_eq!(value["_truncated"], json!(true));
        assert!(value["_message"].as_str().unwrap().contains("50000"));

        let rows = value["data"]["data"].as_array().expect("partial rows kept");
        assert!(!rows.is_empty());
        assert_eq!(rows[0]["code"], json!("000000"));
        // Every kept row is complete
        assert!(rows.iter().all(|r| r.get("parent").is_some()));
    }

    #[test]
    fn tabular_payload_keeps_whole_rows() {
        let rows: Vec<JsonValue> = (0..5000)
            .map(|i| json!([format!("{:05}", i), format!("Label {}", i), null]))
            .collect();
        let payload = json!({"data": {"headers": ["code", "label", "x"], "rows": rows}}).to_string();

        let out = truncate(&payload, 2_000);
        assert!(out.truncated);
        assert!(out.text.chars().count() <= 2_000);
        let value: JsonValue = serde_json::from_str(&out.text).unwrap();
        let kept = value["data"]["data"]["rows"].as_array().unwrap();
        assert!(!kept.is_empty());
        assert!(kept.iter().all(|r| r.as_array().unwrap().len() == 3));
    }

    #[test]
    fn brackets_inside_strings_are_ignored() {
        let payload = json!({
            "data": (0..200).map(|i| json!({"v": format!("}}]]{{[[\"{}", i)})).collect::<Vec<_>>()
        })
        .to_string();
        let out = truncate(&payload, 1_000);
        let value: JsonValue = serde_json::from_str(&out.text).unwrap();
        assert_eq!(value["_truncated"], json!(true));
        assert!(!value["data"]["data"].as_array().unwrap().is_empty());
    }

    #[test]
    fn payload_without_inner_boundaries_yields_null_data() {
        let payload = format!("\"{}\"", "x".repeat(5_000));
        let out = truncate(&payload, 500);
        assert!(out.truncated);
        let value: JsonValue = serde_json::from_str(&out.text).unwrap();
        assert_eq!(value["data"], JsonValue::Null);
        assert!(out.text.chars().count() <= 500);
    }

    #[test]
    fn tiny_budget_still_emits_valid_json() {
        let out = truncate(&"[".repeat(100), 40);
        assert!(out.truncated);
        assert!(serde_json::from_str::<JsonValue>(&out.text).is_ok());
    }

    #[test]
    fn close_open_containers_balances_prefix() {
        assert_eq!(
            close_open_containers(r#"{"a":[{"b":1}"#).as_deref(),
            Some(r#"{"a":[{"b":1}]}"#)
        );
        assert_eq!(close_open_containers(r#"{"a":"unterminated"#), None);
    }
}
