//! Escaping and validation of caller strings before they reach query text.
//!
//! Only the types produced here ([`SafeLiteral`], [`SafeUri`]) are accepted
//! by the query builder as interpolated fragments.

use crate::error::{Result, SparqlError};
use url::Url;

/// Characters never allowed inside an IRI reference
const FORBIDDEN_URI_CHARS: [char; 10] = ['<', '>', '"', '{', '}', '|', '\\', '^', '`', ' '];

/// Escape a string for use inside a double-quoted literal.
///
/// Order matters: backslash first, so escapes added later are not re-escaped.
pub fn sanitize_literal(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

/// Accept only absolute http(s) URIs free of characters that could break out
/// of an IRI reference. Valid input is returned unchanged.
pub fn sanitize_uri(input: &str) -> Result<String> {
    if input.is_empty() {
        return Err(SparqlError::validation("URI must not be empty"));
    }

    if let Some(bad) = input
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || FORBIDDEN_URI_CHARS.contains(c))
    {
        return Err(SparqlError::validation(format!(
            "URI contains forbidden character {:?}: {}",
            bad, input
        )));
    }

    let lower = input.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return Err(SparqlError::validation(format!(
            "URI must be an absolute http or https URI: {}",
            input
        )));
    }

    let parsed = Url::parse(input)
        .map_err(|e| SparqlError::validation(format!("invalid URI '{}': {}", input, e)))?;
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(SparqlError::validation(format!("URI has no host: {}", input)));
    }

    Ok(input.to_string())
}

/// A string already escaped for a quoted literal position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeLiteral(String);

impl SafeLiteral {
    pub fn new(raw: &str) -> Self {
        Self(sanitize_literal(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A URI that passed [`sanitize_uri`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeUri(String);

impl SafeUri {
    pub fn parse(raw: &str) -> Result<Self> {
        sanitize_uri(raw).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Inverse of `sanitize_literal`, for the round-trip property
    fn unescape_literal(escaped: &str) -> String {
        let mut out = String::with_capacity(escaped.len());
        let mut chars = escaped.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        }
        out
    }

    #[test]
    fn literal_escapes_quote_and_backslash() {
        let escaped = sanitize_literal(r#"a"b\c"#);
        assert_eq!(escaped, r#"a\"b\\c"#);
        assert_eq!(unescape_literal(&escaped), r#"a"b\c"#);
    }

    #[test]
    fn literal_round_trips_mixed_input() {
        for raw in ["plain", "line\nbreak", "cr\r\n", "\\\"", "\"; DROP ALL } #", ""] {
            assert_eq!(unescape_literal(&sanitize_literal(raw)), raw, "input {:?}", raw);
        }
    }

    #[test]
    fn literal_never_leaves_bare_quote() {
        let escaped = sanitize_literal("x\" } ; INSERT DATA { <a> <b> <c> } #");
        let bytes = escaped.as_bytes();
        for (i, b) in bytes.iter().enumerate() {
            if *b == b'"' {
                assert_eq!(bytes[i - 1], b'\\');
            }
        }
    }

    #[test]
    fn uri_accepts_absolute_http_uris_unchanged() {
        for uri in [
            "http://example.org/resource/1",
            "https://dati.example.it/ontology#Comune",
            "HTTPS://Example.org/a?b=c&d=e",
        ] {
            assert_eq!(sanitize_uri(uri).unwrap(), uri);
        }
    }

    #[test]
    fn uri_rejects_forbidden_characters() {
        for uri in [
            "http://example.org/a b",
            "http://example.org/a\tb",
            "http://example.org/<a>",
            "http://example.org/\"a",
            "http://example.org/{a}",
            "http://example.org/a|b",
            "http://example.org/a\\b",
            "http://example.org/a^b",
            "http://example.org/a`b",
            "http://example.org/a>",
        ] {
            let err = sanitize_uri(uri).unwrap_err();
            assert!(matches!(err, SparqlError::Validation(_)), "{}", uri);
        }
    }

    #[test]
    fn uri_rejects_relative_and_non_http() {
        for uri in ["", "example.org/a", "/relative", "ftp://example.org/x", "urn:isbn:123", "mailto:a@b.c", "http://"] {
            assert!(sanitize_uri(uri).is_err(), "{}", uri);
        }
    }

    #[test]
    fn safe_wrappers_apply_sanitizers() {
        assert_eq!(SafeLiteral::new("a\"b").as_str(), "a\\\"b");
        assert!(SafeUri::parse("http://example.org/x").is_ok());
        assert!(SafeUri::parse("javascript:alert(1)").is_err());
    }
}
