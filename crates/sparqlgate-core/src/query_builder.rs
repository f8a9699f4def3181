//! Query assembly from trusted templates and typed fragments.
//!
//! Templates are `&'static str` with `{{name}}` placeholders. Values reach
//! the query text only as [`Fragment`]s, and the only fragments that carry
//! caller data are the sanitized [`SafeLiteral`] and [`SafeUri`].

use crate::error::{Result, SparqlError};
use crate::sanitize::{SafeLiteral, SafeUri};
use std::collections::BTreeMap;
use std::fmt;

/// Namespace prefixes prepended to queries sent to the trusted endpoint
pub const DEFAULT_PREFIXES: &str = "\
PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>
PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>
PREFIX owl: <http://www.w3.org/2002/07/owl#>
PREFIX xsd: <http://www.w3.org/2001/XMLSchema#>
PREFIX skos: <http://www.w3.org/2004/02/skos/core#>
PREFIX dcterms: <http://purl.org/dc/terms/>
PREFIX foaf: <http://xmlns.com/foaf/0.1/>
PREFIX schema: <https://schema.org/>
";

/// Final query text, consumed by the executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparqlQuery(String);

impl SparqlQuery {
    /// A complete query written by the caller, sent as-is.
    ///
    /// Nothing is spliced into it; syntax errors surface from the endpoint.
    pub fn caller_supplied(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prepend a prefix block
    pub fn with_prefixes(&self, prefixes: &str) -> SparqlQuery {
        if prefixes.trim().is_empty() {
            return self.clone();
        }
        let mut text = String::with_capacity(prefixes.len() + self.0.len() + 1);
        text.push_str(prefixes);
        if !prefixes.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&self.0);
        SparqlQuery(text)
    }
}

impl fmt::Display for SparqlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A value substituted into a template placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Rendered as `"..."`
    Literal(SafeLiteral),
    /// Rendered as `<...>`
    Uri(SafeUri),
    /// Trusted text chosen by the tool, never by the caller
    Fixed(&'static str),
    Number(u64),
}

impl Fragment {
    fn render(&self, out: &mut String) {
        match self {
            Fragment::Literal(lit) => {
                out.push('"');
                out.push_str(lit.as_str());
                out.push('"');
            }
            Fragment::Uri(uri) => {
                out.push('<');
                out.push_str(uri.as_str());
                out.push('>');
            }
            Fragment::Fixed(text) => out.push_str(text),
            Fragment::Number(n) => out.push_str(&n.to_string()),
        }
    }
}

/// Fills a template's `{{name}}` placeholders in a single pass
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    template: &'static str,
    fragments: BTreeMap<&'static str, Fragment>,
}

impl QueryBuilder {
    pub fn new(template: &'static str) -> Self {
        Self {
            template,
            fragments: BTreeMap::new(),
        }
    }

    pub fn fragment(mut self, name: &'static str, fragment: Fragment) -> Self {
        self.fragments.insert(name, fragment);
        self
    }

    pub fn literal(self, name: &'static str, raw: &str) -> Self {
        self.fragment(name, Fragment::Literal(SafeLiteral::new(raw)))
    }

    pub fn uri(self, name: &'static str, raw: &str) -> Result<Self> {
        let uri = SafeUri::parse(raw)?;
        Ok(self.fragment(name, Fragment::Uri(uri)))
    }

    pub fn fixed(self, name: &'static str, text: &'static str) -> Self {
        self.fragment(name, Fragment::Fixed(text))
    }

    pub fn number(self, name: &'static str, value: u64) -> Self {
        self.fragment(name, Fragment::Number(value))
    }

    pub fn build(self) -> Result<SparqlQuery> {
        let mut out = String::with_capacity(self.template.len() + 64);
        let mut rest = self.template;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| {
                SparqlError::validation("unterminated placeholder in query template")
            })?;
            let name = after[..end].trim();
            let fragment = self.fragments.get(name).ok_or_else(|| {
                SparqlError::validation(format!("no value for template placeholder '{}'", name))
            })?;
            fragment.render(&mut out);
            rest = &after[end + 2..];
        }
        out.push_str(rest);

        Ok(SparqlQuery(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "SELECT ?s WHERE { ?s a {{class}} ; rdfs:label {{label}} } LIMIT {{limit}}";

    #[test]
    fn renders_typed_fragments() {
        let query = QueryBuilder::new(TEMPLATE)
            .uri("class", "http://example.org/City")
            .unwrap()
            .literal("label", "Roma")
            .number("limit", 10)
            .build()
            .unwrap();

        assert_eq!(
            query.as_str(),
            "SELECT ?s WHERE { ?s a <http://example.org/City> ; rdfs:label \"Roma\" } LIMIT 10"
        );
    }

    #[test]
    fn literal_injection_stays_inside_quotes() {
        let query = QueryBuilder::new(TEMPLATE)
            .uri("class", "http://example.org/City")
            .unwrap()
            .literal("label", "x\" } ; DELETE WHERE { ?a ?b ?c } #")
            .number("limit", 1)
            .build()
            .unwrap();

        assert!(query.as_str().contains(r#"rdfs:label "x\" } ; DELETE WHERE { ?a ?b ?c } #" }"#));
    }

    #[test]
    fn invalid_uri_is_rejected_before_build() {
        let err = QueryBuilder::new(TEMPLATE)
            .uri("class", "http://example.org/> . ?x ?y ?z . <")
            .unwrap_err();
        assert!(matches!(err, SparqlError::Validation(_)));
    }

    #[test]
    fn missing_placeholder_value_is_an_error() {
        let err = QueryBuilder::new(TEMPLATE)
            .literal("label", "Roma")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("class"));
    }

    #[test]
    fn substituted_values_are_not_re_expanded() {
        let query = QueryBuilder::new("SELECT * WHERE { ?s ?p {{v}} }")
            .literal("v", "{{v}}")
            .build()
            .unwrap();
        assert_eq!(query.as_str(), "SELECT * WHERE { ?s ?p \"{{v}}\" }");
    }

    #[test]
    fn prefixes_are_prepended() {
        let query = SparqlQuery::caller_supplied("SELECT * WHERE { ?s ?p ?o }");
        let with = query.with_prefixes(DEFAULT_PREFIXES);
        assert!(with.as_str().starts_with("PREFIX rdf:"));
        assert!(with.as_str().ends_with("SELECT * WHERE { ?s ?p ?o }"));
        assert_eq!(query.with_prefixes("  "), query);
    }
}
