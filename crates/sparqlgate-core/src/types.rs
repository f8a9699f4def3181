use crate::error::{Result, SparqlError};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashSet};

/// Kind tag of a single SPARQL binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BindingKind {
    Uri,
    Literal,
    BlankNode,
}

/// One variable's value in one result row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub kind: BindingKind,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Binding {
    pub fn uri(value: impl Into<String>) -> Self {
        Self {
            kind: BindingKind::Uri,
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            kind: BindingKind::Literal,
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    pub fn typed_literal(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            datatype: Some(datatype.into()),
            ..Self::literal(value)
        }
    }

    pub fn lang_literal(value: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            language: Some(language.into()),
            ..Self::literal(value)
        }
    }

    pub fn blank_node(value: impl Into<String>) -> Self {
        Self {
            kind: BindingKind::BlankNode,
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    /// Plain string form, metadata dropped
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

/// Wire form of a binding in SPARQL 1.1 Query Results JSON
#[derive(Debug, Deserialize)]
struct WireBinding {
    #[serde(rename = "type")]
    kind: String,
    value: String,
    #[serde(default)]
    datatype: Option<String>,
    #[serde(default, rename = "xml:lang")]
    language: Option<String>,
}

impl TryFrom<WireBinding> for Binding {
    type Error = SparqlError;

    fn try_from(wire: WireBinding) -> Result<Self> {
        let kind = match wire.kind.as_str() {
            "uri" => BindingKind::Uri,
            "literal" | "typed-literal" => BindingKind::Literal,
            "bnode" => BindingKind::BlankNode,
            other => {
                return Err(SparqlError::parse(format!("unknown binding type '{}'", other)));
            }
        };
        Ok(Binding {
            kind,
            value: wire.value,
            datatype: wire.datatype,
            language: wire.language,
        })
    }
}

#[derive(Debug, Deserialize)]
struct WireHead {
    #[serde(default)]
    vars: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WireResults {
    bindings: Vec<BTreeMap<String, WireBinding>>,
}

#[derive(Debug, Deserialize)]
struct WireResultSet {
    head: WireHead,
    results: WireResults,
}

/// Sparse row: a variable missing from the map is unbound in that row
pub type Row = BTreeMap<String, Binding>;

/// Ordered variables plus ordered sparse rows.
///
/// Every key of every row appears in `variables`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultSet {
    variables: Vec<String>,
    rows: Vec<Row>,
}

impl ResultSet {
    /// Build a result set, rejecting rows that use undeclared variables
    pub fn new(variables: Vec<String>, rows: Vec<Row>) -> Result<Self> {
        let declared: HashSet<&str> = variables.iter().map(String::as_str).collect();
        for (idx, row) in rows.iter().enumerate() {
            if let Some(var) = row.keys().find(|k| !declared.contains(k.as_str())) {
                return Err(SparqlError::parse(format!(
                    "row {} binds undeclared variable '{}'",
                    idx, var
                )));
            }
        }
        Ok(Self { variables, rows })
    }

    pub fn empty(variables: Vec<String>) -> Self {
        Self {
            variables,
            rows: Vec::new(),
        }
    }

    /// Parse a SPARQL 1.1 Query Results JSON document.
    ///
    /// Variables that rows bind but `head.vars` omits are appended to the
    /// declared order as they are first seen.
    pub fn from_sparql_json(value: JsonValue) -> Result<Self> {
        let wire: WireResultSet = serde_json::from_value(value)
            .map_err(|e| SparqlError::parse(format!("unexpected result shape: {}", e)))?;

        let mut variables = wire.head.vars;
        let mut declared: HashSet<String> = variables.iter().cloned().collect();
        let mut rows = Vec::with_capacity(wire.results.bindings.len());

        for wire_row in wire.results.bindings {
            let mut row = Row::new();
            for (var, wire_binding) in wire_row {
                if declared.insert(var.clone()) {
                    variables.push(var.clone());
                }
                row.insert(var, Binding::try_from(wire_binding)?);
            }
            rows.push(row);
        }

        Ok(Self { variables, rows })
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Plain string value of `var` in row `idx`, if bound
    pub fn value(&self, idx: usize, var: &str) -> Option<&str> {
        self.rows
            .get(idx)
            .and_then(|row| row.get(var))
            .map(Binding::as_str)
    }
}

/// Sparse record of bound variables only, keys kept in declared order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record(pub Vec<(String, String)>);

impl Record {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Column-aligned form used for larger result sets
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabularResult {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

/// Token-efficient rendering of a [`ResultSet`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompressedResult {
    /// Zero rows, serialized as `[]`
    Empty,
    RecordList(Vec<Record>),
    Tabular(TabularResult),
}

impl CompressedResult {
    pub fn row_count(&self) -> usize {
        match self {
            CompressedResult::Empty => 0,
            CompressedResult::RecordList(records) => records.len(),
            CompressedResult::Tabular(table) => table.rows.len(),
        }
    }
}

impl Serialize for CompressedResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            CompressedResult::Empty => serializer.serialize_seq(Some(0))?.end(),
            CompressedResult::RecordList(records) => records.serialize(serializer),
            CompressedResult::Tabular(table) => table.serialize(serializer),
        }
    }
}

/// Page metadata attached to listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationInfo {
    pub total: u64,
    pub count: u64,
    pub offset: u64,
    pub has_more: bool,
    pub next_offset: Option<u64>,
}

impl PaginationInfo {
    /// `total` is raised to `count` when the count query under-reports.
    pub fn new(total: u64, count: u64, offset: u64) -> Self {
        let total = total.max(count);
        let end = offset.saturating_add(count);
        let has_more = end < total;
        Self {
            total,
            count,
            offset,
            has_more,
            next_offset: has_more.then_some(end),
        }
    }
}

/// Record joined across several lookup sources by a shared natural key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciledRecord {
    pub key: String,
    pub value: String,
    #[serde(flatten)]
    pub auxiliary: BTreeMap<String, String>,
}
