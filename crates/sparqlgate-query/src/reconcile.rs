// ABOUTME: Multi-source reconciliation of keyed SPARQL lookups into one record set
// ABOUTME: Concurrent all-or-nothing fan-out, deterministic duplicate resolution, pagination

use crate::executor::{QueryExecutor, QueryTarget};
use crate::fanout::fan_out;
use serde::Serialize;
use sparqlgate_core::{
    DuplicateKeyPolicy, PaginationInfo, ReconciledRecord, Result, ResultSet, SparqlError,
    SparqlQuery,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// A query whose rows map a natural key to one value
#[derive(Debug, Clone)]
pub struct KeyedSource {
    pub query: SparqlQuery,
    pub key_var: String,
    pub value_var: String,
}

impl KeyedSource {
    pub fn new(query: SparqlQuery, key_var: impl Into<String>, value_var: impl Into<String>) -> Self {
        Self {
            query,
            key_var: key_var.into(),
            value_var: value_var.into(),
        }
    }
}

/// Keyed lookup whose value lands under `field` on each record
#[derive(Debug, Clone)]
pub struct AuxiliarySource {
    pub field: String,
    pub source: KeyedSource,
}

/// Query returning the total size of the listing
#[derive(Debug, Clone)]
pub struct CountSource {
    pub query: SparqlQuery,
    pub count_var: String,
}

#[derive(Debug, Clone)]
pub struct ReconcileRequest {
    pub primary: KeyedSource,
    pub auxiliaries: Vec<AuxiliarySource>,
    pub count: CountSource,
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciledPage {
    pub records: Vec<ReconciledRecord>,
    pub pagination: PaginationInfo,
}

pub struct Reconciler {
    executor: Arc<dyn QueryExecutor>,
    target: QueryTarget,
    policy: DuplicateKeyPolicy,
}

impl Reconciler {
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        target: QueryTarget,
        policy: DuplicateKeyPolicy,
    ) -> Self {
        Self {
            executor,
            target,
            policy,
        }
    }

    pub async fn reconcile(&self, request: ReconcileRequest) -> Result<ReconciledPage> {
        let ReconcileRequest {
            primary,
            auxiliaries,
            count,
            offset,
        } = request;

        // Job order: primary, count, then auxiliaries
        let mut jobs = Vec::with_capacity(auxiliaries.len() + 2);
        jobs.push((primary.query.clone(), self.target.clone()));
        jobs.push((count.query.clone(), self.target.clone()));
        jobs.extend(
            auxiliaries
                .iter()
                .map(|aux| (aux.source.query.clone(), self.target.clone())),
        );

        let mut results = fan_out(Arc::clone(&self.executor), jobs).await?.into_iter();
        let (Some(primary_rows), Some(count_rows)) = (results.next(), results.next()) else {
            return Err(SparqlError::Internal(
                "fan-out returned fewer result sets than queries".to_string(),
            ));
        };

        let total = read_count(&count_rows, &count.count_var)?;

        let lookups: Vec<(&str, HashMap<String, String>)> = auxiliaries
            .iter()
            .zip(results)
            .map(|(aux, rows)| (aux.field.as_str(), keyed_lookup(&rows, &aux.source)))
            .collect();

        let merged = merge_keyed(&primary_rows, &primary, self.policy);
        let records: Vec<ReconciledRecord> = merged
            .into_iter()
            .map(|(key, value)| {
                let auxiliary = lookups
                    .iter()
                    .filter_map(|(field, lookup)| {
                        lookup.get(&key).map(|v| (field.to_string(), v.clone()))
                    })
                    .collect();
                ReconciledRecord {
                    key,
                    value,
                    auxiliary,
                }
            })
            .collect();

        let pagination = PaginationInfo::new(total, primary_rows.len() as u64, offset);
        info!(
            primary_rows = primary_rows.len(),
            records = records.len(),
            total = pagination.total,
            "Reconciled keyed sources"
        );

        Ok(ReconciledPage {
            records,
            pagination,
        })
    }
}

/// Collapse primary rows to one value per key, ordered by key.
///
/// Rows with the key or value unbound are skipped.
pub fn merge_keyed(
    rows: &ResultSet,
    source: &KeyedSource,
    policy: DuplicateKeyPolicy,
) -> BTreeMap<String, String> {
    let mut merged: BTreeMap<String, String> = BTreeMap::new();

    for idx in 0..rows.len() {
        let (Some(key), Some(value)) = (
            rows.value(idx, &source.key_var),
            rows.value(idx, &source.value_var),
        ) else {
            continue;
        };

        match merged.get_mut(key) {
            None => {
                merged.insert(key.to_string(), value.to_string());
            }
            Some(existing) => {
                let replace = match policy {
                    DuplicateKeyPolicy::PreferLongest => {
                        value.chars().count() > existing.chars().count()
                    }
                    DuplicateKeyPolicy::KeepFirst => false,
                };
                debug!(
                    key,
                    kept = if replace { value } else { existing.as_str() },
                    "Resolved duplicate key"
                );
                if replace {
                    *existing = value.to_string();
                }
            }
        }
    }

    merged
}

/// Key to value map of an auxiliary source; first occurrence wins
fn keyed_lookup(rows: &ResultSet, source: &KeyedSource) -> HashMap<String, String> {
    let mut lookup = HashMap::new();
    for idx in 0..rows.len() {
        if let (Some(key), Some(value)) = (
            rows.value(idx, &source.key_var),
            rows.value(idx, &source.value_var),
        ) {
            lookup
                .entry(key.to_string())
                .or_insert_with(|| value.to_string());
        }
    }
    lookup
}

/// Read the integer total from the first row of a count query
pub fn read_count(rows: &ResultSet, count_var: &str) -> Result<u64> {
    let raw = rows.value(0, count_var).ok_or_else(|| {
        SparqlError::parse(format!("count query returned no value for ?{}", count_var))
    })?;
    raw.trim()
        .parse::<u64>()
        .map_err(|_| SparqlError::parse(format!("count ?{} is not an integer: {}", count_var, raw)))
}
