use sparqlgate_core::{Binding, CompressedResult, Record, ResultSet, TabularResult};

/// Row counts up to this use self-describing records; above it, columns
pub const RECORD_LIST_MAX_ROWS: usize = 5;

/// Compress a result set into the smallest faithful shape for its size.
///
/// Binding metadata (kind, datatype, language) is dropped; only plain
/// string values survive.
pub fn compress(result_set: &ResultSet) -> CompressedResult {
    match result_set.len() {
        0 => CompressedResult::Empty,
        n if n <= RECORD_LIST_MAX_ROWS => CompressedResult::RecordList(to_records(result_set)),
        _ => CompressedResult::Tabular(to_table(result_set)),
    }
}

fn to_records(result_set: &ResultSet) -> Vec<Record> {
    result_set
        .rows()
        .iter()
        .map(|row| {
            Record(
                result_set
                    .variables()
                    .iter()
                    .filter_map(|var| row.get(var).map(|b| (var.clone(), b.as_str().to_string())))
                    .collect(),
            )
        })
        .collect()
}

fn to_table(result_set: &ResultSet) -> TabularResult {
    let headers = result_set.variables().to_vec();
    let rows = result_set
        .rows()
        .iter()
        .map(|row| {
            headers
                .iter()
                .map(|var| row.get(var).map(Binding::as_str).map(str::to_string))
                .collect()
        })
        .collect();

    TabularResult { headers, rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sparqlgate_core::Row;

    fn result_set(rows: usize) -> ResultSet {
        let variables = vec!["code".to_string(), "label".to_string(), "note".to_string()];
        let rows = (0..rows)
            .map(|i| {
                let mut row = Row::new();
                row.insert("code".to_string(), Binding::literal(format!("{:03}", i)));
                row.insert(
                    "label".to_string(),
                    Binding::lang_literal(format!("Label {}", i), "it"),
                );
                if i % 2 == 0 {
                    row.insert(
                        "note".to_string(),
                        Binding::uri(format!("http://example.org/n/{}", i)),
                    );
                }
                row
            })
            .collect();
        ResultSet::new(variables, rows).unwrap()
    }

    #[test]
    fn zero_rows_is_the_empty_sentinel() {
        let compressed = compress(&ResultSet::empty(vec!["x".to_string()]));
        assert_eq!(compressed, CompressedResult::Empty);
        assert_eq!(serde_json::to_value(&compressed).unwrap(), json!([]));
    }

    #[test]
    fn three_rows_become_sparse_records() {
        let compressed = compress(&result_set(3));
        let CompressedResult::RecordList(records) = &compressed else {
            panic!("expected record list, got {:?}", compressed);
        };
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].get("note"), Some("http://example.org/n/0"));
        assert_eq!(records[1].get("note"), None);
        assert_eq!(records[1].len(), 2);
        assert_eq!(
            serde_json::to_value(&compressed).unwrap()[1],
            json!({"code": "001", "label": "Label 1"})
        );
    }

    #[test]
    fn five_rows_is_still_a_record_list() {
        assert!(matches!(compress(&result_set(5)), CompressedResult::RecordList(r) if r.len() == 5));
    }

    #[test]
    fn six_rows_become_an_aligned_table() {
        let compressed = compress(&result_set(6));
        let CompressedResult::Tabular(table) = &compressed else {
            panic!("expected table, got {:?}", compressed);
        };
        assert_eq!(table.headers, ["code", "label", "note"]);
        assert_eq!(table.rows.len(), 6);
        assert!(table.rows.iter().all(|r| r.len() == table.headers.len()));
        assert_eq!(table.rows[1][2], None);

        let value = serde_json::to_value(&compressed).unwrap();
        assert_eq!(value["rows"][1], json!(["001", "Label 1", null]));
        assert_eq!(compressed.row_count(), 6);
    }
}
