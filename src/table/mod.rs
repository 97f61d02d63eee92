//! Tabular query batches and result tables
//!
//! A [`Table`] is an ordered list of rows, each a JSON object keyed by column
//! name, together with the ordered set of column names. Keeping the column
//! list separately lets an empty table still describe its shape.

mod io;

pub use io::{read_topics, write_jsonl, write_trec_run, TopicsFormat};

use crate::error::{Result, RetrieveError};
use serde_json::{Map, Value};

/// One table row
pub type Row = Map<String, Value>;

/// Query id column
pub const QID: &str = "qid";
/// Query text column
pub const QUERY: &str = "query";
/// Document id column
pub const DOCNO: &str = "docno";
/// Relevance score column
pub const SCORE: &str = "score";
/// Rank column
pub const RANK: &str = "rank";

/// Ordered rows with named columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Create an empty table with the given columns
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::default();
        for column in columns {
            table.add_column(column);
        }
        table
    }

    /// Build a table from rows; columns appear in first-seen order
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut table = Self::default();
        for row in rows {
            table.push(row);
        }
        table
    }

    /// Build a table from a JSON array of objects
    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Array(items) = value else {
            return Err(RetrieveError::InvalidInput(
                "Can only transform tables (a JSON array of objects)".to_string(),
            ));
        };

        let rows = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(row) => Ok(row),
                other => Err(RetrieveError::InvalidInput(format!(
                    "Row {} is not an object: {}",
                    i, other
                ))),
            })
            .collect::<Result<Vec<Row>>>()?;

        Ok(Self::from_rows(rows))
    }

    pub fn to_json(&self) -> Value {
        Value::Array(self.rows.iter().cloned().map(Value::Object).collect())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut Vec<Row> {
        &mut self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Add a column if not yet present
    pub fn add_column(&mut self, column: impl Into<String>) {
        let column = column.into();
        if !self.has_column(&column) {
            self.columns.push(column);
        }
    }

    /// Append a row, registering any new columns it brings
    pub fn push(&mut self, row: Row) {
        for key in row.keys() {
            if !self.has_column(key) {
                self.columns.push(key.clone());
            }
        }
        self.rows.push(row);
    }

    /// Fail with the list of missing columns unless all are present
    pub fn require_columns(&self, required: &[&str]) -> Result<()> {
        let missing: Vec<String> = required
            .iter()
            .filter(|column| !self.has_column(column))
            .map(|column| column.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(RetrieveError::MissingColumns { missing })
        }
    }

    /// Concatenate tables, keeping row order and the union of columns
    pub fn concat(tables: impl IntoIterator<Item = Table>) -> Self {
        let mut combined = Self::default();
        for table in tables {
            for column in table.columns {
                combined.add_column(column);
            }
            combined.rows.extend(table.rows);
        }
        combined
    }
}

/// Grouping key of a row's query id
///
/// Keys are the JSON text of the cell, so the number `7` and the string
/// `"7"` are different queries. A missing qid groups with `null`.
pub fn qid_key(row: &Row) -> String {
    row.get(QID).unwrap_or(&Value::Null).to_string()
}

/// Textual form of a cell, used in logs and run files
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_from_json_rejects_non_tables() {
        let err = Table::from_json(json!({"qid": "1"})).unwrap_err();
        assert!(err.is_input_shape());

        let err = Table::from_json(json!([{"qid": "1"}, 3])).unwrap_err();
        assert!(err.is_input_shape());
    }

    #[test]
    fn test_columns_in_first_seen_order() {
        let table = Table::from_rows(vec![
            row(json!({"qid": "1", "query": "a"})),
            row(json!({"qid": "2", "extra": true, "query": "b"})),
        ]);
        assert_eq!(table.columns(), &["qid", "query", "extra"]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_require_columns() {
        let table = Table::new([QID]);
        let err = table.require_columns(&[QID, QUERY]).unwrap_err();
        match err {
            RetrieveError::MissingColumns { missing } => assert_eq!(missing, vec!["query"]),
            other => panic!("unexpected error: {other}"),
        }
        assert!(Table::new([QID, QUERY]).require_columns(&[QID, QUERY]).is_ok());
    }

    #[test]
    fn test_concat_keeps_empty_table_columns() {
        let a = Table::new([QID, DOCNO]);
        let b = Table::from_rows(vec![row(json!({"qid": "2", "score": 1.0}))]);
        let combined = Table::concat([a, b]);
        assert_eq!(combined.columns(), &["qid", "docno", "score"]);
        assert_eq!(combined.len(), 1);
    }

    #[test]
    fn test_qid_key_keeps_value_type() {
        let number = row(json!({"qid": 7}));
        let text = row(json!({"qid": "7"}));
        assert_ne!(qid_key(&number), qid_key(&text));
        assert_eq!(qid_key(&text), qid_key(&row(json!({"qid": "7", "query": "x"}))));
        assert_eq!(qid_key(&Row::new()), "null");
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&json!("q1")), "q1");
        assert_eq!(cell_text(&json!(42)), "42");
        assert_eq!(cell_text(&Value::Null), "");
    }
}
