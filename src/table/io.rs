//! Topics input and run output

use crate::error::{Result, RetrieveError};
use crate::table::{cell_text, Row, Table, DOCNO, QID, QUERY, RANK, SCORE};
use serde_json::Value;
use std::io::Write;
use std::path::Path;

/// Layout of a topics file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicsFormat {
    /// `qid<TAB>query` per line
    Tsv,
    /// One JSON object per line
    Jsonl,
}

impl TopicsFormat {
    /// Guess from the file extension, defaulting to TSV
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("jsonl") | Some("json") | Some("ndjson") => TopicsFormat::Jsonl,
            _ => TopicsFormat::Tsv,
        }
    }
}

/// Read a topics file into a query table
pub fn read_topics(path: &Path, format: TopicsFormat) -> Result<Table> {
    let content = std::fs::read_to_string(path).map_err(|e| RetrieveError::Io {
        source: e,
        context: format!("Failed to read topics file: {}", path.display()),
    })?;

    let mut table = Table::new([QID, QUERY]);
    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let row = match format {
            TopicsFormat::Tsv => {
                let Some((qid, query)) = line.split_once('\t') else {
                    return Err(RetrieveError::InvalidInput(format!(
                        "{}:{}: expected 'qid<TAB>query'",
                        path.display(),
                        line_no + 1
                    )));
                };
                if line_no == 0 && qid == QID && query == QUERY {
                    continue;
                }
                let mut row = Row::new();
                row.insert(QID.to_string(), Value::String(qid.trim().to_string()));
                row.insert(QUERY.to_string(), Value::String(query.trim().to_string()));
                row
            }
            TopicsFormat::Jsonl => {
                match serde_json::from_str::<Value>(line).map_err(|e| RetrieveError::Json {
                    source: e,
                    context: format!("{}:{}", path.display(), line_no + 1),
                })? {
                    Value::Object(row) => row,
                    other => {
                        return Err(RetrieveError::InvalidInput(format!(
                            "{}:{}: expected an object, got {}",
                            path.display(),
                            line_no + 1,
                            other
                        )))
                    }
                }
            }
        };
        table.push(row);
    }

    Ok(table)
}

/// Write rows in TREC run format, returning the number of lines written
///
/// Rows without a document id cannot be judged and are skipped.
pub fn write_trec_run<W: Write>(table: &Table, writer: &mut W, tag: &str) -> Result<usize> {
    table.require_columns(&[QID, DOCNO, SCORE, RANK])?;

    let mut written = 0;
    for row in table.rows() {
        let docno = row.get(DOCNO).map(cell_text).unwrap_or_default();
        let qid = row.get(QID).map(cell_text).unwrap_or_default();
        if docno.is_empty() {
            tracing::warn!("Skipping result without document id for query {}", qid);
            continue;
        }
        let rank = row.get(RANK).and_then(Value::as_u64).unwrap_or_default();
        let score = row.get(SCORE).and_then(Value::as_f64).unwrap_or_default();

        writeln!(writer, "{} Q0 {} {} {} {}", qid, docno, rank, score, tag).map_err(|e| {
            RetrieveError::Io {
                source: e,
                context: "Failed to write run line".to_string(),
            }
        })?;
        written += 1;
    }
    Ok(written)
}

/// Write one JSON object per row
pub fn write_jsonl<W: Write>(table: &Table, writer: &mut W) -> Result<usize> {
    for row in table.rows() {
        let line = serde_json::to_string(row).map_err(|e| RetrieveError::Json {
            source: e,
            context: "Failed to serialize row".to_string(),
        })?;
        writeln!(writer, "{}", line).map_err(|e| RetrieveError::Io {
            source: e,
            context: "Failed to write row".to_string(),
        })?;
    }
    Ok(table.len())
}
