//! Score ordering and per-query rank assignment

use crate::table::{qid_key, Row, Table, RANK, SCORE};
use ahash::{HashMap, HashMapExt};
use serde_json::Value;
use std::cmp::Ordering;

/// Rank given to the best document of each query
pub const FIRST_RANK: u64 = 0;

fn score_of(row: &Row) -> f64 {
    row.get(SCORE).and_then(Value::as_f64).unwrap_or(f64::NEG_INFINITY)
}

/// Stable sort of all rows by descending score
pub fn sort_by_score(table: &mut Table) {
    table
        .rows_mut()
        .sort_by(|a, b| score_of(b).partial_cmp(&score_of(a)).unwrap_or(Ordering::Equal));
}

/// Assign a `rank` column per query by descending score
///
/// Ranks start at [`FIRST_RANK`] within each query id; ties keep their
/// current row order. Row order and all other columns are left untouched.
pub fn add_ranks(mut table: Table) -> Table {
    table.add_column(RANK);

    // Row positions per query, in current order
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (position, row) in table.rows().iter().enumerate() {
        groups.entry(qid_key(row)).or_default().push(position);
    }

    let rows = table.rows_mut();
    for positions in groups.values_mut() {
        positions.sort_by(|&a, &b| {
            score_of(&rows[b])
                .partial_cmp(&score_of(&rows[a]))
                .unwrap_or(Ordering::Equal)
        });
        for (rank, &position) in positions.iter().enumerate() {
            rows[position].insert(RANK.to_string(), Value::from(FIRST_RANK + rank as u64));
        }
    }

    table
}
