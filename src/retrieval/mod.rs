//! Batch retrieval over the search service
//!
//! Query tables are split per query id, each query is searched lazily, every
//! result is flattened into a row with the selected [`Feature`]s, and the
//! combined table is sorted by score and ranked per query.

mod feature;
mod flatten;
mod ranking;
mod retriever;

pub use feature::{Feature, FeatureSet};
pub use flatten::{merge_result, result_columns};
pub use ranking::{add_ranks, sort_by_score, FIRST_RANK};
pub use retriever::{Retriever, RetrieverConfig};
