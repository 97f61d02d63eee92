//! chatnoir-retrieve - batch retrieval over the ChatNoir web search API
//!
//! Query batches are mapped to paginated ChatNoir searches, selected result
//! attributes are flattened into table rows, and results are ranked per query,
//! ready to be written as TREC runs.

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod retrieval;
pub mod table;

pub use error::{Result, RetrieveError};
