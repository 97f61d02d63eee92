//! Batch retrieval against the search service

use crate::client::{
    search, search_phrases, Index, ResultStream, SearchClient, Slop, DEFAULT_BACKOFF_SECONDS,
    DEFAULT_RETRIES,
};
use crate::error::{Result, RetrieveError};
use crate::retrieval::flatten::{merge_result, result_columns};
use crate::retrieval::ranking::{add_ranks, sort_by_score};
use crate::retrieval::{Feature, FeatureSet};
use crate::table::{cell_text, qid_key, Row, Table, QID, QUERY};
use ahash::{HashMap, HashMapExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

/// Retriever settings
///
/// Equality and hashing cover every field, with the index selector and
/// feature set compared as sets, so equal configurations can key a cache of
/// retrieval results.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// API key sent with every request
    #[serde(skip)]
    pub api_key: String,

    /// Indices to search
    pub index: BTreeSet<Index>,

    /// Use phrase search instead of plain search
    pub phrases: bool,

    /// Phrase search proximity tolerance
    pub slop: Slop,

    /// Optional result attributes to include
    pub features: FeatureSet,

    /// Drop results without a document id
    pub filter_unknown: bool,

    /// Maximum results per query, unlimited if absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_results: Option<usize>,

    /// Results per request
    pub page_size: usize,

    /// Retries per failed request
    pub retries: u32,

    /// Delay between retries
    pub backoff_seconds: f64,

    /// Log progress per query
    pub verbose: bool,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            index: Index::default_set(),
            phrases: false,
            slop: Slop::default(),
            features: FeatureSet::new(),
            filter_unknown: false,
            num_results: Some(10),
            page_size: 100,
            retries: DEFAULT_RETRIES,
            backoff_seconds: DEFAULT_BACKOFF_SECONDS,
            verbose: false,
        }
    }
}

impl RetrieverConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Results per request actually sent, never above the result cap
    pub fn effective_page_size(&self) -> usize {
        match self.num_results {
            Some(cap) => self.page_size.min(cap),
            None => self.page_size,
        }
    }

    /// Delay between retries as a duration
    ///
    /// Fails for negative, non-finite or unrepresentably large values.
    pub fn backoff(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.backoff_seconds).map_err(|e| {
            RetrieveError::InvalidConfigValue {
                path: "retrieval.backoff_seconds".to_string(),
                message: format!("Cannot use {} as backoff: {}", self.backoff_seconds, e),
            }
        })
    }

    /// Stable BLAKE3 digest of all identity fields
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        let mut field = |name: &str, value: String| {
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        };

        field("api_key", self.api_key.clone());
        field(
            "index",
            self.index.iter().map(Index::as_str).collect::<Vec<_>>().join(","),
        );
        field("phrases", self.phrases.to_string());
        field("slop", self.slop.to_string());
        field(
            "features",
            self.features.iter().map(Feature::name).collect::<Vec<_>>().join(","),
        );
        field("filter_unknown", self.filter_unknown.to_string());
        field("num_results", format!("{:?}", self.num_results));
        field("page_size", self.page_size.to_string());
        field("retries", self.retries.to_string());
        field("backoff_seconds", self.backoff_seconds.to_bits().to_string());
        field("verbose", self.verbose.to_string());

        hasher.finalize().to_hex().to_string()
    }
}

impl fmt::Debug for RetrieverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.api_key.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("RetrieverConfig")
            .field("api_key", &api_key)
            .field("index", &self.index)
            .field("phrases", &self.phrases)
            .field("slop", &self.slop)
            .field("features", &self.features)
            .field("filter_unknown", &self.filter_unknown)
            .field("num_results", &self.num_results)
            .field("page_size", &self.page_size)
            .field("retries", &self.retries)
            .field("backoff_seconds", &self.backoff_seconds)
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl PartialEq for RetrieverConfig {
    fn eq(&self, other: &Self) -> bool {
        self.api_key == other.api_key
            && self.index == other.index
            && self.phrases == other.phrases
            && self.slop == other.slop
            && self.features == other.features
            && self.filter_unknown == other.filter_unknown
            && self.num_results == other.num_results
            && self.page_size == other.page_size
            && self.retries == other.retries
            && self.backoff_seconds.to_bits() == other.backoff_seconds.to_bits()
            && self.verbose == other.verbose
    }
}

impl Eq for RetrieverConfig {}

impl Hash for RetrieverConfig {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.api_key.hash(state);
        self.index.hash(state);
        self.phrases.hash(state);
        self.slop.hash(state);
        self.features.hash(state);
        self.filter_unknown.hash(state);
        self.num_results.hash(state);
        self.page_size.hash(state);
        self.retries.hash(state);
        self.backoff_seconds.to_bits().hash(state);
        self.verbose.hash(state);
    }
}

/// Retrieves ranked documents for batches of queries
#[derive(Clone)]
pub struct Retriever {
    config: RetrieverConfig,
    client: Arc<dyn SearchClient>,
}

impl Retriever {
    pub fn new(config: RetrieverConfig, client: Arc<dyn SearchClient>) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Columns of a result table for the given input columns, before ranking
    fn output_columns(&self, input: &[String]) -> Vec<String> {
        let mut columns: Vec<String> = input.to_vec();
        for column in result_columns(&self.config.features) {
            if !columns.iter().any(|c| c == column) {
                columns.push(column.to_string());
            }
        }
        columns
    }

    /// Retrieve results for a single query
    ///
    /// `topic` holds the rows of one query id. An empty input yields an empty
    /// table with the output columns. When several rows share the query id,
    /// the first one supplies the query text.
    pub fn transform_query(&self, topic: &Table) -> Result<Table> {
        let Some(first) = topic.rows().first() else {
            return Ok(Table::new(self.output_columns(topic.columns())));
        };

        let qids: BTreeMap<String, String> = topic
            .rows()
            .iter()
            .map(|row| (qid_key(row), row.get(QID).map(cell_text).unwrap_or_default()))
            .collect();
        if qids.len() > 1 {
            return Err(RetrieveError::MultipleQueries {
                qids: qids.into_values().collect(),
            });
        }

        let query = first
            .get(QUERY)
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                RetrieveError::InvalidInput(format!(
                    "Query text for query id {} is missing or not a string",
                    first.get(QID).map(cell_text).unwrap_or_default()
                ))
            })?;

        let config = &self.config;
        let backoff = config.backoff()?;
        let explain = config.features.contains(Feature::Explanation);
        let page_size = config.effective_page_size();
        let client = self.client.as_ref();

        let stream: ResultStream<'_> = if config.phrases {
            search_phrases(
                client,
                &config.api_key,
                query,
                &config.index,
                config.slop,
                explain,
                page_size,
            )
        } else {
            search(client, &config.api_key, query, &config.index, explain, page_size)
        }
        .with_retries(config.retries, backoff);
        let request = stream.request().clone();

        let filter_unknown = config.filter_unknown;
        let results = stream
            .filter(|result| match result {
                Ok(result) => !filter_unknown || result.trec_id.is_some(),
                Err(_) => true,
            })
            .take(config.num_results.unwrap_or(usize::MAX));

        let mut table = Table::new(self.output_columns(topic.columns()));
        for result in results {
            let row = merge_result(first, &result?, &config.features, client, &request)?;
            table.push(row);
        }

        tracing::debug!("Retrieved {} results for query '{}'", table.len(), query);
        Ok(table)
    }

    /// Retrieve and rank results for a batch of queries
    ///
    /// Requires `qid` and `query` columns. Queries are searched one after
    /// another in first-seen order; the combined rows are sorted by
    /// descending score and ranked per query.
    pub fn transform(&self, topics: &Table) -> Result<Table> {
        topics.require_columns(&[QID, QUERY])?;

        let mut retrieved = if topics.is_empty() {
            self.transform_query(topics)?
        } else {
            let groups = group_by_qid(topics);
            let total = groups.len();
            let mut parts = Vec::with_capacity(total);
            for (i, group) in groups.into_iter().enumerate() {
                if self.config.verbose {
                    let qid = group.rows()[0].get(QID).map(cell_text).unwrap_or_default();
                    tracing::info!("Searching with ChatNoir: query {} ({}/{})", qid, i + 1, total);
                }
                parts.push(self.transform_query(&group)?);
            }
            Table::concat(parts)
        };

        sort_by_score(&mut retrieved);
        Ok(add_ranks(retrieved))
    }
}

impl PartialEq for Retriever {
    fn eq(&self, other: &Self) -> bool {
        self.config == other.config
    }
}

impl Eq for Retriever {}

impl Hash for Retriever {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.config.hash(state);
    }
}

impl fmt::Debug for Retriever {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retriever")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Split a table into one table per query id, in first-seen order
fn group_by_qid(topics: &Table) -> Vec<Table> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Table> = Vec::new();

    for row in topics.rows() {
        let position = *positions.entry(qid_key(row)).or_insert_with(|| {
            groups.push(Table::new(topics.columns().iter().cloned()));
            groups.len() - 1
        });
        groups[position].push(Row::clone(row));
    }

    groups
}
