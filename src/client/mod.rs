//! Search service client
//!
//! The retriever talks to the search service only through the [`SearchClient`]
//! trait: one call per result page and one per on-demand content fetch.
//! [`search`] and [`search_phrases`] wrap a client into a lazy [`ResultStream`]
//! that pulls pages only as results are consumed.

mod http;
mod model;
mod stream;

pub use http::{ChatNoirClient, DEFAULT_BASE_URL};
pub use model::{strip_markup, Highlight, SearchMeta, SearchPage, SearchResult};
pub use stream::ResultStream;

use crate::error::{Result, RetrieveError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Default number of retries per request
pub const DEFAULT_RETRIES: u32 = 5;

/// Default delay between retries
pub const DEFAULT_BACKOFF_SECONDS: f64 = 1.0;

/// Searchable web crawl indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Index {
    #[serde(rename = "cw09")]
    ClueWeb09,
    #[serde(rename = "cw12")]
    ClueWeb12,
    #[serde(rename = "cw22")]
    ClueWeb22,
    #[serde(rename = "cc1511")]
    CommonCrawl1511,
    #[serde(rename = "cc1704")]
    CommonCrawl1704,
}

impl Index {
    pub const ALL: [Index; 5] = [
        Index::ClueWeb09,
        Index::ClueWeb12,
        Index::ClueWeb22,
        Index::CommonCrawl1511,
        Index::CommonCrawl1704,
    ];

    /// Name used by the API
    pub fn as_str(&self) -> &'static str {
        match self {
            Index::ClueWeb09 => "cw09",
            Index::ClueWeb12 => "cw12",
            Index::ClueWeb22 => "cw22",
            Index::CommonCrawl1511 => "cc1511",
            Index::CommonCrawl1704 => "cc1704",
        }
    }

    /// Index set searched when none is configured
    pub fn default_set() -> BTreeSet<Index> {
        BTreeSet::from([Index::ClueWeb12])
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Index {
    type Err = RetrieveError;

    fn from_str(s: &str) -> Result<Self> {
        Index::ALL
            .into_iter()
            .find(|index| index.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                RetrieveError::Config(format!(
                    "Unknown index '{}', expected one of cw09, cw12, cw22, cc1511, cc1704",
                    s
                ))
            })
    }
}

/// Phrase search proximity tolerance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Slop {
    #[default]
    Zero,
    One,
    Two,
}

impl TryFrom<u8> for Slop {
    type Error = RetrieveError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Slop::Zero),
            1 => Ok(Slop::One),
            2 => Ok(Slop::Two),
            other => Err(RetrieveError::InvalidConfigValue {
                path: "slop".to_string(),
                message: format!("Slop must be 0, 1 or 2, got {}", other),
            }),
        }
    }
}

impl From<Slop> for u8 {
    fn from(slop: Slop) -> Self {
        match slop {
            Slop::Zero => 0,
            Slop::One => 1,
            Slop::Two => 2,
        }
    }
}

impl fmt::Display for Slop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// Which endpoint a request goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Plain,
    Phrases { slop: Slop },
}

/// Everything needed to fetch any page of one query's results
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub api_key: String,
    pub query: String,
    pub index: BTreeSet<Index>,
    pub mode: SearchMode,
    pub explain: bool,
    pub page_size: usize,
    pub retries: u32,
    pub backoff: Duration,
}

impl SearchRequest {
    /// Plain search request with default retry settings
    pub fn new(
        api_key: impl Into<String>,
        query: impl Into<String>,
        index: BTreeSet<Index>,
        page_size: usize,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            query: query.into(),
            index,
            mode: SearchMode::Plain,
            explain: false,
            page_size,
            retries: DEFAULT_RETRIES,
            backoff: Duration::from_secs_f64(DEFAULT_BACKOFF_SECONDS),
        }
    }

    pub fn with_phrases(mut self, slop: Slop) -> Self {
        self.mode = SearchMode::Phrases { slop };
        self
    }

    pub fn with_explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }

    pub fn with_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.retries = retries;
        self.backoff = backoff;
        self
    }
}

/// Access to a remote search service
pub trait SearchClient: Send + Sync {
    /// Fetch the page of results starting at offset `from`
    fn fetch_page(&self, request: &SearchRequest, from: usize) -> Result<SearchPage>;

    /// Fetch the cached page contents of a document, as markup or plain text
    ///
    /// `request` is the search that found the document; its retry settings
    /// apply to the fetch.
    fn fetch_contents(
        &self,
        request: &SearchRequest,
        uuid: &Uuid,
        index: Index,
        plain: bool,
    ) -> Result<String>;
}

/// Lazily search the service for `query`
pub fn search<'a>(
    client: &'a dyn SearchClient,
    api_key: &str,
    query: &str,
    index: &BTreeSet<Index>,
    explain: bool,
    page_size: usize,
) -> ResultStream<'a> {
    let request =
        SearchRequest::new(api_key, query, index.clone(), page_size).with_explain(explain);
    ResultStream::new(client, request)
}

/// Lazily search the service for documents containing `query` as a phrase
pub fn search_phrases<'a>(
    client: &'a dyn SearchClient,
    api_key: &str,
    query: &str,
    index: &BTreeSet<Index>,
    slop: Slop,
    explain: bool,
    page_size: usize,
) -> ResultStream<'a> {
    let request = SearchRequest::new(api_key, query, index.clone(), page_size)
        .with_phrases(slop)
        .with_explain(explain);
    ResultStream::new(client, request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_names_round_trip() {
        for index in Index::ALL {
            assert_eq!(index.as_str().parse::<Index>().unwrap(), index);
        }
        assert!("cw99".parse::<Index>().is_err());
    }

    #[test]
    fn test_slop_bounds() {
        assert_eq!(Slop::try_from(2).unwrap(), Slop::Two);
        assert!(Slop::try_from(3).is_err());
        let slop: Slop = serde_json::from_str("1").unwrap();
        assert_eq!(slop, Slop::One);
        assert!(serde_json::from_str::<Slop>("7").is_err());
    }
}
