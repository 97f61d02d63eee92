//! Records returned by the search service

use crate::client::Index;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use uuid::Uuid;

/// Highlighted text as returned by the service, with `<em>` markup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Highlight {
    /// Markup with highlight tags
    pub html: String,
    /// Same text with tags stripped and entities decoded
    pub text: String,
}

impl From<String> for Highlight {
    fn from(html: String) -> Self {
        let text = strip_markup(&html);
        Self { html, text }
    }
}

impl From<Highlight> for String {
    fn from(highlight: Highlight) -> Self {
        highlight.html
    }
}

fn markup_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]*>").expect("markup pattern is valid"))
}

/// Remove tags and decode the handful of entities the service emits
pub fn strip_markup(html: &str) -> String {
    markup_pattern()
        .replace_all(html, "")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// One result of a plain or phrase search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Relevance score assigned by the service
    pub score: f64,

    /// Unique document id within the service
    pub uuid: Uuid,

    /// Index the document was found in
    pub index: Index,

    /// Normalized TREC document id, absent for unknown documents
    #[serde(default)]
    pub trec_id: Option<String>,

    #[serde(default)]
    pub target_hostname: Option<String>,

    #[serde(default)]
    pub target_uri: Option<String>,

    /// Not reported by the phrase endpoint
    #[serde(default)]
    pub page_rank: Option<f64>,

    /// Not reported by the phrase endpoint
    #[serde(default)]
    pub spam_rank: Option<i64>,

    #[serde(default)]
    pub title: Option<Highlight>,

    #[serde(default)]
    pub snippet: Option<Highlight>,

    /// Scoring explanation, only present when requested
    #[serde(default)]
    pub explanation: Option<Value>,
}

/// Response metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchMeta {
    /// Query time in milliseconds
    #[serde(default)]
    pub query_time: u64,

    /// Total hits across all pages
    #[serde(default)]
    pub total_results: u64,

    #[serde(default)]
    pub indices: Vec<Index>,
}

/// One page of search results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub meta: SearchMeta,

    #[serde(default)]
    pub results: Vec<SearchResult>,
}
