//! Flattening search results into table rows

use crate::client::{SearchClient, SearchRequest, SearchResult};
use crate::error::Result;
use crate::retrieval::{Feature, FeatureSet};
use crate::table::{Row, DOCNO, SCORE};
use serde_json::{json, Value};

/// Extend `row` with the columns of `result` selected by `features`
///
/// `docno` and `score` are always set. Page contents for `html` and
/// `html_plain` are fetched through `client` only when selected, with the
/// retry settings of `request`.
pub fn merge_result(
    row: &Row,
    result: &SearchResult,
    features: &FeatureSet,
    client: &dyn SearchClient,
    request: &SearchRequest,
) -> Result<Row> {
    let mut row = row.clone();
    row.insert(DOCNO.to_string(), json!(result.trec_id));
    row.insert(SCORE.to_string(), json!(result.score));

    for feature in features.iter() {
        let value = match feature {
            Feature::Uuid => json!(result.uuid.to_string()),
            Feature::Index => json!(result.index.as_str()),
            Feature::TargetHostname => json!(result.target_hostname),
            Feature::TargetUri => json!(result.target_uri),
            Feature::PageRank => json!(result.page_rank),
            Feature::SpamRank => json!(result.spam_rank),
            Feature::TitleHighlighted => json!(result.title.as_ref().map(|t| &t.html)),
            Feature::TitleText => json!(result.title.as_ref().map(|t| &t.text)),
            Feature::SnippetHighlighted => json!(result.snippet.as_ref().map(|s| &s.html)),
            Feature::SnippetText => json!(result.snippet.as_ref().map(|s| &s.text)),
            Feature::Explanation => result.explanation.clone().unwrap_or(Value::Null),
            Feature::Html => {
                json!(client.fetch_contents(request, &result.uuid, result.index, false)?)
            }
            Feature::HtmlPlain => {
                json!(client.fetch_contents(request, &result.uuid, result.index, true)?)
            }
            // Sets only ever hold concrete features
            Feature::None
            | Feature::Target
            | Feature::Ranks
            | Feature::Title
            | Feature::Snippet
            | Feature::All => continue,
        };
        if let Some(column) = feature.column() {
            row.insert(column.to_string(), value);
        }
    }

    Ok(row)
}

/// Columns a flattened row adds for the given features
pub fn result_columns(features: &FeatureSet) -> Vec<&'static str> {
    let mut columns = vec![DOCNO, SCORE];
    columns.extend(features.columns());
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Highlight, Index, SearchPage};
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    #[derive(Default)]
    struct ContentsClient {
        fetches: AtomicUsize,
    }

    impl SearchClient for ContentsClient {
        fn fetch_page(&self, _request: &SearchRequest, _from: usize) -> Result<SearchPage> {
            Ok(SearchPage::default())
        }

        fn fetch_contents(
            &self,
            _request: &SearchRequest,
            _uuid: &Uuid,
            _index: Index,
            plain: bool,
        ) -> Result<String> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(if plain { "page" } else { "<p>page</p>" }.to_string())
        }
    }

    fn result() -> SearchResult {
        SearchResult {
            score: 3.5,
            uuid: Uuid::nil(),
            index: Index::ClueWeb12,
            trec_id: Some("clueweb12-0000tw-00-00001".to_string()),
            target_hostname: Some("example.org".to_string()),
            target_uri: Some("https://example.org/".to_string()),
            page_rank: Some(0.5),
            spam_rank: Some(90),
            title: Some(Highlight::from("An <em>example</em>".to_string())),
            snippet: None,
            explanation: None,
        }
    }

    fn request() -> SearchRequest {
        SearchRequest::new("key", "q", Index::default_set(), 10)
    }

    fn keys(row: &Row) -> BTreeSet<String> {
        row.keys().cloned().collect()
    }

    #[test]
    fn test_always_sets_docno_and_score() {
        let client = ContentsClient::default();
        let row =
            merge_result(&Row::new(), &result(), &FeatureSet::new(), &client, &request()).unwrap();
        assert_eq!(keys(&row), BTreeSet::from(["docno".to_string(), "score".to_string()]));
        assert_eq!(row["score"], json!(3.5));
    }

    #[test]
    fn test_union_of_features_gives_union_of_columns() {
        let client = ContentsClient::default();
        let f1 = FeatureSet::from(Feature::Title);
        let f2: FeatureSet = [Feature::Uuid, Feature::Ranks].into_iter().collect();

        let a = keys(&merge_result(&Row::new(), &result(), &f1, &client, &request()).unwrap());
        let b = keys(&merge_result(&Row::new(), &result(), &f2, &client, &request()).unwrap());
        let union = f1.union(&f2);
        let both = keys(&merge_result(&Row::new(), &result(), &union, &client, &request()).unwrap());

        let expected: BTreeSet<String> = a.union(&b).cloned().collect();
        assert_eq!(both, expected);
    }

    #[test]
    fn test_keeps_existing_columns_and_absent_values_are_null() {
        let client = ContentsClient::default();
        let mut base = Row::new();
        base.insert("qid".to_string(), json!("1"));

        let features: FeatureSet = [Feature::TitleText, Feature::SnippetText].into_iter().collect();
        let row = merge_result(&base, &result(), &features, &client, &request()).unwrap();
        assert_eq!(row["qid"], json!("1"));
        assert_eq!(row["title_text"], json!("An example"));
        assert_eq!(row["snippet_text"], Value::Null);
    }

    #[test]
    fn test_contents_fetched_only_when_selected() {
        let client = ContentsClient::default();
        let target = FeatureSet::from(Feature::Target);
        merge_result(&Row::new(), &result(), &target, &client, &request()).unwrap();
        assert_eq!(client.fetches.load(Ordering::SeqCst), 0);

        let features: FeatureSet = [Feature::Html, Feature::HtmlPlain].into_iter().collect();
        let row = merge_result(&Row::new(), &result(), &features, &client, &request()).unwrap();
        assert_eq!(client.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(row["html"], json!("<p>page</p>"));
        assert_eq!(row["html_plain"], json!("page"));
    }

    #[test]
    fn test_result_columns() {
        let columns = result_columns(&FeatureSet::from(Feature::TitleText));
        assert_eq!(columns, vec!["docno", "score", "title_text"]);
    }
}
