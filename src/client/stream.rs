//! Lazy, single-pass pagination over search results

use crate::client::{SearchClient, SearchRequest, SearchResult};
use crate::error::Result;
use std::collections::VecDeque;
use std::time::Duration;

/// Results of one query, fetched page by page as they are pulled
///
/// No request is made until the first call to `next`, and a new page is only
/// requested once the previous one has been fully consumed. After an error or
/// the last page the stream stays exhausted.
pub struct ResultStream<'a> {
    client: &'a dyn SearchClient,
    request: SearchRequest,
    buffer: VecDeque<SearchResult>,
    offset: usize,
    total: Option<u64>,
    exhausted: bool,
}

impl<'a> ResultStream<'a> {
    pub fn new(client: &'a dyn SearchClient, request: SearchRequest) -> Self {
        Self {
            client,
            request,
            buffer: VecDeque::new(),
            offset: 0,
            total: None,
            exhausted: false,
        }
    }

    /// Override the retry policy passed to the client
    pub fn with_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.request.retries = retries;
        self.request.backoff = backoff;
        self
    }

    pub fn request(&self) -> &SearchRequest {
        &self.request
    }

    /// Total hits reported by the service, known after the first page
    pub fn total_results(&self) -> Option<u64> {
        self.total
    }

    fn fetch_next_page(&mut self) -> Result<()> {
        if self.request.page_size == 0 {
            self.exhausted = true;
            return Ok(());
        }

        let page = self.client.fetch_page(&self.request, self.offset)?;
        let fetched = page.results.len();
        tracing::debug!(
            query = %self.request.query,
            from = self.offset,
            fetched,
            total = page.meta.total_results,
            "Fetched result page"
        );

        self.offset += fetched;
        self.total = Some(page.meta.total_results);
        self.buffer.extend(page.results);

        if fetched < self.request.page_size || self.offset as u64 >= page.meta.total_results {
            self.exhausted = true;
        }
        Ok(())
    }
}

impl Iterator for ResultStream<'_> {
    type Item = Result<SearchResult>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(result) = self.buffer.pop_front() {
            return Some(Ok(result));
        }
        if self.exhausted {
            return None;
        }

        if let Err(e) = self.fetch_next_page() {
            self.exhausted = true;
            return Some(Err(e));
        }
        self.buffer.pop_front().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Index, SearchMeta, SearchPage};
    use crate::error::RetrieveError;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct PagedClient {
        total: usize,
        calls: Mutex<Vec<usize>>,
        fail: bool,
    }

    impl PagedClient {
        fn new(total: usize) -> Self {
            Self {
                total,
                calls: Mutex::new(Vec::new()),
                fail: false,
            }
        }
    }

    impl SearchClient for PagedClient {
        fn fetch_page(&self, request: &SearchRequest, from: usize) -> Result<SearchPage> {
            self.calls.lock().unwrap().push(from);
            if self.fail {
                return Err(RetrieveError::Api {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            let end = (from + request.page_size).min(self.total);
            let results = (from..end)
                .map(|i| SearchResult {
                    score: (self.total - i) as f64,
                    uuid: Uuid::nil(),
                    index: Index::ClueWeb12,
                    trec_id: Some(format!("doc-{}", i)),
                    target_hostname: None,
                    target_uri: None,
                    page_rank: None,
                    spam_rank: None,
                    title: None,
                    snippet: None,
                    explanation: None,
                })
                .collect();
            Ok(SearchPage {
                meta: SearchMeta {
                    query_time: 1,
                    total_results: self.total as u64,
                    indices: vec![Index::ClueWeb12],
                },
                results,
            })
        }

        fn fetch_contents(
            &self,
            _request: &SearchRequest,
            _uuid: &Uuid,
            _index: Index,
            _plain: bool,
        ) -> Result<String> {
            Ok(String::new())
        }
    }

    fn request(page_size: usize) -> SearchRequest {
        SearchRequest::new("key", "q", Index::default_set(), page_size)
    }

    #[test]
    fn test_no_fetch_before_pull() {
        let client = PagedClient::new(10);
        let stream = ResultStream::new(&client, request(3));
        drop(stream);
        assert!(client.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_fetches_pages_on_demand() {
        let client = PagedClient::new(10);
        let first: Vec<_> = ResultStream::new(&client, request(3)).take(4).collect();
        assert_eq!(first.len(), 4);
        assert_eq!(*client.calls.lock().unwrap(), vec![0, 3]);
    }

    #[test]
    fn test_drains_all_pages() {
        let client = PagedClient::new(7);
        let ids: Vec<String> = ResultStream::new(&client, request(3))
            .map(|r| r.unwrap().trec_id.unwrap())
            .collect();
        assert_eq!(ids.len(), 7);
        assert_eq!(ids[6], "doc-6");
        assert_eq!(*client.calls.lock().unwrap(), vec![0, 3, 6]);
    }

    #[test]
    fn test_error_ends_stream() {
        let mut client = PagedClient::new(7);
        client.fail = true;
        let items: Vec<_> = ResultStream::new(&client, request(3)).collect();
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }
}
