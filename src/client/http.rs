//! Blocking HTTP client for the ChatNoir v1 API

use crate::client::{Index, SearchClient, SearchMode, SearchPage, SearchRequest};
use crate::error::{Result, RetrieveError};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::Serialize;
use std::thread::sleep;
use std::time::Duration;
use uuid::Uuid;

/// Production API endpoint
pub const DEFAULT_BASE_URL: &str = "https://chatnoir.eu";

#[derive(Serialize)]
struct ApiRequest<'a> {
    apikey: &'a str,
    query: &'a str,
    index: Vec<&'static str>,
    from: usize,
    size: usize,
    explain: bool,
    pretty: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    slop: Option<u8>,
}

/// ChatNoir API client
///
/// Transport failures, 429 and 5xx responses are retried with the request's
/// retry count and a fixed delay; anything else fails at once.
pub struct ChatNoirClient {
    http: Client,
    base_url: String,
}

impl ChatNoirClient {
    /// Create a client for the given API base URL
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("chatnoir-retrieve/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RetrieveError::Http {
                source: e,
                context: "Failed to build HTTP client".to_string(),
            })?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a client for the production API
    pub fn with_default_url() -> Result<Self> {
        Self::new(DEFAULT_BASE_URL, Duration::from_secs(60))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, mode: SearchMode) -> String {
        match mode {
            SearchMode::Plain => format!("{}/api/v1/_search", self.base_url),
            SearchMode::Phrases { .. } => format!("{}/api/v1/_phrases", self.base_url),
        }
    }

    /// Send a request, retrying transient failures
    fn send_with_retries<F>(
        &self,
        retries: u32,
        backoff: Duration,
        context: &str,
        send: F,
    ) -> Result<Response>
    where
        F: Fn() -> reqwest::Result<Response>,
    {
        let mut attempt = 0;
        loop {
            let failure = match send() {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if is_transient(response.status()) => {
                    RetrieveError::Api {
                        status: response.status().as_u16(),
                        body: response.text().unwrap_or_default(),
                    }
                }
                Ok(response) => {
                    return Err(RetrieveError::Api {
                        status: response.status().as_u16(),
                        body: response.text().unwrap_or_default(),
                    })
                }
                Err(e) => RetrieveError::Http {
                    source: e,
                    context: context.to_string(),
                },
            };

            if attempt >= retries {
                return Err(failure);
            }
            attempt += 1;
            tracing::warn!(
                "{} failed ({}), retrying in {:?} ({}/{})",
                context,
                failure,
                backoff,
                attempt,
                retries
            );
            sleep(backoff);
        }
    }
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

impl SearchClient for ChatNoirClient {
    fn fetch_page(&self, request: &SearchRequest, from: usize) -> Result<SearchPage> {
        let slop = match request.mode {
            SearchMode::Plain => None,
            SearchMode::Phrases { slop } => Some(u8::from(slop)),
        };
        let body = ApiRequest {
            apikey: &request.api_key,
            query: &request.query,
            index: request.index.iter().map(Index::as_str).collect(),
            from,
            size: request.page_size,
            explain: request.explain,
            pretty: false,
            slop,
        };
        let url = self.endpoint(request.mode);

        let response =
            self.send_with_retries(request.retries, request.backoff, "Search request", || {
                self.http.post(&url).json(&body).send()
            })?;

        response.json::<SearchPage>().map_err(|e| RetrieveError::Http {
            source: e,
            context: "Failed to parse search response".to_string(),
        })
    }

    fn fetch_contents(
        &self,
        request: &SearchRequest,
        uuid: &Uuid,
        index: Index,
        plain: bool,
    ) -> Result<String> {
        let url = format!("{}/cache", self.base_url);
        let uuid = uuid.to_string();
        let mode = if plain { "plain" } else { "raw" };

        let response = self.send_with_retries(
            request.retries,
            request.backoff,
            "Content request",
            || {
                self.http
                    .get(&url)
                    .query(&[("uuid", uuid.as_str()), ("index", index.as_str()), (mode, "")])
                    .send()
            },
        )?;

        response.text().map_err(|e| RetrieveError::Http {
            source: e,
            context: format!("Failed to read contents of {}", uuid),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_endpoints() {
        let client = ChatNoirClient::new("https://example.org/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "https://example.org");
        assert_eq!(
            client.endpoint(SearchMode::Plain),
            "https://example.org/api/v1/_search"
        );
        assert_eq!(
            client.endpoint(SearchMode::Phrases {
                slop: crate::client::Slop::One
            }),
            "https://example.org/api/v1/_phrases"
        );
    }

    #[test]
    fn test_request_body_includes_slop_only_for_phrases() {
        let body = ApiRequest {
            apikey: "key",
            query: "q",
            index: vec!["cw12"],
            from: 0,
            size: 10,
            explain: false,
            pretty: false,
            slop: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("slop").is_none());
        assert_eq!(json["index"], serde_json::json!(["cw12"]));
    }

    fn respond(status: u16) -> reqwest::Result<Response> {
        let response = ::http::Response::builder()
            .status(status)
            .body("")
            .unwrap();
        Ok(Response::from(response))
    }

    fn client() -> ChatNoirClient {
        ChatNoirClient::new("https://example.org", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_server_errors_retried_until_exhausted() {
        let attempts = Cell::new(0);
        let result = client().send_with_retries(3, Duration::ZERO, "test", || {
            attempts.set(attempts.get() + 1);
            respond(503)
        });

        assert_eq!(attempts.get(), 4);
        assert!(matches!(result, Err(RetrieveError::Api { status: 503, .. })));
    }

    #[test]
    fn test_rate_limit_then_success() {
        let attempts = Cell::new(0);
        let result = client().send_with_retries(5, Duration::ZERO, "test", || {
            attempts.set(attempts.get() + 1);
            respond(if attempts.get() == 1 { 429 } else { 200 })
        });

        assert_eq!(attempts.get(), 2);
        assert_eq!(result.unwrap().status(), StatusCode::OK);
    }

    #[test]
    fn test_server_error_then_success() {
        let attempts = Cell::new(0);
        let result = client().send_with_retries(2, Duration::ZERO, "test", || {
            attempts.set(attempts.get() + 1);
            respond(if attempts.get() == 1 { 503 } else { 200 })
        });

        assert_eq!(attempts.get(), 2);
        assert!(result.is_ok());
    }

    #[test]
    fn test_client_errors_fail_at_once() {
        let attempts = Cell::new(0);
        let result = client().send_with_retries(5, Duration::ZERO, "test", || {
            attempts.set(attempts.get() + 1);
            respond(401)
        });

        assert_eq!(attempts.get(), 1);
        assert!(matches!(result, Err(RetrieveError::Api { status: 401, .. })));
    }

    #[test]
    fn test_zero_retries_makes_one_attempt() {
        let attempts = Cell::new(0);
        let result = client().send_with_retries(0, Duration::ZERO, "test", || {
            attempts.set(attempts.get() + 1);
            respond(500)
        });

        assert_eq!(attempts.get(), 1);
        assert!(matches!(result, Err(RetrieveError::Api { status: 500, .. })));
    }

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient(StatusCode::BAD_GATEWAY));
        assert!(!is_transient(StatusCode::UNAUTHORIZED));
    }
}
