//! Evidence source: web search returning ranked hits with citations.
//!
//! The evidence source knows nothing about reasoning backends. Search-augmented
//! backends call it once per research step and build their analysis context
//! from the returned hits.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::{DEFAULT_SEARCH_ENDPOINT, SEARCH_API_KEY_ENV, SearchConfig};
use crate::error::SearchError;
use crate::types::Source;

/// A single search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub uri: String,
    pub title: String,
    pub content: String,
}

/// Hits plus their citations.
///
/// `citations` is always the 1:1 projection of `hits` in hit order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    pub citations: Vec<Source>,
}

impl SearchResults {
    pub fn from_hits(hits: Vec<SearchHit>) -> Self {
        let citations = hits
            .iter()
            .map(|hit| Source::new(hit.uri.clone(), hit.title.clone()))
            .collect();
        Self { hits, citations }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Web search capability used by search-augmented backends.
#[async_trait]
pub trait EvidenceSource: Send + Sync {
    /// Search the web for `query`, returning at most `max_results` hits.
    ///
    /// `credential` takes precedence over any process-level default. Fails with
    /// [`SearchError::MissingCredential`] before any network call when neither
    /// is available.
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        credential: Option<&str>,
    ) -> Result<SearchResults, SearchError>;
}

/// Tavily search API client.
pub struct TavilySearch {
    client: Client,
    endpoint: String,
    api_key_env: String,
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

impl TavilySearch {
    /// Create a client for the public Tavily endpoint.
    pub fn new() -> Result<Self, SearchError> {
        Self::from_config(&SearchConfig::default())
    }

    pub fn from_config(config: &SearchConfig) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SearchError::Request {
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        let endpoint = if config.endpoint.trim().is_empty() {
            DEFAULT_SEARCH_ENDPOINT.to_string()
        } else {
            config.endpoint.clone()
        };
        let api_key_env = if config.api_key_env.trim().is_empty() {
            SEARCH_API_KEY_ENV.to_string()
        } else {
            config.api_key_env.clone()
        };
        Ok(Self {
            client,
            endpoint,
            api_key_env,
        })
    }

    /// Resolve the credential: call-site argument first, then the environment.
    fn resolve_credential(&self, credential: Option<&str>) -> Result<String, SearchError> {
        if let Some(key) = credential.map(str::trim).filter(|k| !k.is_empty()) {
            return Ok(key.to_string());
        }
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| SearchError::MissingCredential {
                env_var: self.api_key_env.clone(),
            })
    }

    fn parse_response(body: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        let parsed: TavilyResponse =
            serde_json::from_str(body).map_err(|e| SearchError::ResponseParse {
                message: format!("Invalid JSON in search response: {}", e),
            })?;
        Ok(parsed
            .results
            .into_iter()
            .take(max_results)
            .map(|r| SearchHit {
                uri: r.url,
                title: r.title,
                content: r.content,
            })
            .collect())
    }
}

#[async_trait]
impl EvidenceSource for TavilySearch {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        credential: Option<&str>,
    ) -> Result<SearchResults, SearchError> {
        let api_key = self.resolve_credential(credential)?;
        let body = TavilyRequest {
            api_key: &api_key,
            query,
            max_results,
            search_depth: "basic",
        };

        debug!(
            endpoint = self.endpoint.as_str(),
            max_results, "Sending search request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchError::Request {
                message: e.to_string(),
            })?;

        let status = response.status();
        let body_text = response.text().await.map_err(|e| SearchError::Request {
            message: format!("Failed to read response body: {}", e),
        })?;

        if !status.is_success() {
            return Err(SearchError::Http {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let hits = Self::parse_response(&body_text, max_results)?;
        debug!(hits = hits.len(), "Search completed");
        Ok(SearchResults::from_hits(hits))
    }
}
