//! Wikipedia search via the MediaWiki API
//!
//! A `list=search` query finds matching articles; each hit then gets its
//! plain-text intro through `prop=extracts`.

use super::{char_prefix, SearchProvider, SearchResult};
use crate::error::SearchError;
use crate::DEFAULT_USER_AGENT;
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// English Wikipedia API endpoint
pub const WIKIPEDIA_API_ENDPOINT: &str = "https://en.wikipedia.org/w/api.php";

const ARTICLE_BASE: &str = "https://en.wikipedia.org/wiki/";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_EXTRACT_CHARS: usize = 300;

/// Wikipedia search provider
pub struct WikipediaProvider {
    endpoint: String,
}

impl WikipediaProvider {
    /// Provider for English Wikipedia
    pub fn new() -> Self {
        Self::with_endpoint(WIKIPEDIA_API_ENDPOINT)
    }

    /// Provider for another MediaWiki `api.php` endpoint
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        client: &reqwest::Client,
        params: &[(&str, &str)],
    ) -> Result<T, SearchError> {
        let url = Url::parse_with_params(&self.endpoint, params)
            .map_err(|e| SearchError::Provider(format!("invalid endpoint: {e}")))?;

        let response = client
            .get(url)
            .header(USER_AGENT, DEFAULT_USER_AGENT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::Provider(format!(
                "Wikipedia returned status {}",
                response.status().as_u16()
            )));
        }

        Ok(response.json::<T>().await?)
    }

    async fn intro(&self, client: &reqwest::Client, page_id: u64) -> Result<String, SearchError> {
        let page_id = page_id.to_string();
        let response: ExtractResponse = self
            .get_json(
                client,
                &[
                    ("action", "query"),
                    ("prop", "extracts"),
                    ("exintro", "1"),
                    ("explaintext", "1"),
                    ("pageids", page_id.as_str()),
                    ("format", "json"),
                ],
            )
            .await?;

        Ok(response
            .query
            .and_then(|q| q.pages.get(&page_id).and_then(|p| p.extract.clone()))
            .unwrap_or_default())
    }
}

impl Default for WikipediaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
    pageid: u64,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    query: Option<ExtractQuery>,
}

#[derive(Debug, Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    pages: HashMap<String, ExtractPage>,
}

#[derive(Debug, Deserialize)]
struct ExtractPage {
    extract: Option<String>,
}

#[async_trait]
impl SearchProvider for WikipediaProvider {
    fn name(&self) -> &'static str {
        "wikipedia"
    }

    fn results_header(&self) -> Option<&'static str> {
        Some("Wikipedia Search Results:")
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()?;

        let limit = max_results.to_string();
        let response: SearchResponse = self
            .get_json(
                &client,
                &[
                    ("action", "query"),
                    ("list", "search"),
                    ("srsearch", query),
                    ("format", "json"),
                    ("srlimit", limit.as_str()),
                ],
            )
            .await?;

        let hits = response.query.map(|q| q.search).unwrap_or_default();
        debug!(provider = self.name(), hits = hits.len(), "Wikipedia search complete");

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits.into_iter().take(max_results) {
            // A failed intro lookup drops the hit rather than the whole search
            let extract = match self.intro(&client, hit.pageid).await {
                Ok(extract) => extract,
                Err(e) => {
                    warn!(title = %hit.title, error = %e, "Could not fetch article intro");
                    continue;
                }
            };

            results.push(SearchResult {
                url: article_url(&hit.title),
                snippet: Some(shorten_extract(&extract)).filter(|s| !s.is_empty()),
                title: hit.title,
            });
        }

        Ok(results)
    }
}

/// Canonical article link for a page title
pub fn article_url(title: &str) -> String {
    format!("{ARTICLE_BASE}{}", title.replace(' ', "_"))
}

/// Intros over 300 characters are cut and marked with `...`
fn shorten_extract(extract: &str) -> String {
    if extract.chars().count() > MAX_EXTRACT_CHARS {
        format!("{}...", char_prefix(extract, MAX_EXTRACT_CHARS))
    } else {
        extract.to_string()
    }
}
