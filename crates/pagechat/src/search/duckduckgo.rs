//! DuckDuckGo HTML search
//!
//! Scrapes the no-JavaScript results page. Result links point at a
//! DuckDuckGo redirect that carries the destination in its `uddg` query
//! parameter.

use super::{SearchProvider, SearchResult};
use crate::error::SearchError;
use crate::DEFAULT_USER_AGENT;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use scraper::{Html, Selector};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Public HTML endpoint
pub const DUCKDUCKGO_HTML_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

#[allow(clippy::expect_used)]
static RESULT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".result").expect("valid result selector"));

#[allow(clippy::expect_used)]
static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.result__a").expect("valid link selector"));

#[allow(clippy::expect_used)]
static SNIPPET_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".result__snippet").expect("valid snippet selector"));

/// DuckDuckGo search provider
pub struct DuckDuckGoProvider {
    endpoint: String,
}

impl DuckDuckGoProvider {
    /// Provider for the public endpoint
    pub fn new() -> Self {
        Self::with_endpoint(DUCKDUCKGO_HTML_ENDPOINT)
    }

    /// Provider for a custom endpoint (mirrors, tests)
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

impl Default for DuckDuckGoProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let url = Url::parse_with_params(&self.endpoint, &[("q", query)])
            .map_err(|e| SearchError::Provider(format!("invalid endpoint: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()?;

        debug!(provider = self.name(), url = %url, "Requesting search results");

        let response = client
            .get(url)
            .header(USER_AGENT, DEFAULT_USER_AGENT)
            .header(ACCEPT, "text/html")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::Provider(format!(
                "DuckDuckGo returned status {}",
                response.status().as_u16()
            )));
        }

        let body = response.text().await?;
        Ok(parse_results(&body, max_results))
    }
}

/// Pull results out of a DuckDuckGo HTML results page
///
/// Ads (`.result--ad`) are skipped, as are entries with neither a title
/// nor a link.
pub fn parse_results(html: &str, max_results: usize) -> Vec<SearchResult> {
    let doc = Html::parse_document(html);

    doc.root_element()
        .select(&RESULT_SELECTOR)
        .filter(|result| !result.value().classes().any(|c| c == "result--ad"))
        .filter_map(|result| {
            let link = result.select(&LINK_SELECTOR).next();
            let title = link
                .map(|el| el.text().collect::<String>().trim().to_string())
                .unwrap_or_default();
            let url = link
                .and_then(|el| el.value().attr("href"))
                .map(decode_redirect)
                .unwrap_or_default();
            let snippet = result
                .select(&SNIPPET_SELECTOR)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
                .filter(|s| !s.is_empty());

            if title.is_empty() && url.is_empty() {
                return None;
            }
            Some(SearchResult {
                title,
                url,
                snippet,
            })
        })
        .take(max_results)
        .collect()
}

/// Resolve `//duckduckgo.com/l/?uddg=<encoded>&rut=...` to its destination
///
/// Links without a `uddg` parameter are returned as-is.
pub fn decode_redirect(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };

    Url::parse(&absolute)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "uddg")
                .map(|(_, value)| value.into_owned())
        })
        .filter(|dest| !dest.is_empty())
        .unwrap_or_else(|| href.to_string())
}
