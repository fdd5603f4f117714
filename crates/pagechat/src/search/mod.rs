//! Web search providers
//!
//! Design: each provider turns a query into an ordered list of
//! [`SearchResult`]s. [`web_search`] runs one provider and renders the
//! results (or the failure) as text for a prompt.

mod duckduckgo;
mod wikipedia;

pub use duckduckgo::DuckDuckGoProvider;
pub use wikipedia::WikipediaProvider;

use crate::error::SearchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use tracing::{debug, warn};

/// Number of results requested when the caller does not say
pub const DEFAULT_NUM_RESULTS: usize = 5;

const MAX_TITLE_CHARS: usize = 120;
const MAX_SNIPPET_CHARS: usize = 400;

/// One hit returned by a provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: Option<String>,
}

/// Trait for search backends
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Identifier used in logs and on the command line
    fn name(&self) -> &'static str;

    /// Line placed above a non-empty results list
    fn results_header(&self) -> Option<&'static str> {
        None
    }

    /// Run `query`, returning at most `max_results` hits in ranking order
    async fn search(&self, query: &str, max_results: usize)
        -> Result<Vec<SearchResult>, SearchError>;
}

/// Search and format the results as a numbered list
///
/// Never fails: an empty result set and provider errors both come back as
/// readable text.
pub async fn web_search(provider: &dyn SearchProvider, query: &str, max_results: usize) -> String {
    debug!(provider = provider.name(), query, max_results, "Running web search");

    let outcome = match provider.search(query, max_results).await {
        Ok(results) if results.is_empty() => Err(SearchError::NoResults {
            query: query.to_string(),
        }),
        Ok(mut results) => {
            results.truncate(max_results);
            Ok(results)
        }
        Err(e) => Err(e),
    };

    match outcome {
        Ok(results) => match provider.results_header() {
            Some(header) => format!("{header}\n\n{}", format_results(&results)),
            None => format_results(&results),
        },
        Err(e) => {
            if !matches!(e, SearchError::NoResults { .. }) {
                warn!(provider = provider.name(), error = %e, "Web search failed");
            }
            e.to_string()
        }
    }
}

/// Render results as numbered entries separated by blank lines
pub fn format_results(results: &[SearchResult]) -> String {
    let mut out = String::new();

    for (i, result) in results.iter().enumerate() {
        let title = if result.title.is_empty() {
            "[No title]"
        } else {
            &result.title
        };
        let url = if result.url.is_empty() {
            "[No URL]"
        } else {
            &result.url
        };

        let _ = writeln!(out, "{}. {}", i + 1, char_prefix(title, MAX_TITLE_CHARS));
        let _ = writeln!(out, "   URL: {url}");
        match result.snippet.as_deref().filter(|s| !s.is_empty()) {
            Some(snippet) => {
                let _ = write!(out, "   {}\n\n", char_prefix(snippet, MAX_SNIPPET_CHARS));
            }
            None => out.push_str("   [No description available]\n\n"),
        }
    }

    out
}

/// The first `max` characters of `s`
pub(crate) fn char_prefix(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
