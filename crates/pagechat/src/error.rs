//! Error types for PageChat
//!
//! The `Display` text of the fetch and search errors is what ends up in the
//! chat transcript, so it is phrased for the user rather than for logs.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while fetching a webpage
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL is missing
    #[error("Error: Missing required parameter: url")]
    MissingUrl,

    /// URL could not be parsed or has an unsupported scheme
    #[error("Error: Invalid URL format for {url}. Make sure it includes http:// or https://.")]
    InvalidUrl { url: String },

    /// Request did not complete within the timeout
    #[error("Error: Request to {url} timed out after {} seconds.", display_secs(.timeout))]
    Timeout { url: String, timeout: Duration },

    /// Failed to connect to server
    #[error("Error: Could not connect to {url}. Please check the URL and try again.")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with something other than 200
    #[error("Error: Could not fetch the webpage. Status code: {0}")]
    HttpStatus(u16),

    /// Failed to build HTTP client
    #[error("Error fetching webpage: failed to create HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    /// Other transport error
    #[error("Error fetching webpage: {0}")]
    Request(String),
}

impl FetchError {
    /// Classify a reqwest error for the given URL
    pub fn from_reqwest(err: reqwest::Error, url: &str, timeout: Duration) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout,
            }
        } else if err.is_connect() {
            FetchError::Connect {
                url: url.to_string(),
                source: err,
            }
        } else if err.is_builder() {
            FetchError::InvalidUrl {
                url: url.to_string(),
            }
        } else {
            FetchError::Request(err.to_string())
        }
    }
}

fn display_secs(timeout: &Duration) -> String {
    if timeout.subsec_millis() == 0 {
        timeout.as_secs().to_string()
    } else {
        format!("{:.1}", timeout.as_secs_f64())
    }
}

/// Errors from a search provider
#[derive(Debug, Error)]
pub enum SearchError {
    /// Provider returned nothing for the query
    #[error("No search results found for '{query}'. Try refining your search terms.")]
    NoResults { query: String },

    /// Transport failure talking to the provider
    #[error("Error during web search: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered but the answer was unusable
    #[error("Error during web search: {0}")]
    Provider(String),
}

/// Errors from the chat path
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Error: Please provide an OpenRouter API key in the settings panel.")]
    MissingApiKey,

    #[error("Please provide a search query after 'search:'")]
    EmptySearchQuery,

    #[error("Please provide a URL after 'url:'")]
    EmptyUrl,

    /// Transport failure talking to the model API
    #[error("Error: {0}")]
    Http(#[from] reqwest::Error),

    /// Model API answered without a completion; carries the raw body
    #[error("Error: {0}")]
    Api(String),
}

/// Errors from the conversation history store
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Errors reading or writing the settings file
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
