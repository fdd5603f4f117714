//! Core types for PageChat

use crate::extract::truncate::truncate_artifact;
use crate::DEFAULT_MAX_CHARS;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Request to fetch a webpage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    /// The URL to fetch; `https://` is assumed when no scheme is given
    pub url: String,
}

impl FetchRequest {
    /// Create a new request with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// The URL that will actually be requested
    ///
    /// Surrounding whitespace is dropped and `https://` is prepended when
    /// the URL does not start with `http://` or `https://`.
    pub fn normalized_url(&self) -> String {
        let url = self.url.trim();
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("https://{url}")
        }
    }
}

/// Raw outcome of a successful fetch
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// URL that was requested (after normalization)
    pub url: String,
    /// HTTP status code
    pub status_code: u16,
    /// Content-Type header value
    pub content_type: Option<String>,
    /// Response body
    pub raw_bytes: Bytes,
    /// Encoding announced by the transport, if any
    pub declared_encoding: Option<String>,
    /// Encoding sniffed from the body bytes
    pub apparent_encoding: Option<String>,
}

/// Text extracted from a webpage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedPage {
    pub title: String,
    pub url: String,
    /// Normalized main-content text
    pub body: String,
}

impl ExtractedPage {
    /// Render the prompt-ready artifact, capped at `max_chars` characters
    pub fn artifact(&self, max_chars: usize) -> String {
        let assembled = format!("Title: {}\nURL: {}\n\n{}", self.title, self.url, self.body);
        truncate_artifact(assembled, max_chars)
    }
}

impl fmt::Display for ExtractedPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.artifact(DEFAULT_MAX_CHARS))
    }
}
