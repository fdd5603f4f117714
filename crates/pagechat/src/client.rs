//! HTTP client for PageChat
//!
//! This module provides the entry points for fetching a webpage and turning
//! it into a prompt-ready artifact. The text processing lives in
//! [`extract`](crate::extract).

use crate::error::FetchError;
use crate::extract::encoding::{declared_encoding, sniff_encoding};
use crate::extract::extract_fetched;
use crate::types::{ExtractedPage, FetchRequest, FetchResult};
use crate::{DEFAULT_MAX_CHARS, DEFAULT_USER_AGENT};
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, CONTENT_TYPE, DNT,
    UPGRADE_INSECURE_REQUESTS, USER_AGENT,
};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Whole-request timeout (connect, headers and body)
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Bodies larger than this are cut off
pub const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Fetch options
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Custom User-Agent, defaults to a desktop browser string
    pub user_agent: Option<String>,
    /// Whole-request timeout
    pub timeout: Duration,
    /// Character cap on the rendered artifact
    pub max_chars: usize,
    /// Byte cap on the downloaded body
    pub max_body_bytes: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout: FETCH_TIMEOUT,
            max_chars: DEFAULT_MAX_CHARS,
            max_body_bytes: MAX_BODY_BYTES,
        }
    }
}

/// Fetch a webpage and return its text as a prompt-ready artifact
///
/// Never fails: errors are rendered as readable text in place of the
/// artifact, so the caller can embed the result either way.
pub async fn get_webpage_content(url: &str) -> String {
    get_webpage_content_with_options(url, &FetchOptions::default()).await
}

/// [`get_webpage_content`] with custom options
pub async fn get_webpage_content_with_options(url: &str, options: &FetchOptions) -> String {
    match fetch_page(url, options).await {
        Ok(page) => page.artifact(options.max_chars),
        Err(e) => {
            warn!(url, error = %e, "Webpage fetch failed");
            e.to_string()
        }
    }
}

/// Fetch a webpage and extract its main text
///
/// Any status other than 200 is reported as [`FetchError::HttpStatus`].
pub async fn fetch_page(url: &str, options: &FetchOptions) -> Result<ExtractedPage, FetchError> {
    let result = fetch_raw(&FetchRequest::new(url), options).await?;

    if result.status_code != 200 {
        return Err(FetchError::HttpStatus(result.status_code));
    }

    Ok(extract_fetched(&result))
}

/// Issue the GET and collect the raw response
pub async fn fetch_raw(
    request: &FetchRequest,
    options: &FetchOptions,
) -> Result<FetchResult, FetchError> {
    if request.url.trim().is_empty() {
        return Err(FetchError::MissingUrl);
    }

    let url = request.normalized_url();
    match Url::parse(&url) {
        Ok(parsed) if parsed.host_str().is_some_and(|h| !h.is_empty()) => {}
        _ => return Err(FetchError::InvalidUrl { url }),
    }

    let user_agent = options.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
    let client = reqwest::Client::builder()
        .default_headers(browser_headers(user_agent))
        .timeout(options.timeout)
        .build()
        .map_err(FetchError::ClientBuild)?;

    info!(url = %url, "Fetching webpage");

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(e, &url, options.timeout))?;

    let status_code = response.status().as_u16();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let raw_bytes = read_body_capped(response, options.max_body_bytes)
        .await
        .map_err(|e| FetchError::from_reqwest(e, &url, options.timeout))?;

    let declared_encoding = declared_encoding(content_type.as_deref());
    let apparent_encoding = Some(sniff_encoding(&raw_bytes).name().to_string());

    debug!(
        url = %url,
        status_code,
        size = raw_bytes.len(),
        content_type = ?content_type,
        "Fetched webpage"
    );

    Ok(FetchResult {
        url,
        status_code,
        content_type,
        raw_bytes,
        declared_encoding,
        apparent_encoding,
    })
}

/// Headers a desktop browser would send for a page navigation
fn browser_headers(user_agent: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT)),
    );
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(DNT, HeaderValue::from_static("1"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers
}

/// Read the response body, keeping at most `max_bytes`
async fn read_body_capped(
    response: reqwest::Response,
    max_bytes: usize,
) -> Result<Bytes, reqwest::Error> {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let room = max_bytes.saturating_sub(body.len());
        if chunk.len() > room {
            body.extend_from_slice(&chunk[..room]);
            warn!(max_bytes, "Body exceeds size cap, discarding the rest");
            break;
        }
        body.extend_from_slice(&chunk);
    }

    Ok(Bytes::from(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_empty_url() {
        let result = fetch_raw(&FetchRequest::new("   "), &FetchOptions::default()).await;
        assert!(matches!(result, Err(FetchError::MissingUrl)));
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let result = fetch_raw(&FetchRequest::new("exa mple.com"), &FetchOptions::default()).await;
        match result {
            Err(FetchError::InvalidUrl { url }) => assert_eq!(url, "https://exa mple.com"),
            other => panic!("expected InvalidUrl, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_scheme_only_url() {
        let result = fetch_raw(&FetchRequest::new("https://"), &FetchOptions::default()).await;
        assert!(matches!(result, Err(FetchError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_get_webpage_content_reports_invalid_url() {
        let text = get_webpage_content("http://").await;
        assert_eq!(
            text,
            "Error: Invalid URL format for http://. Make sure it includes http:// or https://."
        );
    }

    #[test]
    fn test_fetch_options_default() {
        let options = FetchOptions::default();
        assert!(options.user_agent.is_none());
        assert_eq!(options.timeout, Duration::from_secs(10));
        assert_eq!(options.max_chars, 8000);
        assert_eq!(options.max_body_bytes, MAX_BODY_BYTES);
    }

    #[test]
    fn test_browser_headers() {
        let headers = browser_headers("TestAgent/1.0");
        assert_eq!(headers[USER_AGENT], "TestAgent/1.0");
        assert_eq!(headers[ACCEPT_LANGUAGE], "en-US,en;q=0.5");
        assert_eq!(headers[CONNECTION], "keep-alive");
        assert_eq!(headers[DNT], "1");
        assert!(headers[ACCEPT].to_str().unwrap().starts_with("text/html"));
    }

    #[test]
    fn test_browser_headers_rejects_bad_user_agent() {
        let headers = browser_headers("bad\nagent");
        assert_eq!(headers[USER_AGENT], DEFAULT_USER_AGENT);
    }
}
