//! PageChat - chat with OpenRouter models, augmented with the web
//!
//! This crate provides the library half of PageChat: a webpage text
//! extraction pipeline, pluggable web search, an OpenRouter-compatible
//! model client, and the chat orchestration that ties them together.
//!
//! ## Extraction pipeline
//!
//! [`get_webpage_content`] fetches a URL and turns it into a compact
//! plain-text artifact suitable for embedding in a prompt:
//!
//! 1. Fetch with browser-like headers and a 10 second timeout
//! 2. Resolve the character encoding (sniff when the server says ISO-8859-1)
//! 3. Select the main content region
//! 4. Strip scripts, navigation, ads and forms
//! 5. Normalize whitespace
//! 6. Truncate to 8000 characters
//!
//! Failures never escape as errors: they come back as readable text so a
//! chat turn can always proceed.
//!
//! ## Search
//!
//! [`web_search`] runs a query against a [`SearchProvider`]
//! ([`DuckDuckGoProvider`] or [`WikipediaProvider`]) and formats the
//! results as a numbered list.

pub mod chat;
pub mod client;
mod error;
pub mod extract;
pub mod history;
pub mod llm;
pub mod models;
pub mod search;
pub mod settings;
mod types;

pub use chat::{ChatConfig, ChatSession, Orchestrator, Turn};
pub use client::{fetch_page, fetch_raw, get_webpage_content, FetchOptions};
pub use error::{ChatError, FetchError, HistoryError, SearchError, SettingsError};
pub use extract::extract_page;
pub use history::{ConversationRecord, HistoryStore};
pub use llm::{ChatBackend, ChatMessage, OpenRouterClient, Role};
pub use models::{ModelEntry, ModelRegistry, ModelSource, ResolvedModel};
pub use search::{web_search, DuckDuckGoProvider, SearchProvider, SearchResult, WikipediaProvider};
pub use settings::Settings;
pub use types::{ExtractedPage, FetchRequest, FetchResult};

/// Browser User-Agent sent with page fetches
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Default OpenRouter API base URL
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default cap on the extracted artifact, in characters
pub const DEFAULT_MAX_CHARS: usize = 8000;

/// Marker appended when the artifact is cut at the cap
pub const TRUNCATION_MARKER: &str = "...\n[Content truncated due to length]";

/// Title used when a page has no usable `<title>`
pub const NO_TITLE: &str = "No title";
