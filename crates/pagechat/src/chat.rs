//! Chat orchestration
//!
//! An [`Orchestrator`] turns one user message into one model reply: it
//! recognizes the `search:` and `url:` commands, wraps their results in a
//! prompt, calls the [`ChatBackend`] and logs the exchange. A
//! [`ChatSession`] keeps the visible transcript on top of that.

use crate::client::{get_webpage_content_with_options, FetchOptions};
use crate::error::ChatError;
use crate::history::HistoryStore;
use crate::llm::{ChatBackend, ChatMessage};
use crate::models::ModelRegistry;
use crate::search::{web_search, SearchProvider, DEFAULT_NUM_RESULTS};
use crate::settings::{is_api_key_set, Settings};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

const SEARCH_PREFIX: &str = "search:";
const URL_PREFIX: &str = "url:";

/// User side of the turn that carries a search answer
pub const AI_RESPONSE_LABEL: &str = "[AI Response]";

/// Per-request chat parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub api_key: String,
    /// API model id (not the display name)
    pub model: String,
    pub system_prompt: String,
    pub enable_web_search: bool,
}

impl ChatConfig {
    /// Config for `model` using the key, prompt and toggle from `settings`
    pub fn from_settings(settings: &Settings, model: impl Into<String>) -> Self {
        Self {
            api_key: settings.api_key.clone(),
            model: model.into(),
            system_prompt: settings.system_prompt.clone(),
            enable_web_search: settings.enable_web_search,
        }
    }

    pub fn has_api_key(&self) -> bool {
        is_api_key_set(&self.api_key)
    }
}

/// One transcript entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub user: String,
    pub assistant: String,
}

impl Turn {
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
        }
    }
}

/// What a message asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// `search:<query>`; the query is trimmed and may be empty
    Search(&'a str),
    /// `url:<address>`; the address is trimmed and may be empty
    Url(&'a str),
    /// Anything else
    Plain,
}

impl<'a> Command<'a> {
    /// Recognize a command prefix, case-insensitively
    ///
    /// With web features disabled every message is [`Command::Plain`].
    pub fn parse(message: &'a str, web_enabled: bool) -> Self {
        if !web_enabled {
            return Command::Plain;
        }
        if let Some(query) = strip_prefix_ignore_case(message, SEARCH_PREFIX) {
            Command::Search(query.trim())
        } else if let Some(url) = strip_prefix_ignore_case(message, URL_PREFIX) {
            Command::Url(url.trim())
        } else {
            Command::Plain
        }
    }
}

fn strip_prefix_ignore_case<'a>(message: &'a str, prefix: &str) -> Option<&'a str> {
    let head = message.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &message[prefix.len()..])
}

/// Prompt asking the model to answer from search results
pub fn search_prompt(query: &str, results: &str) -> String {
    format!(
        "The user wants information about: {query}\n\n\
         Here are some search results from DuckDuckGo and Wikipedia to help you answer:\n\n\
         {results}\n\n\
         Based on these search results, please provide a comprehensive and accurate response to the user's query. \
         Cite specific information from the search results when possible. \
         If the search results don't contain enough information, acknowledge the limitations \
         and provide the best answer you can with the available information."
    )
}

/// Prompt asking the model to summarize a fetched page
pub fn url_prompt(url: &str, content: &str) -> String {
    format!(
        "The user wants information from this URL: {url}\n\n\
         Here's the content of the webpage:\n\n{content}\n\n\
         Please provide a comprehensive summary of this webpage content. \
         Focus on the main points, key information, and any important details. \
         If the content is technical or specialized, explain it in a way that's easy to understand. \
         If there are any limitations in the extracted content, acknowledge them in your response."
    )
}

/// Routes messages through search, fetch, the model and the history log
pub struct Orchestrator {
    backend: Arc<dyn ChatBackend>,
    search: Arc<dyn SearchProvider>,
    history: Option<HistoryStore>,
    fetch_options: FetchOptions,
    num_results: usize,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn ChatBackend>, search: Arc<dyn SearchProvider>) -> Self {
        Self {
            backend,
            search,
            history: None,
            fetch_options: FetchOptions::default(),
            num_results: DEFAULT_NUM_RESULTS,
        }
    }

    /// Log every exchange to `history`
    pub fn with_history(mut self, history: HistoryStore) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_fetch_options(mut self, options: FetchOptions) -> Self {
        self.fetch_options = options;
        self
    }

    /// Number of search results put in front of the model
    pub fn with_num_results(mut self, num_results: usize) -> Self {
        self.num_results = num_results;
        self
    }

    pub fn history(&self) -> Option<&HistoryStore> {
        self.history.as_ref()
    }

    pub fn search_provider(&self) -> &dyn SearchProvider {
        self.search.as_ref()
    }

    /// Reply to `message` given the prior `transcript`
    ///
    /// Always returns text: configuration problems and API failures come
    /// back as messages for the user.
    pub async fn chat(&self, message: &str, transcript: &[Turn], config: &ChatConfig) -> String {
        match self.try_chat(message, transcript, config).await {
            Ok(reply) => reply,
            Err(e) => e.to_string(),
        }
    }

    async fn try_chat(
        &self,
        message: &str,
        transcript: &[Turn],
        config: &ChatConfig,
    ) -> Result<String, ChatError> {
        if !config.has_api_key() {
            return Err(ChatError::MissingApiKey);
        }

        let prompt = match Command::parse(message, config.enable_web_search) {
            Command::Search("") => return Err(ChatError::EmptySearchQuery),
            Command::Url("") => return Err(ChatError::EmptyUrl),
            Command::Search(query) => {
                info!(query, "Searching the web");
                let results = self.run_search(query).await;
                search_prompt(query, &results)
            }
            Command::Url(url) => {
                info!(url, "Fetching webpage for the model");
                let content = get_webpage_content_with_options(url, &self.fetch_options).await;
                url_prompt(url, &content)
            }
            Command::Plain => message.to_string(),
        };

        Ok(self.complete(message, prompt, transcript, config).await)
    }

    /// Answer a `search:` message from results the caller already has
    pub async fn chat_with_results(
        &self,
        message: &str,
        query: &str,
        results: &str,
        transcript: &[Turn],
        config: &ChatConfig,
    ) -> String {
        if !config.has_api_key() {
            return ChatError::MissingApiKey.to_string();
        }
        self.complete(message, search_prompt(query, results), transcript, config)
            .await
    }

    /// Formatted search results for `query`
    pub async fn run_search(&self, query: &str) -> String {
        web_search(self.search.as_ref(), query, self.num_results).await
    }

    /// Send the conversation plus `prompt` and log `message` with the reply
    async fn complete(
        &self,
        message: &str,
        prompt: String,
        transcript: &[Turn],
        config: &ChatConfig,
    ) -> String {
        let messages = build_messages(&config.system_prompt, transcript, prompt);

        let reply = match self
            .backend
            .complete(&config.api_key, &messages, &config.model)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!(model = %config.model, error = %e, "Completion failed");
                e.to_string()
            }
        };

        if let Some(history) = &self.history {
            if let Err(e) = history
                .save(message, &reply, &config.model, &config.system_prompt)
                .await
            {
                warn!(error = %e, "Could not save to database");
            }
        }

        reply
    }

    /// Fetch the provider's model list into `registry`
    ///
    /// Returns a status line for the user.
    pub async fn refresh_models(&self, api_key: &str, registry: &mut ModelRegistry) -> String {
        if !is_api_key_set(api_key) {
            return "Please provide an API key to fetch models.".to_string();
        }

        match self.backend.list_models(api_key).await {
            Some(models) if !models.is_empty() => {
                debug!(count = models.len(), "Fetched model list");
                registry.set_dynamic(models);
                "Models list refreshed successfully!".to_string()
            }
            _ => "Failed to fetch models. Check your API key and connection.".to_string(),
        }
    }
}

/// System prompt (if any), the transcript as alternating turns, then `prompt`
pub fn build_messages(system_prompt: &str, transcript: &[Turn], prompt: String) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(transcript.len() * 2 + 2);
    if !system_prompt.is_empty() {
        messages.push(ChatMessage::system(system_prompt));
    }
    for turn in transcript {
        messages.push(ChatMessage::user(turn.user.as_str()));
        messages.push(ChatMessage::assistant(turn.assistant.as_str()));
    }
    messages.push(ChatMessage::user(prompt));
    messages
}

/// A running conversation
pub struct ChatSession {
    orchestrator: Orchestrator,
    turns: Vec<Turn>,
}

impl ChatSession {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            turns: Vec::new(),
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Handle one user message, appending to the transcript
    ///
    /// Blank input is ignored. A `search:` message adds two turns: the raw
    /// results, then the model's answer under [`AI_RESPONSE_LABEL`]. Any
    /// other message adds a single turn. Returns the turns just added.
    pub async fn respond(&mut self, message: &str, config: &ChatConfig) -> &[Turn] {
        let start = self.turns.len();
        if message.trim().is_empty() {
            return &self.turns[start..];
        }

        match Command::parse(message, config.enable_web_search) {
            Command::Search("") => {
                self.turns
                    .push(Turn::new(message, ChatError::EmptySearchQuery.to_string()));
            }
            Command::Search(query) => {
                let results = self.orchestrator.run_search(query).await;
                let reply = self
                    .orchestrator
                    .chat_with_results(message, query, &results, &self.turns, config)
                    .await;
                self.turns.push(Turn::new(message, results));
                self.turns.push(Turn::new(AI_RESPONSE_LABEL, reply));
            }
            _ => {
                let reply = self.orchestrator.chat(message, &self.turns, config).await;
                self.turns.push(Turn::new(message, reply));
            }
        }

        &self.turns[start..]
    }

    /// Forget the transcript
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;
    use crate::models::ModelEntry;
    use crate::search::SearchResult;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every request and answers with a canned reply
    #[derive(Default)]
    struct EchoBackend {
        calls: Mutex<Vec<Vec<ChatMessage>>>,
        models: Option<Vec<ModelEntry>>,
    }

    impl EchoBackend {
        fn calls(&self) -> Vec<Vec<ChatMessage>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatBackend for EchoBackend {
        async fn complete(
            &self,
            _api_key: &str,
            messages: &[ChatMessage],
            model: &str,
        ) -> Result<String, ChatError> {
            self.calls.lock().unwrap().push(messages.to_vec());
            Ok(format!("reply from {model}"))
        }

        async fn list_models(&self, _api_key: &str) -> Option<Vec<ModelEntry>> {
            self.models.clone()
        }
    }

    struct CountingSearch {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl SearchProvider for CountingSearch {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn search(
            &self,
            query: &str,
            _max_results: usize,
        ) -> Result<Vec<SearchResult>, SearchError> {
            *self.calls.lock().unwrap() += 1;
            Ok(vec![SearchResult {
                title: format!("About {query}"),
                url: "https://example.com/".to_string(),
                snippet: Some("Snippet.".to_string()),
            }])
        }
    }

    fn config() -> ChatConfig {
        ChatConfig {
            api_key: "sk-test".to_string(),
            model: "openai/gpt-4o".to_string(),
            system_prompt: String::new(),
            enable_web_search: true,
        }
    }

    fn setup() -> (Arc<EchoBackend>, Arc<CountingSearch>, Orchestrator) {
        let backend = Arc::new(EchoBackend::default());
        let search = Arc::new(CountingSearch {
            calls: Mutex::new(0),
        });
        let orchestrator = Orchestrator::new(backend.clone(), search.clone());
        (backend, search, orchestrator)
    }

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("search: rust", true), Command::Search("rust"));
        assert_eq!(Command::parse("SEARCH:rust  ", true), Command::Search("rust"));
        assert_eq!(Command::parse("Url: example.com", true), Command::Url("example.com"));
        assert_eq!(Command::parse("search:   ", true), Command::Search(""));
        assert_eq!(Command::parse("search: rust", false), Command::Plain);
        assert_eq!(Command::parse("please search: rust", true), Command::Plain);
        assert_eq!(Command::parse("sé", true), Command::Plain);
    }

    #[test]
    fn test_build_messages() {
        let transcript = vec![Turn::new("hi", "hello")];
        let messages = build_messages("Be brief.", &transcript, "next".to_string());
        assert_eq!(
            messages,
            vec![
                ChatMessage::system("Be brief."),
                ChatMessage::user("hi"),
                ChatMessage::assistant("hello"),
                ChatMessage::user("next"),
            ]
        );

        let messages = build_messages("", &[], "only".to_string());
        assert_eq!(messages, vec![ChatMessage::user("only")]);
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let (backend, _, orchestrator) = setup();
        let config = ChatConfig {
            api_key: String::new(),
            ..config()
        };
        let reply = orchestrator.chat("hello", &[], &config).await;
        assert_eq!(
            reply,
            "Error: Please provide an OpenRouter API key in the settings panel."
        );
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_blank_api_key_is_missing() {
        let (backend, _, orchestrator) = setup();
        let config = ChatConfig {
            api_key: "   ".to_string(),
            ..config()
        };
        let reply = orchestrator.chat("hello", &[], &config).await;
        assert_eq!(reply, ChatError::MissingApiKey.to_string());

        let mut registry = ModelRegistry::new();
        assert_eq!(
            orchestrator.refresh_models(" \t", &mut registry).await,
            "Please provide an API key to fetch models."
        );
        assert!(backend.calls().is_empty());
        assert!(!registry.has_dynamic());
    }

    #[tokio::test]
    async fn test_empty_command_payloads() {
        let (backend, _, orchestrator) = setup();
        assert_eq!(
            orchestrator.chat("search:", &[], &config()).await,
            "Please provide a search query after 'search:'"
        );
        assert_eq!(
            orchestrator.chat("url:  ", &[], &config()).await,
            "Please provide a URL after 'url:'"
        );
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_plain_message() {
        let (backend, search, orchestrator) = setup();
        let reply = orchestrator.chat("hello", &[], &config()).await;
        assert_eq!(reply, "reply from openai/gpt-4o");
        assert_eq!(backend.calls()[0], vec![ChatMessage::user("hello")]);
        assert_eq!(*search.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_search_message_is_augmented() {
        let (backend, search, orchestrator) = setup();
        orchestrator.chat("search: rust", &[], &config()).await;

        let prompt = &backend.calls()[0][0].content;
        assert!(prompt.starts_with("The user wants information about: rust\n\n"));
        assert!(prompt.contains("1. About rust\n   URL: https://example.com/\n"));
        assert_eq!(*search.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_web_search_disabled_sends_raw_message() {
        let (backend, search, orchestrator) = setup();
        let config = ChatConfig {
            enable_web_search: false,
            ..config()
        };
        orchestrator.chat("search: rust", &[], &config).await;
        assert_eq!(backend.calls()[0][0].content, "search: rust");
        assert_eq!(*search.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_url_message_with_bad_url() {
        let (backend, _, orchestrator) = setup();
        orchestrator.chat("url: http://", &[], &config()).await;

        let prompt = &backend.calls()[0][0].content;
        assert!(prompt.starts_with("The user wants information from this URL: http://\n\n"));
        assert!(prompt.contains("Error: Invalid URL format for http://."));
    }

    #[tokio::test]
    async fn test_exchange_is_logged_with_raw_message() {
        let (_, _, orchestrator) = setup();
        let history = HistoryStore::in_memory().await.unwrap();
        let orchestrator = orchestrator.with_history(history.clone());
        let config = ChatConfig {
            system_prompt: "Be brief.".to_string(),
            ..config()
        };

        orchestrator.chat("search: rust", &[], &config).await;

        let records = history.all_newest_first().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].user_message, "search: rust");
        assert_eq!(records[0].assistant_message, "reply from openai/gpt-4o");
        assert_eq!(records[0].system_prompt, "Be brief.");
    }

    #[tokio::test]
    async fn test_session_search_turns() {
        let (backend, search, orchestrator) = setup();
        let mut session = ChatSession::new(orchestrator);

        session.respond("hi", &config()).await;
        let added = session.respond("search: rust", &config()).await.to_vec();

        assert_eq!(added.len(), 2);
        assert_eq!(added[0].user, "search: rust");
        assert!(added[0].assistant.starts_with("1. About rust"));
        assert_eq!(added[1].user, AI_RESPONSE_LABEL);
        assert_eq!(added[1].assistant, "reply from openai/gpt-4o");
        assert_eq!(session.turns().len(), 3);

        // Search runs once; the results turn is not replayed to the model
        assert_eq!(*search.calls.lock().unwrap(), 1);
        let sent = &backend.calls()[1];
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0], ChatMessage::user("hi"));
        assert!(sent[2].content.starts_with("The user wants information about: rust"));
    }

    #[tokio::test]
    async fn test_session_blank_input_and_clear() {
        let (backend, _, orchestrator) = setup();
        let mut session = ChatSession::new(orchestrator);

        assert!(session.respond("   ", &config()).await.is_empty());
        assert!(backend.calls().is_empty());

        session.respond("search:", &config()).await;
        assert_eq!(
            session.turns()[0],
            Turn::new("search:", "Please provide a search query after 'search:'")
        );

        session.clear();
        assert!(session.turns().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_models() {
        let backend = Arc::new(EchoBackend {
            models: Some(vec![ModelEntry {
                name: "Live Model".to_string(),
                id: "live/model".to_string(),
            }]),
            ..EchoBackend::default()
        });
        let search = Arc::new(CountingSearch {
            calls: Mutex::new(0),
        });
        let orchestrator = Orchestrator::new(backend, search);
        let mut registry = ModelRegistry::new();

        assert_eq!(
            orchestrator.refresh_models("", &mut registry).await,
            "Please provide an API key to fetch models."
        );
        assert_eq!(
            orchestrator.refresh_models("sk", &mut registry).await,
            "Models list refreshed successfully!"
        );
        assert_eq!(registry.default_choice(), Some("Live Model"));
    }

    #[tokio::test]
    async fn test_refresh_models_failure() {
        let (_, _, orchestrator) = setup();
        let mut registry = ModelRegistry::new();
        assert_eq!(
            orchestrator.refresh_models("sk", &mut registry).await,
            "Failed to fetch models. Check your API key and connection."
        );
        assert!(!registry.has_dynamic());
    }
}
