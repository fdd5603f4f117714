//! Model API client
//!
//! [`ChatBackend`] is the seam between the chat orchestrator and the model
//! provider. [`OpenRouterClient`] speaks the OpenRouter (OpenAI-compatible)
//! `chat/completions` and `models` endpoints.

use crate::error::ChatError;
use crate::models::ModelEntry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Completions can take a while on large models
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(120);

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a completion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Trait for model providers
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send `messages` to `model` and return the reply text
    async fn complete(
        &self,
        api_key: &str,
        messages: &[ChatMessage],
        model: &str,
    ) -> Result<String, ChatError>;

    /// Models offered by the provider, in the order it lists them
    ///
    /// `None` when the list could not be retrieved.
    async fn list_models(&self, api_key: &str) -> Option<Vec<ModelEntry>>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    id: String,
    name: Option<String>,
}

/// OpenRouter-compatible API client
pub struct OpenRouterClient {
    base_url: String,
    http: reqwest::Client,
}

impl OpenRouterClient {
    /// Client for the given API base URL, normally [`DEFAULT_BASE_URL`](crate::DEFAULT_BASE_URL)
    pub fn new(base_url: impl Into<String>) -> Result<Self, ChatError> {
        let http = reqwest::Client::builder()
            .timeout(COMPLETION_TIMEOUT)
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

#[async_trait]
impl ChatBackend for OpenRouterClient {
    async fn complete(
        &self,
        api_key: &str,
        messages: &[ChatMessage],
        model: &str,
    ) -> Result<String, ChatError> {
        debug!(model, messages = messages.len(), "Requesting completion");

        let response = self
            .http
            .post(self.endpoint("chat/completions"))
            .bearer_auth(api_key)
            .json(&CompletionRequest { model, messages })
            .send()
            .await?;

        let body = response.text().await?;
        parse_completion(&body)
    }

    async fn list_models(&self, api_key: &str) -> Option<Vec<ModelEntry>> {
        let response = match self
            .http
            .get(self.endpoint("models"))
            .bearer_auth(api_key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Could not reach model list endpoint");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(status = response.status().as_u16(), "Model list request failed");
            return None;
        }

        match response.json::<ModelList>().await {
            Ok(list) => Some(
                list.data
                    .into_iter()
                    .map(|m| ModelEntry {
                        name: m.name.unwrap_or_else(|| m.id.clone()),
                        id: m.id,
                    })
                    .collect(),
            ),
            Err(e) => {
                warn!(error = %e, "Model list response was not understood");
                None
            }
        }
    }
}

/// Reply text of a completion body, or [`ChatError::Api`] with the raw body
fn parse_completion(body: &str) -> Result<String, ChatError> {
    serde_json::from_str::<CompletionResponse>(body)
        .ok()
        .and_then(|r| r.choices.into_iter().next())
        .map(|choice| choice.message.content.unwrap_or_default())
        .ok_or_else(|| ChatError::Api(body.to_string()))
}
