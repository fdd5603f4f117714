//! Model registry
//!
//! Maps display names to API model ids. A built-in table is always
//! available; a list fetched from the provider takes precedence once
//! loaded.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Model used when a display name is not known anywhere
pub const FALLBACK_MODEL_ID: &str = "anthropic/claude-3-opus";

/// Display name preferred as the initial selection
pub const PREFERRED_DEFAULT: &str = "Claude 3 Opus";

/// Built-in display name → id table, in menu order
pub const BUILTIN_MODELS: &[(&str, &str)] = &[
    ("O4 Mini High (Default)", "anthropic/claude-3-opus"),
    ("Claude 3 Opus", "anthropic/claude-3-opus"),
    ("Claude 3 Sonnet", "anthropic/claude-3-sonnet"),
    ("Claude 3 Haiku", "anthropic/claude-3-haiku"),
    ("Claude 2", "anthropic/claude-2"),
    ("GPT-4o", "openai/gpt-4o"),
    ("GPT-4 Turbo", "openai/gpt-4-turbo"),
    ("GPT-4", "openai/gpt-4"),
    ("GPT-3.5 Turbo", "openai/gpt-3.5-turbo"),
    ("Llama 3 70B", "meta-llama/llama-3-70b-instruct"),
    ("Llama 3 8B", "meta-llama/llama-3-8b-instruct"),
    ("Llama 2 70B", "meta-llama/llama-2-70b-chat"),
    ("Llama 2 13B", "meta-llama/llama-2-13b-chat"),
    ("Mistral Large", "mistralai/mistral-large-latest"),
    ("Mistral Medium", "mistralai/mistral-medium-latest"),
    ("Mistral Small", "mistralai/mistral-small-latest"),
    ("Gemini Pro", "google/gemini-pro"),
    ("Gemini Flash", "google/gemini-flash"),
    ("Cohere Command R", "cohere/command-r"),
    ("Cohere Command R+", "cohere/command-r-plus"),
    ("Perplexity Online", "perplexity/online"),
    ("Groq Llama 3 70B", "groq/llama3-70b-8192"),
    ("Groq Mixtral 8x7B", "groq/mixtral-8x7b-32768"),
];

/// A selectable model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Display name
    pub name: String,
    /// API model id
    pub id: String,
}

/// Where a resolved id came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSource {
    /// Provider's model list
    Dynamic,
    /// Built-in table
    Static,
    /// Name unknown; [`FALLBACK_MODEL_ID`] substituted
    Fallback,
}

/// Outcome of resolving a display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    pub id: String,
    pub source: ModelSource,
}

impl ResolvedModel {
    pub fn is_fallback(&self) -> bool {
        self.source == ModelSource::Fallback
    }
}

/// Built-in and fetched model tables
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    builtin: Vec<ModelEntry>,
    dynamic: Option<Vec<ModelEntry>>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelRegistry {
    /// Registry holding only the built-in table
    pub fn new() -> Self {
        Self {
            builtin: BUILTIN_MODELS
                .iter()
                .map(|(name, id)| ModelEntry {
                    name: name.to_string(),
                    id: id.to_string(),
                })
                .collect(),
            dynamic: None,
        }
    }

    /// Install a fetched model list; an empty list is ignored
    pub fn set_dynamic(&mut self, models: Vec<ModelEntry>) {
        if models.is_empty() {
            warn!("Provider returned an empty model list, keeping the current one");
            return;
        }
        self.dynamic = Some(models);
    }

    pub fn has_dynamic(&self) -> bool {
        self.dynamic.is_some()
    }

    /// Models offered for selection: the fetched list when present
    pub fn choices(&self) -> &[ModelEntry] {
        self.dynamic.as_deref().unwrap_or(&self.builtin)
    }

    /// Initial selection: [`PREFERRED_DEFAULT`] if offered, else the first
    pub fn default_choice(&self) -> Option<&str> {
        let choices = self.choices();
        choices
            .iter()
            .find(|m| m.name == PREFERRED_DEFAULT)
            .or_else(|| choices.first())
            .map(|m| m.name.as_str())
    }

    /// Map a display name to a model id
    ///
    /// Looks in the fetched list, then the built-in table. Unknown names
    /// resolve to [`FALLBACK_MODEL_ID`] flagged as [`ModelSource::Fallback`].
    pub fn resolve(&self, name: &str) -> ResolvedModel {
        if let Some(entry) = self
            .dynamic
            .as_deref()
            .and_then(|models| models.iter().find(|m| m.name == name))
        {
            return ResolvedModel {
                id: entry.id.clone(),
                source: ModelSource::Dynamic,
            };
        }

        if let Some(entry) = self.builtin.iter().find(|m| m.name == name) {
            return ResolvedModel {
                id: entry.id.clone(),
                source: ModelSource::Static,
            };
        }

        warn!(model = name, fallback = FALLBACK_MODEL_ID, "Unknown model, using fallback");
        ResolvedModel {
            id: FALLBACK_MODEL_ID.to_string(),
            source: ModelSource::Fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, id: &str) -> ModelEntry {
        ModelEntry {
            name: name.to_string(),
            id: id.to_string(),
        }
    }

    #[test]
    fn test_builtin_table() {
        let registry = ModelRegistry::new();
        let choices = registry.choices();
        assert_eq!(choices.len(), 23);
        assert_eq!(choices[0].name, "O4 Mini High (Default)");
        assert_eq!(choices[22].id, "groq/mixtral-8x7b-32768");
        assert_eq!(registry.default_choice(), Some("Claude 3 Opus"));
    }

    #[test]
    fn test_resolve_static() {
        let registry = ModelRegistry::new();
        let resolved = registry.resolve("GPT-4o");
        assert_eq!(resolved.id, "openai/gpt-4o");
        assert_eq!(resolved.source, ModelSource::Static);
    }

    #[test]
    fn test_resolve_unknown_is_flagged() {
        let registry = ModelRegistry::new();
        let resolved = registry.resolve("Not A Model");
        assert_eq!(resolved.id, FALLBACK_MODEL_ID);
        assert!(resolved.is_fallback());
    }

    #[test]
    fn test_dynamic_list_takes_precedence() {
        let mut registry = ModelRegistry::new();
        registry.set_dynamic(vec![
            entry("OpenAI: GPT-4o", "openai/gpt-4o"),
            entry("GPT-4", "openai/gpt-4-0613"),
        ]);

        assert!(registry.has_dynamic());
        assert_eq!(registry.choices().len(), 2);
        assert_eq!(registry.default_choice(), Some("OpenAI: GPT-4o"));

        let resolved = registry.resolve("GPT-4");
        assert_eq!(resolved.id, "openai/gpt-4-0613");
        assert_eq!(resolved.source, ModelSource::Dynamic);

        // Built-in names keep working after a refresh
        assert_eq!(registry.resolve("Claude 2").source, ModelSource::Static);
    }

    #[test]
    fn test_empty_dynamic_list_is_ignored() {
        let mut registry = ModelRegistry::new();
        registry.set_dynamic(vec![]);
        assert!(!registry.has_dynamic());
        assert_eq!(registry.choices().len(), BUILTIN_MODELS.len());
    }
}
