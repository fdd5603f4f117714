//! Interactive chat loop

use super::{write_flush_safe, writeln_safe};
use pagechat::chat::AI_RESPONSE_LABEL;
use pagechat::{
    ChatConfig, ChatSession, HistoryStore, ModelRegistry, OpenRouterClient, Orchestrator,
    ResolvedModel, SearchProvider, Settings, Turn,
};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

const HELP: &str = "\
Commands:
  /clear          start a new conversation
  /history        show logged conversations
  /models         list models (* marks the current one)
  /refresh        fetch the live model list
  /model <name>   switch model by display name
  /quit           leave

Messages starting with `search:` run a web search first;
messages starting with `url:` summarize the given page.";

/// One line of user input
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Empty,
    Quit,
    Help,
    Clear,
    History,
    Models,
    Refresh,
    Model(&'a str),
    Message(&'a str),
}

impl<'a> Input<'a> {
    fn parse(line: &'a str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Input::Empty;
        }

        let (command, arg) = match trimmed.split_once(char::is_whitespace) {
            Some((command, arg)) => (command, arg.trim()),
            None => (trimmed, ""),
        };

        match command {
            "/quit" | "/exit" => Input::Quit,
            "/help" => Input::Help,
            "/clear" => Input::Clear,
            "/history" => Input::History,
            "/models" => Input::Models,
            "/refresh" => Input::Refresh,
            "/model" => Input::Model(arg),
            _ => Input::Message(line),
        }
    }
}

/// Run the chat loop until `/quit` or end of input
pub async fn run(
    settings: Settings,
    db: &Path,
    search: Arc<dyn SearchProvider>,
    model: Option<String>,
) {
    let backend = match OpenRouterClient::new(&settings.base_url) {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            eprintln!("Could not create API client: {}", e);
            std::process::exit(1);
        }
    };

    let mut orchestrator = Orchestrator::new(backend, search);
    match HistoryStore::connect(db).await {
        Ok(history) => orchestrator = orchestrator.with_history(history),
        Err(e) => warn!(db = %db.display(), error = %e, "History disabled"),
    }

    let mut registry = ModelRegistry::new();
    if settings.has_api_key() {
        let status = orchestrator
            .refresh_models(&settings.api_key, &mut registry)
            .await;
        debug!(status = %status, "Initial model refresh");
    } else {
        writeln_safe("No API key configured. Set one with `pagechat settings set --api-key <KEY>`.");
    }

    let mut model_name = model
        .or_else(|| registry.default_choice().map(str::to_string))
        .unwrap_or_default();
    let mut resolved = registry.resolve(&model_name);
    writeln_safe(&model_notice(&model_name, &resolved));
    writeln_safe("Type /help for commands.");

    let mut session = ChatSession::new(orchestrator);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt();
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
        };

        match Input::parse(&line) {
            Input::Empty => {}
            Input::Quit => break,
            Input::Help => writeln_safe(HELP),
            Input::Clear => {
                session.clear();
                writeln_safe("Conversation cleared.");
            }
            Input::History => {
                let text = match session.orchestrator().history() {
                    Some(history) => history
                        .format_all()
                        .await
                        .unwrap_or_else(|e| e.to_string()),
                    None => "History is not available.".to_string(),
                };
                writeln_safe(&text);
            }
            Input::Models => writeln_safe(&list_models(&registry, &model_name)),
            Input::Refresh => {
                let status = session
                    .orchestrator()
                    .refresh_models(&settings.api_key, &mut registry)
                    .await;
                writeln_safe(&status);
                let refreshed = registry.resolve(&model_name);
                if let Some(notice) = changed_model_notice(&model_name, &resolved, &refreshed) {
                    writeln_safe(&notice);
                }
                resolved = refreshed;
            }
            Input::Model("") => writeln_safe("Usage: /model <name>"),
            Input::Model(name) => {
                model_name = name.to_string();
                resolved = registry.resolve(&model_name);
                writeln_safe(&model_notice(&model_name, &resolved));
            }
            Input::Message(message) => {
                let config = ChatConfig::from_settings(&settings, resolved.id.clone());
                let added = session.respond(message, &config).await;
                writeln_safe(&render_turns(added));
            }
        }
    }
}

fn prompt() {
    write_flush_safe("> ");
}

/// Which model is active, calling out a fallback substitution
fn model_notice(name: &str, resolved: &ResolvedModel) -> String {
    if resolved.is_fallback() {
        format!(
            "Model '{name}' is not available; using fallback {}.",
            resolved.id
        )
    } else {
        format!("Using model {name} ({}).", resolved.id)
    }
}

/// Notice for a re-resolution that changed the id or where it came from
fn changed_model_notice(
    name: &str,
    before: &ResolvedModel,
    after: &ResolvedModel,
) -> Option<String> {
    (before != after).then(|| model_notice(name, after))
}

fn list_models(registry: &ModelRegistry, current: &str) -> String {
    registry
        .choices()
        .iter()
        .map(|m| {
            let marker = if m.name == current { "*" } else { " " };
            format!("{marker} {}", m.name)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Assistant side of new turns; search results and the answer are labeled
fn render_turns(turns: &[Turn]) -> String {
    match turns {
        [results, answer] if answer.user == AI_RESPONSE_LABEL => format!(
            "[Search results]\n{}\n{AI_RESPONSE_LABEL}\n{}",
            results.assistant.trim_end(),
            answer.assistant
        ),
        _ => turns
            .iter()
            .map(|t| t.assistant.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagechat::ModelSource;

    #[test]
    fn test_parse_input() {
        assert_eq!(Input::parse("   "), Input::Empty);
        assert_eq!(Input::parse("/quit"), Input::Quit);
        assert_eq!(Input::parse("/clear "), Input::Clear);
        assert_eq!(Input::parse("/model  GPT-4o "), Input::Model("GPT-4o"));
        assert_eq!(Input::parse("/model"), Input::Model(""));
        assert_eq!(Input::parse("/model Claude 3 Opus"), Input::Model("Claude 3 Opus"));
        assert_eq!(Input::parse("search: rust"), Input::Message("search: rust"));
        assert_eq!(Input::parse("/unknown x"), Input::Message("/unknown x"));
    }

    #[test]
    fn test_model_notice() {
        let fallback = ResolvedModel {
            id: "anthropic/claude-3-opus".to_string(),
            source: ModelSource::Fallback,
        };
        assert_eq!(
            model_notice("Nope", &fallback),
            "Model 'Nope' is not available; using fallback anthropic/claude-3-opus."
        );

        let found = ResolvedModel {
            id: "openai/gpt-4o".to_string(),
            source: ModelSource::Static,
        };
        assert_eq!(model_notice("GPT-4o", &found), "Using model GPT-4o (openai/gpt-4o).");
    }

    #[test]
    fn test_refresh_reports_changed_resolution() {
        let static_gpt = ResolvedModel {
            id: "openai/gpt-4".to_string(),
            source: ModelSource::Static,
        };
        assert_eq!(changed_model_notice("GPT-4", &static_gpt, &static_gpt), None);

        let fallback = ResolvedModel {
            id: "anthropic/claude-3-opus".to_string(),
            source: ModelSource::Fallback,
        };
        assert_eq!(
            changed_model_notice("GPT-4", &static_gpt, &fallback).as_deref(),
            Some("Model 'GPT-4' is not available; using fallback anthropic/claude-3-opus.")
        );

        let dynamic = ResolvedModel {
            id: "openai/gpt-4-0613".to_string(),
            source: ModelSource::Dynamic,
        };
        assert_eq!(
            changed_model_notice("GPT-4", &static_gpt, &dynamic).as_deref(),
            Some("Using model GPT-4 (openai/gpt-4-0613).")
        );
    }

    #[test]
    fn test_list_models_marks_current() {
        let output = list_models(&ModelRegistry::new(), "GPT-4");
        assert!(output.contains("* GPT-4\n"));
        assert!(output.contains("  GPT-4o\n"));
    }

    #[test]
    fn test_render_turns() {
        let plain = vec![Turn::new("hi", "hello")];
        assert_eq!(render_turns(&plain), "hello");

        let search = vec![
            Turn::new("search: rust", "1. Rust\n   URL: u\n   s\n\n"),
            Turn::new(AI_RESPONSE_LABEL, "Rust is a language."),
        ];
        assert_eq!(
            render_turns(&search),
            "[Search results]\n1. Rust\n   URL: u\n   s\n[AI Response]\nRust is a language."
        );
    }
}
