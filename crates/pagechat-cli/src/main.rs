//! PageChat CLI - chat with OpenRouter models from the terminal

mod repl;

use clap::{Parser, Subcommand, ValueEnum};
use pagechat::history::DEFAULT_DB_PATH;
use pagechat::search::DEFAULT_NUM_RESULTS;
use pagechat::settings::DEFAULT_SETTINGS_PATH;
use pagechat::{
    fetch_page, web_search, ChatBackend, DuckDuckGoProvider, ExtractedPage, FetchOptions,
    HistoryStore, ModelRegistry, OpenRouterClient, SearchProvider, Settings, WikipediaProvider,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Output format for the fetch subcommand
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    /// Plain-text artifact
    #[default]
    Text,
    /// JSON object with title, url and body
    Json,
}

/// Search backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum Provider {
    #[default]
    Duckduckgo,
    Wikipedia,
}

impl Provider {
    fn build(self) -> Arc<dyn SearchProvider> {
        match self {
            Provider::Duckduckgo => Arc::new(DuckDuckGoProvider::new()),
            Provider::Wikipedia => Arc::new(WikipediaProvider::new()),
        }
    }
}

/// PageChat - chat with OpenRouter models, with web search and page fetching
#[derive(Parser, Debug)]
#[command(name = "pagechat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Settings file
    #[arg(long, global = true, default_value = DEFAULT_SETTINGS_PATH)]
    settings: PathBuf,

    /// Conversation history database
    #[arg(long, global = true, default_value = DEFAULT_DB_PATH)]
    db: PathBuf,

    /// Search provider for `search:` messages and the search subcommand
    #[arg(long, global = true, value_enum, default_value_t = Provider::Duckduckgo)]
    provider: Provider,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive chat session
    Chat {
        /// Model display name (see `pagechat models`)
        #[arg(long, short)]
        model: Option<String>,
    },
    /// Fetch a webpage and print its extracted text
    Fetch {
        /// URL to fetch; https:// is assumed when no scheme is given
        url: String,

        /// Output format
        #[arg(long, short, default_value = "text")]
        output: OutputFormat,

        /// Custom User-Agent
        #[arg(long)]
        user_agent: Option<String>,

        /// Character cap on the output
        #[arg(long, default_value_t = pagechat::DEFAULT_MAX_CHARS)]
        max_chars: usize,
    },
    /// Search the web and print formatted results
    Search {
        /// Search query
        #[arg(required = true)]
        query: Vec<String>,

        /// Number of results
        #[arg(long, short, default_value_t = DEFAULT_NUM_RESULTS)]
        num_results: usize,
    },
    /// List available models
    Models {
        /// Fetch the live list from the API instead of the built-in one
        #[arg(long)]
        refresh: bool,
    },
    /// Print logged conversations, newest first
    History,
    /// Create the history database
    InitDb,
    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Print current settings (API key masked)
    Show,
    /// Update settings; omitted fields keep their value
    Set {
        #[arg(long)]
        api_key: Option<String>,

        #[arg(long)]
        base_url: Option<String>,

        #[arg(long)]
        system_prompt: Option<String>,

        /// Enable `search:` and `url:` commands
        #[arg(long)]
        web_search: Option<bool>,
    },
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Chat { model }) => {
            let settings = Settings::load(&cli.settings).with_env_overrides();
            repl::run(settings, &cli.db, cli.provider.build(), model).await;
        }
        Some(Commands::Fetch {
            url,
            output,
            user_agent,
            max_chars,
        }) => {
            let options = FetchOptions {
                user_agent,
                max_chars,
                ..FetchOptions::default()
            };
            run_fetch(&url, output, &options).await;
        }
        Some(Commands::Search { query, num_results }) => {
            let provider = cli.provider.build();
            let text = web_search(provider.as_ref(), &query.join(" "), num_results).await;
            writeln_safe(text.trim_end());
        }
        Some(Commands::Models { refresh }) => {
            let settings = Settings::load(&cli.settings).with_env_overrides();
            run_models(&settings, refresh).await;
        }
        Some(Commands::History) => match HistoryStore::connect(&cli.db).await {
            Ok(store) => match store.format_all().await {
                Ok(text) => writeln_safe(&text),
                Err(e) => fail(&e),
            },
            Err(e) => fail(&e),
        },
        Some(Commands::InitDb) => match HistoryStore::connect(&cli.db).await {
            Ok(_) => writeln_safe(&format!("Database initialized at {}", cli.db.display())),
            Err(e) => fail(&e),
        },
        Some(Commands::Settings { action }) => run_settings(&cli.settings, action),
        None => {
            eprintln!("Usage: pagechat chat");
            eprintln!("   or: pagechat fetch <URL>");
            eprintln!("   or: pagechat search <QUERY>");
            eprintln!("   or: pagechat --help");
            std::process::exit(1);
        }
    }
}

/// Log to stderr; `RUST_LOG` overrides the default `warn` level
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run_fetch(url: &str, output: OutputFormat, options: &FetchOptions) {
    match fetch_page(url, options).await {
        Ok(page) => writeln_safe(&format_page(&page, output, options.max_chars)),
        Err(e) => fail(&e),
    }
}

fn format_page(page: &ExtractedPage, output: OutputFormat, max_chars: usize) -> String {
    match output {
        OutputFormat::Text => page.artifact(max_chars),
        OutputFormat::Json => serde_json::to_string_pretty(page).unwrap_or_else(|e| {
            eprintln!("Error serializing page: {}", e);
            std::process::exit(1);
        }),
    }
}

async fn run_models(settings: &Settings, refresh: bool) {
    let mut registry = ModelRegistry::new();

    if refresh {
        if !settings.has_api_key() {
            eprintln!("Please provide an API key to fetch models.");
            std::process::exit(1);
        }
        let client = match OpenRouterClient::new(&settings.base_url) {
            Ok(client) => client,
            Err(e) => fail(&e),
        };
        match client.list_models(&settings.api_key).await {
            Some(models) => registry.set_dynamic(models),
            None => {
                eprintln!("Failed to fetch models. Check your API key and connection.");
                std::process::exit(1);
            }
        }
    }

    writeln_safe(&format_models(&registry));
}

fn format_models(registry: &ModelRegistry) -> String {
    let default = registry.default_choice();
    registry
        .choices()
        .iter()
        .map(|m| {
            let marker = if Some(m.name.as_str()) == default { "*" } else { " " };
            format!("{marker} {}  ({})", m.name, m.id)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn run_settings(path: &Path, action: SettingsAction) {
    match action {
        SettingsAction::Show => {
            let settings = Settings::load(path).with_env_overrides();
            writeln_safe(&format_settings(&settings));
        }
        SettingsAction::Set {
            api_key,
            base_url,
            system_prompt,
            web_search,
        } => {
            let mut settings = Settings::load(path);
            if let Some(key) = api_key {
                settings.api_key = key;
            }
            if let Some(url) = base_url {
                settings.base_url = url;
            }
            if let Some(prompt) = system_prompt {
                settings.system_prompt = prompt;
            }
            if let Some(enabled) = web_search {
                settings.enable_web_search = enabled;
            }
            writeln_safe(&settings.save_message(path));
        }
    }
}

fn format_settings(settings: &Settings) -> String {
    let masked = Settings {
        api_key: mask_key(&settings.api_key),
        ..settings.clone()
    };
    serde_json::to_string_pretty(&masked).unwrap_or_else(|e| format!("Error: {e}"))
}

/// Keep the last four characters of a key visible
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{visible}", "*".repeat(chars.len() - 4))
}

fn fail(e: &dyn std::fmt::Display) -> ! {
    eprintln!("{}", e);
    std::process::exit(1);
}

/// Write to stdout, exit silently on broken pipe
fn writeln_safe(s: &str) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{}", s) {
        exit_on_write_error(e);
    }
}

/// Write without a newline and flush, for prompts
fn write_flush_safe(s: &str) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = write!(handle, "{}", s).and_then(|()| handle.flush()) {
        exit_on_write_error(e);
    }
}

fn exit_on_write_error(e: io::Error) -> ! {
    if e.kind() == io::ErrorKind::BrokenPipe {
        std::process::exit(0);
    }
    eprintln!("Error writing to stdout: {}", e);
    std::process::exit(1);
}
