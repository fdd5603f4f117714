//! Conversation log in SQLite

use crate::error::HistoryError;
use chrono::Local;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::{debug, info};

/// Default database file, relative to the working directory
pub const DEFAULT_DB_PATH: &str = "chat_history.db";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS conversations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT,
    user_message TEXT,
    assistant_message TEXT,
    model TEXT,
    system_prompt TEXT
)
"#;

/// One logged exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationRecord {
    pub id: i64,
    /// Local time, `YYYY-MM-DD HH:MM:SS`
    pub timestamp: String,
    pub user_message: String,
    pub assistant_message: String,
    pub model: String,
    pub system_prompt: String,
}

/// Handle to the conversation database
#[derive(Debug, Clone)]
pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
    /// Open (creating if needed) the database at `path` and ensure the table exists
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, HistoryError> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init().await?;
        info!(path = %path.as_ref().display(), "Opened conversation history");
        Ok(store)
    }

    /// Private in-memory database, gone when the store is dropped
    pub async fn in_memory() -> Result<Self, HistoryError> {
        let options = SqliteConnectOptions::new().in_memory(true);
        // A second connection would see a different, empty database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    /// Create the `conversations` table if it does not exist
    pub async fn init(&self) -> Result<(), HistoryError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    /// Log an exchange stamped with the current local time; returns the row id
    pub async fn save(
        &self,
        user_message: &str,
        assistant_message: &str,
        model: &str,
        system_prompt: &str,
    ) -> Result<i64, HistoryError> {
        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();

        let result = sqlx::query(
            "INSERT INTO conversations (timestamp, user_message, assistant_message, model, system_prompt) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&timestamp)
        .bind(user_message)
        .bind(assistant_message)
        .bind(model)
        .bind(system_prompt)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!(id, model, "Saved conversation");
        Ok(id)
    }

    /// Every logged exchange, most recent first
    pub async fn all_newest_first(&self) -> Result<Vec<ConversationRecord>, HistoryError> {
        let rows = sqlx::query(
            "SELECT id, timestamp, user_message, assistant_message, model, system_prompt \
             FROM conversations ORDER BY id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<ConversationRecord, HistoryError> {
                Ok(ConversationRecord {
                    id: row.try_get("id")?,
                    timestamp: text_column(row, "timestamp")?,
                    user_message: text_column(row, "user_message")?,
                    assistant_message: text_column(row, "assistant_message")?,
                    model: text_column(row, "model")?,
                    system_prompt: text_column(row, "system_prompt")?,
                })
            })
            .collect()
    }

    /// Transcript of every exchange, most recent first
    pub async fn format_all(&self) -> Result<String, HistoryError> {
        let records = self.all_newest_first().await?;
        Ok(format_records(&records))
    }
}

/// NULL reads as an empty string
fn text_column(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<String, sqlx::Error> {
    Ok(row
        .try_get::<Option<String>, _>(column)?
        .unwrap_or_default())
}

/// `User:`/`Assistant:` pairs, each closed by a dashed rule
pub fn format_records(records: &[ConversationRecord]) -> String {
    if records.is_empty() {
        return "No previous conversations.".to_string();
    }

    let rule = "-".repeat(30);
    records
        .iter()
        .map(|r| {
            format!(
                "User: {}\nAssistant: {}\n{rule}",
                r.user_message, r.assistant_message
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
