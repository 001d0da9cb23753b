//! Chat persistence
//!
//! [`ChatStore`] is the seam the sync adapter saves through.
//! [`SqliteStorage`] keeps chats in a local SQLite file and
//! [`MemoryStore`] keeps them in process memory.

use crate::error::{ChatloomError, Result};
use crate::graph::GraphSnapshot;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

pub mod memory;
pub mod types;
pub use memory::MemoryStore;
pub use types::{ChatRecord, StoredChat};

/// Loads and saves chat records keyed by chat id
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Load a chat, `None` if it was never saved
    async fn load(&self, id: &str) -> Result<Option<ChatRecord>>;

    /// Insert or update a chat
    ///
    /// Implementations keep the original `created_at` and keep the stored
    /// title when `record.title` is `None`.
    async fn save(&self, record: &ChatRecord) -> Result<()>;

    /// List chats, most recently updated first
    async fn list(&self) -> Result<Vec<StoredChat>>;

    /// Delete a chat; deleting a missing chat is not an error
    async fn delete(&self, id: &str) -> Result<()>;
}

/// Storage backend for chat history
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    db_path: PathBuf,
}

impl SqliteStorage {
    /// Create a new storage instance
    ///
    /// Initializes the database file in the user's data directory.
    pub fn new() -> Result<Self> {
        if let Ok(override_path) = std::env::var("CHATLOOM_HISTORY_DB") {
            return Self::new_with_path(override_path);
        }

        let proj_dirs = ProjectDirs::from("com", "chatloom", "chatloom")
            .ok_or_else(|| ChatloomError::Storage("Could not determine data directory".into()))?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .context("Failed to create data directory")
            .map_err(|e| ChatloomError::Storage(e.to_string()))?;

        let storage = Self {
            db_path: data_dir.join("chats.db"),
        };
        storage.init()?;

        Ok(storage)
    }

    /// Create a new storage instance that uses the specified database path.
    ///
    /// # Examples
    ///
    /// ```
    /// use chatloom::storage::SqliteStorage;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let storage = SqliteStorage::new_with_path(dir.path().join("chats.db")).unwrap();
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(|e| ChatloomError::Storage(e.to_string()))?;
        }

        let storage = Self { db_path };
        storage.init()?;
        Ok(storage)
    }

    /// Open the configured database, falling back to the default location
    pub fn open(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::new_with_path(path),
            None => Self::new(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        Connection::open(&self.db_path)
            .context("Failed to open database")
            .map_err(|e| ChatloomError::Storage(e.to_string()).into())
    }

    /// Initialize the database schema
    fn init(&self) -> Result<()> {
        let conn = self.connect()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS chats (
                id TEXT PRIMARY KEY,
                title TEXT,
                character_ids JSON NOT NULL,
                graph JSON NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create tables")
        .map_err(|e| ChatloomError::Storage(e.to_string()))?;

        Ok(())
    }

    /// Save or update a chat
    pub fn save_chat(&self, record: &ChatRecord) -> Result<()> {
        let mut conn = self.connect()?;

        let graph_json = serde_json::to_string(&record.snapshot)
            .context("Failed to serialize graph")
            .map_err(|e| ChatloomError::Storage(e.to_string()))?;
        let characters_json = serde_json::to_string(&record.character_ids)
            .context("Failed to serialize character ids")
            .map_err(|e| ChatloomError::Storage(e.to_string()))?;

        let now = Utc::now().to_rfc3339();

        let tx = conn
            .transaction()
            .context("Failed to start transaction")
            .map_err(|e| ChatloomError::Storage(e.to_string()))?;

        let exists = tx
            .query_row(
                "SELECT 1 FROM chats WHERE id = ?",
                params![record.id()],
                |_| Ok(true),
            )
            .optional()
            .context("Failed to check for existing chat")
            .map_err(|e| ChatloomError::Storage(e.to_string()))?
            .unwrap_or(false);

        if exists {
            tx.execute(
                "UPDATE chats SET
                    title = COALESCE(?, title),
                    character_ids = ?,
                    graph = ?,
                    updated_at = ?
                WHERE id = ?",
                params![
                    record.title,
                    characters_json,
                    graph_json,
                    now,
                    record.id()
                ],
            )
            .context("Failed to update chat")
            .map_err(|e| ChatloomError::Storage(e.to_string()))?;
        } else {
            tx.execute(
                "INSERT INTO chats (id, title, character_ids, graph, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    record.id(),
                    record.title,
                    characters_json,
                    graph_json,
                    record.created_at.to_rfc3339(),
                    now
                ],
            )
            .context("Failed to insert chat")
            .map_err(|e| ChatloomError::Storage(e.to_string()))?;
        }

        tx.commit()
            .context("Failed to commit transaction")
            .map_err(|e| ChatloomError::Storage(e.to_string()))?;

        tracing::debug!("Saved chat {}", record.id());
        Ok(())
    }

    /// Load a chat by ID
    ///
    /// An exact id match wins; otherwise `id` is used as a prefix and the most
    /// recently updated match is returned.
    pub fn load_chat(&self, id: &str) -> Result<Option<ChatRecord>> {
        let conn = self.connect()?;

        let Some(chat_id) = resolve_id(&conn, id)? else {
            return Ok(None);
        };

        let row = conn
            .query_row(
                "SELECT title, character_ids, graph, created_at, updated_at
                FROM chats WHERE id = ?",
                params![chat_id],
                |row| {
                    let title: Option<String> = row.get(0)?;
                    let characters_json: String = row.get(1)?;
                    let graph_json: String = row.get(2)?;
                    let created_at: String = row.get(3)?;
                    let updated_at: String = row.get(4)?;
                    Ok((title, characters_json, graph_json, created_at, updated_at))
                },
            )
            .optional()
            .context("Failed to query chat")
            .map_err(|e| ChatloomError::Storage(e.to_string()))?;

        let Some((title, characters_json, graph_json, created_at, updated_at)) = row else {
            return Ok(None);
        };

        let snapshot: GraphSnapshot = serde_json::from_str(&graph_json)
            .context("Failed to deserialize graph")
            .map_err(|e| ChatloomError::Storage(e.to_string()))?;
        let character_ids: Vec<String> = serde_json::from_str(&characters_json)
            .context("Failed to deserialize character ids")
            .map_err(|e| ChatloomError::Storage(e.to_string()))?;

        Ok(Some(ChatRecord {
            snapshot,
            character_ids,
            title,
            created_at: parse_timestamp(&created_at),
            updated_at: parse_timestamp(&updated_at),
        }))
    }

    /// List all stored chats
    pub fn list_chats(&self) -> Result<Vec<StoredChat>> {
        let conn = self.connect()?;

        let mut stmt = conn
            .prepare(
                "SELECT id, title, character_ids, graph, created_at, updated_at
                FROM chats
                ORDER BY updated_at DESC",
            )
            .context("Failed to prepare statement")
            .map_err(|e| ChatloomError::Storage(e.to_string()))?;

        let chats_iter = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let title: Option<String> = row.get(1)?;
                let characters_json: String = row.get(2)?;
                let graph_json: String = row.get(3)?;
                let created_at: String = row.get(4)?;
                let updated_at: String = row.get(5)?;

                let character_ids: Vec<String> =
                    serde_json::from_str(&characters_json).unwrap_or_default();

                // Count from the raw JSON; message bodies are not needed here
                let (vertex_count, message_count) =
                    match serde_json::from_str::<serde_json::Value>(&graph_json) {
                        Ok(value) => {
                            let vertices = value["vertices"].as_array();
                            (
                                vertices.map(|v| v.len()).unwrap_or(0),
                                vertices
                                    .map(|v| {
                                        v.iter()
                                            .map(|vertex| {
                                                vertex["messages"]
                                                    .as_array()
                                                    .map(|m| m.len())
                                                    .unwrap_or(0)
                                            })
                                            .sum()
                                    })
                                    .unwrap_or(0),
                            )
                        }
                        Err(_) => (0, 0),
                    };

                Ok(StoredChat {
                    id,
                    title,
                    character_ids,
                    created_at: parse_timestamp(&created_at),
                    updated_at: parse_timestamp(&updated_at),
                    vertex_count,
                    message_count,
                })
            })
            .context("Failed to query chats")
            .map_err(|e| ChatloomError::Storage(e.to_string()))?;

        Ok(chats_iter.flatten().collect())
    }

    /// Delete a chat by ID or prefix
    ///
    /// The id is resolved like [`load_chat`](Self::load_chat), so at most one
    /// chat is removed.
    pub fn delete_chat(&self, id: &str) -> Result<()> {
        let conn = self.connect()?;

        let Some(chat_id) = resolve_id(&conn, id)? else {
            tracing::debug!("No chat matches {}; nothing to delete", id);
            return Ok(());
        };

        conn.execute("DELETE FROM chats WHERE id = ?", params![chat_id])
            .context("Failed to delete chat")
            .map_err(|e| ChatloomError::Storage(e.to_string()))?;

        tracing::debug!("Deleted chat {}", chat_id);
        Ok(())
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(SqliteStorage) -> Result<T> + Send + 'static,
    {
        let storage = self.clone();
        tokio::task::spawn_blocking(move || op(storage))
            .await
            .map_err(|e| ChatloomError::Storage(format!("Storage task failed: {}", e)))?
    }
}

/// Exact id if stored, else the most recently updated id starting with `id`
fn resolve_id(conn: &Connection, id: &str) -> Result<Option<String>> {
    let exact = conn
        .query_row("SELECT id FROM chats WHERE id = ?", params![id], |row| {
            row.get::<_, String>(0)
        })
        .optional()
        .context("Failed to query chat")
        .map_err(|e| ChatloomError::Storage(e.to_string()))?;
    if exact.is_some() {
        return Ok(exact);
    }

    conn.query_row(
        "SELECT id FROM chats WHERE id LIKE ? ESCAPE '\\'
        ORDER BY updated_at DESC LIMIT 1",
        params![format!("{}%", escape_like(id))],
        |row| row.get::<_, String>(0),
    )
    .optional()
    .context("Failed to query chat by prefix")
    .map_err(|e| ChatloomError::Storage(e.to_string()).into())
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl ChatStore for SqliteStorage {
    async fn load(&self, id: &str) -> Result<Option<ChatRecord>> {
        let id = id.to_string();
        self.blocking(move |storage| storage.load_chat(&id)).await
    }

    async fn save(&self, record: &ChatRecord) -> Result<()> {
        let record = record.clone();
        self.blocking(move |storage| storage.save_chat(&record))
            .await
    }

    async fn list(&self) -> Result<Vec<StoredChat>> {
        self.blocking(|storage| storage.list_chats()).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.blocking(move |storage| storage.delete_chat(&id)).await
    }
}
