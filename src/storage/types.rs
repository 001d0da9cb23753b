use crate::graph::GraphSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted chat: its graph snapshot plus chat-level metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRecord {
    /// Graph snapshot; `snapshot.id` is the chat id
    pub snapshot: GraphSnapshot,
    /// Characters taking part in the chat
    pub character_ids: Vec<String>,
    /// Generated or user-assigned title
    pub title: Option<String>,
    /// When the chat was first saved
    pub created_at: DateTime<Utc>,
    /// When the chat was last saved
    pub updated_at: DateTime<Utc>,
}

impl ChatRecord {
    /// Create a record stamped with the current time
    pub fn new(snapshot: GraphSnapshot, character_ids: Vec<String>, title: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            snapshot,
            character_ids,
            title,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.snapshot.id
    }
}

/// Summary row for a stored chat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChat {
    /// Unique identifier for the chat
    pub id: String,
    /// Title, if one was generated yet
    pub title: Option<String>,
    /// Characters taking part in the chat
    pub character_ids: Vec<String>,
    /// When the chat was created
    pub created_at: DateTime<Utc>,
    /// When the chat was last updated
    pub updated_at: DateTime<Utc>,
    /// Number of turns in the graph, root included
    pub vertex_count: usize,
    /// Number of messages across all branches
    pub message_count: usize,
}

impl StoredChat {
    /// Summarize a full record
    pub fn from_record(record: &ChatRecord) -> Self {
        Self {
            id: record.snapshot.id.clone(),
            title: record.title.clone(),
            character_ids: record.character_ids.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
            vertex_count: record.snapshot.vertices.len(),
            message_count: record
                .snapshot
                .vertices
                .iter()
                .map(|vertex| vertex.messages.len())
                .sum(),
        }
    }
}
