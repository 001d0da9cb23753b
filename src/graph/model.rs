//! Data model for the conversation graph
//!
//! Plain records describing messages, vertices (turns) and the serialized
//! snapshot of a graph. Behaviour lives in [`crate::graph::engine`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ulid::Ulid;

/// Role of a message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message written by the user
    User,
    /// Reply produced by the character/model
    Assistant,
    /// Instructions injected by the application
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

/// One content part of a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessagePart {
    /// Visible text
    Text {
        /// The text content
        text: String,
    },
    /// Model reasoning trace, not part of the visible reply
    Reasoning {
        /// The reasoning content
        text: String,
    },
}

/// Token accounting reported by the model for one message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

/// Optional per-message metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    /// Model that produced the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Token usage for the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

/// A message as exchanged with the chat transport
///
/// # Examples
///
/// ```
/// use chatloom::graph::{ChatMessage, Role};
///
/// let msg = ChatMessage::user("Hello there");
/// assert_eq!(msg.role, Role::User);
/// assert_eq!(msg.text(), "Hello there");
/// assert!(!msg.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Stable message id
    pub id: String,
    /// Author role
    pub role: Role,
    /// Content parts, in order
    #[serde(default)]
    pub parts: Vec<MessagePart>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last edit timestamp, if the message was edited in place
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

impl ChatMessage {
    /// Creates a message with a fresh id and a single text part
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role,
            parts: vec![MessagePart::Text { text: text.into() }],
            created_at: Utc::now(),
            modified_at: None,
            metadata: None,
        }
    }

    /// Creates a message with a fresh id and no content parts yet
    ///
    /// Used for replies that are about to be streamed in.
    pub fn empty(role: Role) -> Self {
        Self {
            id: new_message_id(),
            role,
            parts: Vec::new(),
            created_at: Utc::now(),
            modified_at: None,
            metadata: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    /// Overrides the generated id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Concatenated text parts, ignoring reasoning
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                MessagePart::Text { text } => Some(text.as_str()),
                MessagePart::Reasoning { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// First text part, if any
    pub fn first_text(&self) -> Option<&str> {
        self.parts.iter().find_map(|part| match part {
            MessagePart::Text { text } => Some(text.as_str()),
            MessagePart::Reasoning { .. } => None,
        })
    }

    /// True when the message has no content parts at all
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Appends text to the last text part, creating one if needed
    pub fn push_text(&mut self, delta: &str) {
        if let Some(MessagePart::Text { text }) = self.parts.last_mut() {
            text.push_str(delta);
        } else {
            self.parts.push(MessagePart::Text {
                text: delta.to_string(),
            });
        }
    }

    /// Replaces the visible text, marking the message as modified
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.parts
            .retain(|part| matches!(part, MessagePart::Reasoning { .. }));
        self.parts.push(MessagePart::Text { text: text.into() });
        self.modified_at = Some(Utc::now());
    }
}

/// A single turn in the conversation graph
///
/// `messages` is the ordered batch of messages produced together; a turn has
/// at most one parent and any number of children (branches).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// Unique identifier
    pub id: String,
    /// The messages in this turn
    pub messages: Vec<ChatMessage>,
    /// Upstream turn this turn descends from, `None` for the root
    pub parent: Option<String>,
    /// Downstream turns, in creation order
    pub children: Vec<String>,
}

impl Vertex {
    pub fn new(id: impl Into<String>, parent: Option<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            id: id.into(),
            messages,
            parent,
            children: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// JSON-compatible snapshot of a whole graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    /// Chat id, also the root vertex id
    pub id: String,
    pub vertices: Vec<Vertex>,
    pub active_vertex: String,
    /// Branch child id -> last active leaf inside that branch
    #[serde(default)]
    pub active_terminal_vertices: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// Position of a vertex among its siblings (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiblingPosition {
    pub current: usize,
    pub total: usize,
}

impl Default for SiblingPosition {
    fn default() -> Self {
        Self {
            current: 1,
            total: 1,
        }
    }
}

/// Sibling chosen by a cycle step and the leaf to land on inside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiblingTarget {
    pub sibling_id: String,
    pub leaf_id: String,
}

/// Generate a new sortable id for vertices and messages
pub fn new_message_id() -> String {
    Ulid::new().to_string()
}

/// Generate a new chat id
pub fn new_chat_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
