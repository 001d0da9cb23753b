//! Conversation graph
//!
//! This module contains the data model for branching conversations and the
//! in-memory engine that navigates and edits them.

pub mod engine;
pub mod model;

pub use engine::{ChatGraph, Divergence};
pub use model::{
    new_chat_id, new_message_id, ChatMessage, GraphSnapshot, MessageMetadata, MessagePart, Role,
    SiblingPosition, SiblingTarget, TokenUsage, Vertex,
};
