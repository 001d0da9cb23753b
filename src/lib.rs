//! Chatloom - branching conversation graphs for AI chat
//!
//! Every chat is a tree of turns. Editing or regenerating a message adds a
//! sibling branch instead of overwriting history, and the visible transcript
//! is the path from the root to the active turn.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `graph`: Conversation graph engine and message model
//! - `sync`: Keeps a linear transport and the graph in step, with titles
//! - `transport`: Linear message list and request status
//! - `storage`: Chat persistence (SQLite and in-memory)
//! - `providers`: Completion provider abstraction and the chat proxy client
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli` / `commands`: Command-line interface and handlers
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use chatloom::graph::ChatMessage;
//! use chatloom::storage::MemoryStore;
//! use chatloom::sync::GraphSyncManager;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(MemoryStore::new());
//!     let mut chat = GraphSyncManager::open("demo", store, None).await?;
//!
//!     let question = ChatMessage::user("Where does this road lead?");
//!     let answer = ChatMessage::assistant("North.");
//!     chat.commit(&[question.clone(), answer.clone()]).await?;
//!
//!     // Regenerate the reply on a new branch
//!     let branch_point = chat.branch_point_for_message(&answer.id).unwrap();
//!     chat.set_branch_point(&branch_point);
//!     let retry = ChatMessage::assistant("To the sea.");
//!     chat.commit(&[question, retry.clone()]).await?;
//!
//!     assert_eq!(chat.get_sibling_count(&retry.id).total, 2);
//!     assert_eq!(chat.initial_messages()[1].text(), "To the sea.");
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod graph;
pub mod providers;
pub mod storage;
pub mod sync;
pub mod transport;

// Re-export commonly used types
pub use config::Config;
pub use error::{ChatloomError, Result};
pub use graph::{ChatGraph, ChatMessage};
pub use sync::GraphSyncManager;

#[cfg(test)]
pub mod test_utils;
