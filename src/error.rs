//! Error types for Chatloom
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Chatloom operations
///
/// This enum encompasses the errors that can occur while loading
/// configuration, mutating a conversation graph, persisting chats,
/// and talking to the chat proxy.
#[derive(Error, Debug)]
pub enum ChatloomError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider-related errors (HTTP status, malformed responses, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// The chat proxy answered with its error sentinel instead of content
    #[error("Proxy returned an error: {0}")]
    ProxyError(String),

    /// A vertex was created under a parent that is not in the graph
    #[error("Parent turn {0} not found")]
    UnknownParent(String),

    /// A vertex id could not be resolved
    #[error("Vertex {0} does not exist in graph")]
    UnknownVertex(String),

    /// A message id is not mapped to any vertex
    #[error("Message {0} is not part of the conversation graph")]
    UnknownMessage(String),

    /// The graph violates its tree invariants
    #[error("Graph integrity violation: {0}")]
    Integrity(String),

    /// Chat storage errors (database operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid interactive command usage
    #[error("Command error: {0}")]
    Command(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Chatloom operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation. Callers that
/// need to branch on a specific failure can `downcast_ref::<ChatloomError>()`.
pub type Result<T> = anyhow::Result<T>;
