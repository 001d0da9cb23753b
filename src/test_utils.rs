//! Test utilities for Chatloom
//!
//! Temporary storage, graph builders and assertion helpers shared by the
//! unit tests.

use crate::config::Config;
use crate::graph::{ChatGraph, ChatMessage};
use crate::storage::SqliteStorage;
use tempfile::TempDir;

/// Create a temporary directory for testing
///
/// Cleaned up when dropped.
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Create SQLite storage inside a fresh temporary directory
///
/// Keep the returned `TempDir` alive for as long as the storage is used.
pub fn temp_storage() -> (SqliteStorage, TempDir) {
    let dir = temp_dir();
    let storage = SqliteStorage::new_with_path(dir.path().join("chats.db"))
        .expect("Failed to create test storage");
    (storage, dir)
}

/// Build a graph whose active path is one vertex per text, alternating
/// user and assistant messages
///
/// Returns the graph and the created vertex ids in order.
pub fn linear_graph(id: &str, texts: &[&str]) -> (ChatGraph, Vec<String>) {
    let mut graph = ChatGraph::with_id(id);
    let mut parent = id.to_string();
    let mut created = Vec::with_capacity(texts.len());

    for (index, text) in texts.iter().enumerate() {
        let message = if index % 2 == 0 {
            ChatMessage::user(*text)
        } else {
            ChatMessage::assistant(*text)
        };
        parent = graph
            .create_vertex(&parent, vec![message])
            .expect("Failed to create test vertex");
        created.push(parent.clone());
    }

    (graph, created)
}

/// Assert that an error contains the expected message
///
/// # Panics
///
/// Panics if the result is Ok or if the error doesn't contain the expected message
pub fn assert_error_contains<T>(result: crate::error::Result<T>, expected: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{}' but got Ok", expected),
        Err(e) => {
            let error_msg = e.to_string();
            assert!(
                error_msg.contains(expected),
                "Error message '{}' does not contain '{}'",
                error_msg,
                expected
            );
        }
    }
}

/// Create a test configuration with default values
pub fn test_config() -> Config {
    Config::default()
}

/// Create a test configuration YAML string
pub fn test_config_yaml() -> String {
    r#"
provider:
  base_url: http://127.0.0.1:5173
  model: storyteller
  timeout_seconds: 30

storage:
  history_db: /tmp/chatloom-test.db

title:
  enabled: true
  timeout_seconds: 5
  min_messages: 2

chat:
  character_ids: [narrator]
  greeting: Welcome, traveler.
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatloomError;

    #[test]
    fn test_temp_storage_creates_database() {
        let (storage, dir) = temp_storage();
        assert!(storage.db_path().starts_with(dir.path()));
        assert!(storage.db_path().exists());
    }

    #[test]
    fn test_linear_graph() {
        let (graph, ids) = linear_graph("chat", &["hi", "hello", "how are you?"]);
        assert_eq!(ids.len(), 3);
        assert_eq!(graph.active_vertex(), ids[2]);
        let texts: Vec<String> = graph.flatten().iter().map(|m| m.text()).collect();
        assert_eq!(texts, vec!["hi", "hello", "how are you?"]);
        graph.check_integrity().unwrap();
    }

    #[test]
    fn test_assert_error_contains_success() {
        let result: crate::error::Result<()> =
            Err(ChatloomError::Config("test error message".to_string()).into());
        assert_error_contains(result, "test error");
    }

    #[test]
    #[should_panic(expected = "Expected error containing")]
    fn test_assert_error_contains_ok() {
        assert_error_contains(Ok(()), "error");
    }

    #[test]
    #[should_panic(expected = "does not contain")]
    fn test_assert_error_contains_wrong_message() {
        let result: crate::error::Result<()> =
            Err(ChatloomError::Config("different error".to_string()).into());
        assert_error_contains(result, "not present");
    }

    #[test]
    fn test_test_config_yaml() {
        let config: Config = serde_yaml::from_str(&test_config_yaml()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.chat.character_ids, vec!["narrator".to_string()]);
        assert_eq!(config.chat.greeting.as_deref(), Some("Welcome, traveler."));
        assert!(test_config().validate().is_ok());
    }
}
