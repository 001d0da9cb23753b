//! Command-line interface definition for Chatloom
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for interactive branching chat and chat history.

use clap::{Parser, Subcommand};

/// Chatloom - branching conversations with AI characters
///
/// Every edit or regenerated reply becomes a new branch; earlier branches
/// stay available and can be revisited at any time.
#[derive(Parser, Debug, Clone)]
#[command(name = "chatloom")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the chat history database path
    #[arg(long, env = "CHATLOOM_HISTORY_DB")]
    pub storage_path: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Chatloom
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive branching chat
    Chat {
        /// Resume an existing chat by ID (full ID or 8-char prefix)
        #[arg(short, long)]
        resume: Option<String>,

        /// Character taking part in a new chat (repeatable)
        #[arg(long = "character")]
        characters: Vec<String>,
    },

    /// Inspect and manage stored chats
    History {
        /// History subcommand
        #[command(subcommand)]
        command: HistoryCommand,
    },
}

/// Chat history subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum HistoryCommand {
    /// List stored chats, most recently updated first
    List,

    /// Print the active transcript of a chat
    Show {
        /// Chat ID (full ID or 8-char prefix)
        id: String,

        /// Verify the graph's tree invariants
        #[arg(long)]
        check: bool,
    },

    /// Print the branch tree of a chat
    Tree {
        /// Chat ID (full ID or 8-char prefix)
        id: String,
    },

    /// Delete a stored chat
    Delete {
        /// Chat ID (full ID or 8-char prefix)
        id: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            storage_path: None,
            command: Commands::History {
                command: HistoryCommand::List,
            },
        }
    }
}
