//! Sync layer between the linear transport and the conversation graph

pub mod adapter;
pub mod cache;
pub mod title;

pub use adapter::{CommitOutcome, GraphSyncManager};
pub use cache::SiblingCache;
pub use title::{build_title_prompt, sanitize_title, TitleGenerator, TitleState};
