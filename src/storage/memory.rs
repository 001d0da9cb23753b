use super::{ChatRecord, ChatStore, StoredChat};
use crate::error::{ChatloomError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Process-local chat store
///
/// Applies the same save rules as [`super::SqliteStorage`]: the first
/// `created_at` wins and a `None` title keeps the stored one.
#[derive(Debug, Default)]
pub struct MemoryStore {
    chats: Mutex<HashMap<String, ChatRecord>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful saves served so far
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, ChatRecord>>> {
        self.chats
            .lock()
            .map_err(|_| ChatloomError::Storage("Chat store lock poisoned".to_string()).into())
    }

    fn resolve(chats: &HashMap<String, ChatRecord>, id: &str) -> Option<String> {
        if chats.contains_key(id) {
            return Some(id.to_string());
        }
        let mut matches: Vec<&ChatRecord> = chats
            .values()
            .filter(|record| record.id().starts_with(id))
            .collect();
        matches.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        matches.first().map(|record| record.id().to_string())
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn load(&self, id: &str) -> Result<Option<ChatRecord>> {
        let chats = self.lock()?;
        Ok(Self::resolve(&chats, id).and_then(|key| chats.get(&key).cloned()))
    }

    async fn save(&self, record: &ChatRecord) -> Result<()> {
        let mut chats = self.lock()?;
        let mut stored = record.clone();
        stored.updated_at = Utc::now();
        if let Some(existing) = chats.get(record.id()) {
            stored.created_at = existing.created_at;
            if stored.title.is_none() {
                stored.title = existing.title.clone();
            }
        }
        chats.insert(record.id().to_string(), stored);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<StoredChat>> {
        let chats = self.lock()?;
        let mut listed: Vec<StoredChat> = chats.values().map(StoredChat::from_record).collect();
        listed.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(listed)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut chats = self.lock()?;
        if let Some(key) = Self::resolve(&chats, id) {
            chats.remove(&key);
        }
        Ok(())
    }
}
