//! Graph sync manager
//!
//! Bridges a linear transport (the message list the user sees) and the
//! branching [`ChatGraph`]. The manager turns newly appended messages into
//! vertices, serves sibling navigation, and persists after every structural
//! change.

use crate::error::{ChatloomError, Result};
use crate::graph::{new_chat_id, ChatGraph, ChatMessage, SiblingPosition};
use crate::storage::{ChatRecord, ChatStore};
use crate::sync::cache::SiblingCache;
use crate::sync::title::{TitleGenerator, TitleState};
use crate::transport::{ChatTransport, TransportStatus};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Result of a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Nothing new to record; nothing was persisted
    Unchanged,
    /// The graph was updated and persisted
    Committed {
        /// Ids of the vertices created, in order
        created: Vec<String>,
    },
}

impl CommitOutcome {
    pub fn created(&self) -> &[String] {
        match self {
            CommitOutcome::Unchanged => &[],
            CommitOutcome::Committed { created } => created,
        }
    }

    pub fn is_unchanged(&self) -> bool {
        matches!(self, CommitOutcome::Unchanged)
    }
}

/// Keeps one chat's graph in step with its transport and its store
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use chatloom::graph::ChatMessage;
/// use chatloom::storage::MemoryStore;
/// use chatloom::sync::GraphSyncManager;
///
/// # #[tokio::main]
/// # async fn main() -> chatloom::error::Result<()> {
/// let store = Arc::new(MemoryStore::new());
/// let mut manager = GraphSyncManager::open("chat-1", store, None).await?;
///
/// let messages = vec![ChatMessage::user("Hi"), ChatMessage::assistant("Hello!")];
/// manager.commit(&messages).await?;
/// assert!(manager.commit(&messages).await?.is_unchanged());
/// assert_eq!(manager.initial_messages(), messages);
/// # Ok(())
/// # }
/// ```
pub struct GraphSyncManager {
    graph: ChatGraph,
    store: Arc<dyn ChatStore>,
    titler: Option<TitleGenerator>,
    vertex_map: HashMap<String, String>,
    character_ids: Vec<String>,
    title: Option<String>,
    title_state: TitleState,
    working_vertex: Option<String>,
    pending_messages: Option<Vec<ChatMessage>>,
    sibling_cache: SiblingCache,
    created_at: DateTime<Utc>,
}

impl std::fmt::Debug for GraphSyncManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphSyncManager")
            .field("id", &self.graph.id())
            .field("vertices", &self.graph.vertex_count())
            .field("title", &self.title)
            .field("title_state", &self.title_state)
            .field("working_vertex", &self.working_vertex)
            .finish()
    }
}

impl GraphSyncManager {
    /// Loads a chat, or starts an empty graph under `id` if none is stored
    ///
    /// `id` may be a stored chat's id prefix when the store supports it.
    ///
    /// # Errors
    ///
    /// Returns the store's error if loading fails
    pub async fn open(
        id: &str,
        store: Arc<dyn ChatStore>,
        titler: Option<TitleGenerator>,
    ) -> Result<Self> {
        match store.load(id).await? {
            Some(record) => {
                tracing::info!(
                    "Loaded chat {} ({} vertices)",
                    record.id(),
                    record.snapshot.vertices.len()
                );
                let graph = ChatGraph::load(record.snapshot);
                Ok(Self::from_parts(
                    graph,
                    record.character_ids,
                    record.title,
                    record.created_at,
                    store,
                    titler,
                ))
            }
            None => {
                tracing::debug!("Chat {} not found; starting an empty graph", id);
                Ok(Self::from_parts(
                    ChatGraph::with_id(id),
                    Vec::new(),
                    None,
                    Utc::now(),
                    store,
                    titler,
                ))
            }
        }
    }

    /// Creates and persists a new chat
    ///
    /// `root_messages` seed the root turn (a character greeting, for example).
    pub async fn create(
        store: Arc<dyn ChatStore>,
        titler: Option<TitleGenerator>,
        character_ids: Vec<String>,
        root_messages: Vec<ChatMessage>,
    ) -> Result<Self> {
        let graph = ChatGraph::with_root_messages(new_chat_id(), root_messages);
        let manager = Self::from_parts(graph, character_ids, None, Utc::now(), store, titler);
        manager.save().await?;
        tracing::info!("Created chat {}", manager.id());
        Ok(manager)
    }

    fn from_parts(
        graph: ChatGraph,
        character_ids: Vec<String>,
        title: Option<String>,
        created_at: DateTime<Utc>,
        store: Arc<dyn ChatStore>,
        titler: Option<TitleGenerator>,
    ) -> Self {
        let title_state = if title.is_some() {
            TitleState::Titled
        } else {
            TitleState::Untitled
        };

        Self {
            vertex_map: graph.message_index(),
            graph,
            store,
            titler,
            character_ids,
            title,
            title_state,
            working_vertex: None,
            pending_messages: None,
            sibling_cache: SiblingCache::new(),
            created_at,
        }
    }

    pub fn id(&self) -> &str {
        self.graph.id()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn title_state(&self) -> TitleState {
        self.title_state
    }

    pub fn graph(&self) -> &ChatGraph {
        &self.graph
    }

    pub fn character_ids(&self) -> &[String] {
        &self.character_ids
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Transcript to seed the transport with after opening the chat
    pub fn initial_messages(&self) -> Vec<ChatMessage> {
        self.graph.flatten()
    }

    /// Vertex that owns `message_id`, if the message was committed
    pub fn vertex_for_message(&self, message_id: &str) -> Option<&str> {
        self.vertex_map.get(message_id).map(String::as_str)
    }

    /// Writes the current graph and chat metadata to the store
    ///
    /// # Errors
    ///
    /// Returns the store's error; in-memory state is kept so the save can be
    /// retried
    pub async fn save(&self) -> Result<()> {
        let record = ChatRecord {
            snapshot: self.graph.save(),
            character_ids: self.character_ids.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: Utc::now(),
        };

        self.store.save(&record).await?;
        tracing::debug!(
            "Persisted chat {} ({} vertices)",
            self.id(),
            self.graph.vertex_count()
        );
        Ok(())
    }

    /// Records messages that are not yet part of the graph
    ///
    /// Each unsaved trailing message becomes its own vertex, chained from the
    /// branch point if one is set, else from the active vertex. Messages
    /// without content are ignored. Re-committing a list whose tail is already
    /// known changes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting fails
    pub async fn commit(&mut self, messages: &[ChatMessage]) -> Result<CommitOutcome> {
        let candidates: Vec<&ChatMessage> =
            messages.iter().filter(|message| !message.is_empty()).collect();

        let start = candidates
            .iter()
            .rposition(|message| self.vertex_map.contains_key(&message.id))
            .map(|index| index + 1)
            .unwrap_or(0);
        let unsaved = &candidates[start..];

        if unsaved.is_empty() && self.working_vertex.is_none() {
            return Ok(CommitOutcome::Unchanged);
        }

        let mut current = self
            .working_vertex
            .take()
            .unwrap_or_else(|| self.graph.active_vertex().to_string());

        let mut created = Vec::with_capacity(unsaved.len());
        for message in unsaved {
            current = self.graph.create_vertex(&current, vec![(*message).clone()])?;
            self.vertex_map.insert(message.id.clone(), current.clone());
            created.push(current.clone());
        }
        self.sibling_cache.invalidate();

        tracing::debug!(
            "Committed {} new vertices to chat {}",
            created.len(),
            self.id()
        );

        let committed: Vec<ChatMessage> = candidates.into_iter().cloned().collect();
        self.maybe_generate_title(&committed).await;

        self.save().await?;
        Ok(CommitOutcome::Committed { created })
    }

    /// Commits the transport's list once it has settled
    ///
    /// While a reply is submitted or streaming nothing is recorded.
    pub async fn observe<T>(&mut self, transport: &T) -> Result<CommitOutcome>
    where
        T: ChatTransport + ?Sized,
    {
        if transport.status() != TransportStatus::Ready {
            tracing::trace!("Transport busy ({:?}); skipping commit", transport.status());
            return Ok(CommitOutcome::Unchanged);
        }
        self.commit(transport.messages()).await
    }

    /// Snapshots the list as it stood when a request was submitted
    pub fn set_pending_messages(&mut self, messages: &[ChatMessage]) {
        self.pending_messages = Some(messages.to_vec());
    }

    /// Drops the submit-time snapshot, e.g. after a failed request
    pub fn clear_pending_messages(&mut self) {
        self.pending_messages = None;
    }

    pub fn pending_messages(&self) -> Option<&[ChatMessage]> {
        self.pending_messages.as_deref()
    }

    /// Commits the pending snapshot followed by the finished reply
    pub async fn commit_on_finish(&mut self, latest: ChatMessage) -> Result<CommitOutcome> {
        let mut full = self.pending_messages.clone().unwrap_or_default();
        full.push(latest);
        let outcome = self.commit(&full).await?;
        self.pending_messages = None;
        Ok(outcome)
    }

    async fn maybe_generate_title(&mut self, messages: &[ChatMessage]) {
        if self.title_state != TitleState::Untitled {
            return;
        }
        let Some(titler) = self.titler.as_ref() else {
            return;
        };
        if !titler.is_eligible(messages.len()) {
            return;
        }

        self.title_state = TitleState::Pending;
        match titler.generate(messages).await {
            Some(title) => {
                tracing::info!("Titled chat {}: {}", self.graph.id(), title);
                self.title = Some(title);
                self.title_state = TitleState::Titled;
            }
            None => self.title_state = TitleState::Untitled,
        }
    }

    /// Asks for a fresh title regardless of the current one
    ///
    /// Returns the new title, or `None` if no generator is configured or the
    /// attempt failed (the previous title is kept).
    pub async fn regenerate_title(&mut self) -> Result<Option<String>> {
        let Some(titler) = self.titler.as_ref() else {
            return Ok(None);
        };

        let previous = self.title_state;
        self.title_state = TitleState::Pending;
        let title = titler.generate(&self.graph.flatten()).await;

        match &title {
            Some(title) => {
                self.title = Some(title.clone());
                self.title_state = TitleState::Titled;
                self.save().await?;
            }
            None => {
                self.title_state = if previous == TitleState::Titled {
                    TitleState::Titled
                } else {
                    TitleState::Untitled
                };
            }
        }

        Ok(title)
    }

    /// Sets a user-chosen title and persists it
    pub async fn set_title(&mut self, title: impl Into<String>) -> Result<()> {
        self.title = Some(title.into());
        self.title_state = TitleState::Titled;
        self.save().await
    }

    /// Moves to the sibling `offset` positions away from the message's turn
    ///
    /// Activates the sibling's remembered (or deepest) leaf and returns the
    /// new transcript. `None` when the message is unknown or its turn has no
    /// siblings. Navigation is not persisted until the next save.
    pub fn select_branch(&mut self, message_id: &str, offset: isize) -> Option<Vec<ChatMessage>> {
        let vertex_id = self.vertex_map.get(message_id)?;
        let target = self.graph.get_target_sibling(vertex_id, offset)?;

        self.graph.set_active_vertex(&target.leaf_id);
        tracing::debug!(
            "Selected branch {} (leaf {}) in chat {}",
            target.sibling_id,
            target.leaf_id,
            self.id()
        );
        Some(self.graph.flatten())
    }

    /// Like [`select_branch`](Self::select_branch), but reuses the caller's
    /// list up to the point where the old and new paths diverge
    pub fn splice_branch(
        &mut self,
        current_messages: &[ChatMessage],
        message_id: &str,
        offset: isize,
    ) -> Option<Vec<ChatMessage>> {
        let vertex_id = self.vertex_map.get(message_id)?;
        let target = self.graph.get_target_sibling(vertex_id, offset)?;

        let divergence = self
            .graph
            .divergence(self.graph.active_vertex(), &target.leaf_id);
        let mut spliced: Vec<ChatMessage> = current_messages
            .iter()
            .take(divergence.message_index)
            .cloned()
            .collect();
        spliced.extend(
            self.graph
                .get_parents(&target.leaf_id)
                .into_iter()
                .skip(divergence.shared_vertices)
                .flat_map(|vertex| vertex.messages.iter().cloned()),
        );

        self.graph.set_active_vertex(&target.leaf_id);
        Some(spliced)
    }

    /// Deletes the turn holding `message_id` and everything after it
    ///
    /// Unknown messages are ignored.
    pub async fn delete_message(&mut self, message_id: &str) -> Result<()> {
        let Some(vertex_id) = self.vertex_map.get(message_id).cloned() else {
            tracing::debug!("Message {} is not in the graph; nothing to delete", message_id);
            return Ok(());
        };
        self.delete_vertex(&vertex_id).await
    }

    /// Deletes a vertex subtree and persists
    pub async fn delete_vertex(&mut self, vertex_id: &str) -> Result<()> {
        let removed = self.graph.delete_vertex(vertex_id);
        if removed.is_empty() {
            return Ok(());
        }

        self.vertex_map
            .retain(|_, owner| !removed.iter().any(|id| id == owner));
        if self
            .working_vertex
            .as_ref()
            .is_some_and(|working| removed.contains(working))
        {
            self.working_vertex = None;
        }
        self.sibling_cache.invalidate();

        tracing::debug!(
            "Deleted {} vertices from chat {}",
            removed.len(),
            self.id()
        );
        self.save().await
    }

    /// Replaces a committed message's content in place and persists
    ///
    /// # Errors
    ///
    /// Returns `ChatloomError::UnknownMessage` if the message was never
    /// committed
    pub async fn update_message(&mut self, message: ChatMessage) -> Result<()> {
        let vertex_id = self
            .vertex_map
            .get(&message.id)
            .cloned()
            .ok_or_else(|| ChatloomError::UnknownMessage(message.id.clone()))?;

        self.graph.update_message(&vertex_id, message)?;
        self.save().await
    }

    /// Makes the next commit branch from `vertex_id`
    ///
    /// Also activates the vertex so the transcript matches. Unknown vertices
    /// are ignored and `false` is returned.
    pub fn set_branch_point(&mut self, vertex_id: &str) -> bool {
        if !self.graph.set_active_vertex(vertex_id) {
            return false;
        }
        self.working_vertex = Some(vertex_id.to_string());
        self.sibling_cache.invalidate();
        tracing::debug!("Branch point set to {} in chat {}", vertex_id, self.id());
        true
    }

    /// Vertex an edit or regenerate of `message_id` should branch from
    ///
    /// This is the parent of the message's own turn.
    pub fn branch_point_for_message(&self, message_id: &str) -> Option<String> {
        let vertex_id = self.vertex_map.get(message_id)?;
        self.graph.get_vertex(vertex_id)?.parent.clone()
    }

    /// 1-based position of the message's turn among its siblings
    ///
    /// Falls back to `1/1` when the message or its parent cannot be resolved.
    pub fn get_sibling_count(&mut self, message_id: &str) -> SiblingPosition {
        if let Some(position) = self.sibling_cache.get(message_id) {
            return position;
        }

        let position = self
            .vertex_map
            .get(message_id)
            .and_then(|vertex_id| self.graph.sibling_position(vertex_id))
            .unwrap_or_default();
        self.sibling_cache.insert(message_id, position);
        position
    }

    /// Replaces the chat's characters and persists
    pub async fn set_character_ids(&mut self, ids: Vec<String>) -> Result<()> {
        self.character_ids = ids;
        self.save().await
    }
}
