//! Conversation graph engine
//!
//! [`ChatGraph`] owns the vertices of one chat, the active-vertex pointer and
//! the per-branch terminal memory. All operations are synchronous and purely
//! in-memory; persistence is handled by [`crate::sync`].

use crate::error::{ChatloomError, Result};
use crate::graph::model::{
    new_chat_id, new_message_id, ChatMessage, GraphSnapshot, SiblingPosition, SiblingTarget,
    Vertex,
};
use std::collections::{HashMap, HashSet};

/// Where two ancestor paths stop sharing vertices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Divergence {
    /// Number of leading vertices both paths share
    pub shared_vertices: usize,
    /// Number of messages contributed by the shared vertices
    pub message_index: usize,
}

/// Tree of conversational turns for a single chat
///
/// The root vertex carries the chat id and is never deleted. Every other
/// vertex has exactly one parent.
///
/// # Examples
///
/// ```
/// use chatloom::graph::{ChatGraph, ChatMessage};
///
/// # fn main() -> chatloom::error::Result<()> {
/// let mut graph = ChatGraph::with_id("chat-1");
/// let first = graph.create_vertex("chat-1", vec![ChatMessage::user("hi")])?;
/// assert_eq!(graph.active_vertex(), first);
/// assert_eq!(graph.flatten().len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ChatGraph {
    id: String,
    vertices: HashMap<String, Vertex>,
    active_vertex: String,
    active_terminal_vertices: HashMap<String, String>,
    metadata: Option<HashMap<String, serde_json::Value>>,
}

impl Default for ChatGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatGraph {
    /// Creates an empty graph with a freshly generated chat id
    pub fn new() -> Self {
        Self::with_id(new_chat_id())
    }

    /// Creates an empty graph whose root carries `id`
    pub fn with_id(id: impl Into<String>) -> Self {
        Self::with_root_messages(id, Vec::new())
    }

    /// Creates a graph whose root vertex is seeded with `messages`
    ///
    /// Seed messages are typically a character's greeting.
    pub fn with_root_messages(id: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        let id = id.into();
        let mut vertices = HashMap::new();
        vertices.insert(id.clone(), Vertex::new(id.clone(), None, messages));
        Self {
            active_vertex: id.clone(),
            id,
            vertices,
            active_terminal_vertices: HashMap::new(),
            metadata: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn active_vertex(&self) -> &str {
        &self.active_vertex
    }

    pub fn get_vertex(&self, id: &str) -> Option<&Vertex> {
        self.vertices.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.vertices.contains_key(id)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.values()
    }

    /// Remembered leaf for the branch starting at `child_id`
    pub fn terminal_for(&self, child_id: &str) -> Option<&str> {
        self.active_terminal_vertices
            .get(child_id)
            .map(String::as_str)
    }

    /// Creates a new vertex under `parent_id` and makes it active
    ///
    /// # Errors
    ///
    /// Returns `ChatloomError::UnknownParent` if `parent_id` is not in the graph
    pub fn create_vertex(&mut self, parent_id: &str, messages: Vec<ChatMessage>) -> Result<String> {
        let parent = self
            .vertices
            .get_mut(parent_id)
            .ok_or_else(|| ChatloomError::UnknownParent(parent_id.to_string()))?;

        let id = new_message_id();
        parent.children.push(id.clone());
        self.vertices.insert(
            id.clone(),
            Vertex::new(id.clone(), Some(parent_id.to_string()), messages),
        );
        self.set_active_vertex(&id);

        tracing::debug!("Created vertex {} under {}", id, parent_id);
        Ok(id)
    }

    /// Branch off from an existing turn
    ///
    /// Used whenever the conversation diverges from an earlier point (edit,
    /// regenerate, or explicit fork).
    pub fn branch_from(&mut self, vertex_id: &str, messages: Vec<ChatMessage>) -> Result<String> {
        self.create_vertex(vertex_id, messages)
    }

    /// Deletes a vertex together with all of its descendants
    ///
    /// When the active vertex is inside the removed subtree, activity moves to
    /// the surviving sibling at the same position (clamped), else to the
    /// parent. Returns the removed ids in pre-order; unknown ids and the root
    /// remove nothing.
    pub fn delete_vertex(&mut self, vertex_id: &str) -> Vec<String> {
        let Some(vertex) = self.vertices.get(vertex_id) else {
            return Vec::new();
        };
        if vertex_id == self.id {
            tracing::warn!("Refusing to delete root vertex of chat {}", self.id);
            return Vec::new();
        }

        let deleted_parent = vertex.parent.clone();
        let removed: Vec<String> = self
            .walk_preorder(vertex_id)
            .into_iter()
            .map(|(id, _)| id.to_string())
            .collect();
        let trash: HashSet<&str> = removed.iter().map(String::as_str).collect();

        let mut new_active = None;
        if trash.contains(self.active_vertex.as_str()) {
            new_active = Some(self.id.clone());
            let surviving_parent = deleted_parent
                .as_deref()
                .filter(|parent_id| !trash.contains(parent_id))
                .and_then(|parent_id| self.vertices.get(parent_id));
            if let Some(parent) = surviving_parent {
                let index = parent
                    .children
                    .iter()
                    .position(|child| child == vertex_id)
                    .unwrap_or(0);
                let siblings: Vec<&String> = parent
                    .children
                    .iter()
                    .filter(|child| child.as_str() != vertex_id)
                    .collect();
                new_active = Some(match siblings.len() {
                    0 => parent.id.clone(),
                    len => siblings[index.min(len - 1)].clone(),
                });
            }
        }

        if let Some(parent) = deleted_parent
            .as_deref()
            .and_then(|parent_id| self.vertices.get_mut(parent_id))
        {
            parent.children.retain(|child| child != vertex_id);
        }
        for id in &removed {
            self.vertices.remove(id);
        }
        self.active_terminal_vertices
            .retain(|child, leaf| !trash.contains(child.as_str()) && !trash.contains(leaf.as_str()));

        if let Some(target) = new_active {
            self.active_vertex = target.clone();
            self.remember_terminal(&target);
        }

        tracing::debug!(
            "Deleted {} vertices starting at {}; active is now {}",
            removed.len(),
            vertex_id,
            self.active_vertex
        );
        removed
    }

    /// Makes `vertex_id` the active vertex
    ///
    /// Records, for every branch point on the new active path, which child
    /// leads to `vertex_id`. Unknown ids leave the active vertex unchanged.
    pub fn set_active_vertex(&mut self, vertex_id: &str) -> bool {
        if !self.vertices.contains_key(vertex_id) {
            tracing::warn!(
                "Attempted to set non-existent vertex {} as active. Keeping current active vertex: {}",
                vertex_id,
                self.active_vertex
            );
            return false;
        }

        self.active_vertex = vertex_id.to_string();
        self.remember_terminal(vertex_id);
        true
    }

    fn remember_terminal(&mut self, vertex_id: &str) {
        let branch_children: Vec<String> = self
            .get_parents(vertex_id)
            .windows(2)
            .filter(|pair| pair[0].children.len() > 1)
            .map(|pair| pair[1].id.clone())
            .collect();

        for child in branch_children {
            self.active_terminal_vertices
                .insert(child, vertex_id.to_string());
        }
    }

    /// Ancestor path of `vertex_id`, root first, ending with the vertex itself
    pub fn get_parents(&self, vertex_id: &str) -> Vec<&Vertex> {
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.vertices.get(vertex_id);

        while let Some(vertex) = current {
            if !seen.insert(vertex.id.as_str()) {
                tracing::warn!("Parent cycle detected at vertex {}", vertex.id);
                break;
            }
            path.push(vertex);
            current = vertex
                .parent
                .as_deref()
                .and_then(|parent| self.vertices.get(parent));
        }

        path.reverse();
        path
    }

    /// All descendant ids of `vertex_id` in pre-order
    pub fn get_children(&self, vertex_id: &str) -> Vec<String> {
        self.walk_preorder(vertex_id)
            .into_iter()
            .skip(1)
            .map(|(id, _)| id.to_string())
            .collect()
    }

    /// Deepest descendant of `start_vertex`
    ///
    /// Ties go to the first vertex visited, so the earliest-created branch
    /// wins. A leaf (or unknown id) returns itself.
    pub fn get_deepest_child(&self, start_vertex: &str) -> String {
        let mut deepest = start_vertex;
        let mut max_depth = 0;

        for (id, depth) in self.walk_preorder(start_vertex) {
            if depth > max_depth {
                max_depth = depth;
                deepest = id;
            }
        }

        deepest.to_string()
    }

    /// Pre-order traversal with depth, using an explicit stack
    fn walk_preorder<'a>(&'a self, start: &'a str) -> Vec<(&'a str, usize)> {
        let mut visited = Vec::new();
        let mut seen = HashSet::new();
        if !self.vertices.contains_key(start) {
            return visited;
        }

        let mut stack = vec![(start, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            visited.push((id, depth));
            if let Some(vertex) = self.vertices.get(id) {
                stack.extend(
                    vertex
                        .children
                        .iter()
                        .rev()
                        .filter(|child| self.vertices.contains_key(child.as_str()))
                        .map(|child| (child.as_str(), depth + 1)),
                );
            }
        }

        visited
    }

    /// Linear transcript of the active path
    pub fn flatten(&self) -> Vec<ChatMessage> {
        self.flatten_to(&self.active_vertex)
    }

    /// Linear transcript ending at `vertex_id`
    pub fn flatten_to(&self, vertex_id: &str) -> Vec<ChatMessage> {
        self.get_parents(vertex_id)
            .into_iter()
            .flat_map(|vertex| vertex.messages.iter().cloned())
            .collect()
    }

    /// Sibling reached by moving `offset` positions from `vertex_id`
    ///
    /// Wraps around the parent's children. Returns `None` when the vertex has
    /// no parent or fewer than two siblings.
    pub fn get_target_sibling(&self, vertex_id: &str, offset: isize) -> Option<SiblingTarget> {
        let vertex = self.vertices.get(vertex_id)?;
        let parent = self.vertices.get(vertex.parent.as_deref()?)?;
        let siblings = &parent.children;
        if siblings.len() < 2 {
            return None;
        }

        let current = siblings.iter().position(|child| child == vertex_id)?;
        let new_index = (current as isize + offset).rem_euclid(siblings.len() as isize) as usize;
        let sibling_id = siblings[new_index].clone();

        let leaf_id = match self.active_terminal_vertices.get(&sibling_id) {
            Some(leaf) if self.vertices.contains_key(leaf) => leaf.clone(),
            _ => self.get_deepest_child(&sibling_id),
        };

        Some(SiblingTarget {
            sibling_id,
            leaf_id,
        })
    }

    /// 1-based position of `vertex_id` among its parent's children
    pub fn sibling_position(&self, vertex_id: &str) -> Option<SiblingPosition> {
        let parent_id = self.vertices.get(vertex_id)?.parent.as_deref()?;
        let siblings = &self.vertices.get(parent_id)?.children;
        let index = siblings.iter().position(|child| child == vertex_id)?;
        Some(SiblingPosition {
            current: index + 1,
            total: siblings.len(),
        })
    }

    /// Compares the ancestor paths of two vertices
    pub fn divergence(&self, current_leaf: &str, target_leaf: &str) -> Divergence {
        let current = self.get_parents(current_leaf);
        let target = self.get_parents(target_leaf);

        let shared: Vec<&Vertex> = current
            .iter()
            .zip(target.iter())
            .take_while(|(a, b)| a.id == b.id)
            .map(|(a, _)| *a)
            .collect();

        Divergence {
            shared_vertices: shared.len(),
            message_index: shared.iter().map(|vertex| vertex.messages.len()).sum(),
        }
    }

    /// Replaces the message with the same id inside `vertex_id`
    ///
    /// # Errors
    ///
    /// Returns `UnknownVertex` or `UnknownMessage` when either cannot be found
    pub fn update_message(&mut self, vertex_id: &str, message: ChatMessage) -> Result<()> {
        let vertex = self
            .vertices
            .get_mut(vertex_id)
            .ok_or_else(|| ChatloomError::UnknownVertex(vertex_id.to_string()))?;
        let slot = vertex
            .messages
            .iter_mut()
            .find(|existing| existing.id == message.id)
            .ok_or_else(|| ChatloomError::UnknownMessage(message.id.clone()))?;
        *slot = message;
        Ok(())
    }

    /// Message id -> owning vertex id for every message in the graph
    pub fn message_index(&self) -> HashMap<String, String> {
        self.vertices
            .values()
            .flat_map(|vertex| {
                vertex
                    .messages
                    .iter()
                    .map(move |message| (message.id.clone(), vertex.id.clone()))
            })
            .collect()
    }

    pub fn metadata(&self) -> Option<&HashMap<String, serde_json::Value>> {
        self.metadata.as_ref()
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
    }

    /// Verifies the tree invariants
    ///
    /// # Errors
    ///
    /// Returns `ChatloomError::Integrity` describing the first violation found
    pub fn check_integrity(&self) -> Result<()> {
        let violation = |msg: String| -> anyhow::Error { ChatloomError::Integrity(msg).into() };

        let root = self
            .vertices
            .get(&self.id)
            .ok_or_else(|| violation(format!("root vertex {} missing", self.id)))?;
        if root.parent.is_some() {
            return Err(violation(format!("root vertex {} has a parent", self.id)));
        }
        if !self.vertices.contains_key(&self.active_vertex) {
            return Err(violation(format!(
                "active vertex {} missing",
                self.active_vertex
            )));
        }

        for vertex in self.vertices.values() {
            let mut unique = HashSet::new();
            for child_id in &vertex.children {
                if !unique.insert(child_id) {
                    return Err(violation(format!(
                        "vertex {} lists child {} twice",
                        vertex.id, child_id
                    )));
                }
                let child = self.vertices.get(child_id).ok_or_else(|| {
                    violation(format!("vertex {} has dangling child {}", vertex.id, child_id))
                })?;
                if child.parent.as_deref() != Some(vertex.id.as_str()) {
                    return Err(violation(format!(
                        "child {} does not point back to {}",
                        child_id, vertex.id
                    )));
                }
            }

            if vertex.id == self.id {
                continue;
            }
            let parent_id = vertex
                .parent
                .as_deref()
                .ok_or_else(|| violation(format!("vertex {} has no parent", vertex.id)))?;
            let parent = self.vertices.get(parent_id).ok_or_else(|| {
                violation(format!("vertex {} has dangling parent {}", vertex.id, parent_id))
            })?;
            if !parent.children.contains(&vertex.id) {
                return Err(violation(format!(
                    "parent {} does not list {}",
                    parent_id, vertex.id
                )));
            }

            let path = self.get_parents(&vertex.id);
            if path.first().map(|v| v.id.as_str()) != Some(self.id.as_str()) {
                return Err(violation(format!(
                    "vertex {} does not reach the root",
                    vertex.id
                )));
            }
        }

        Ok(())
    }

    /// Serializes the graph into a snapshot
    ///
    /// Vertices reachable from the root come first in pre-order, so equal
    /// graphs produce equal snapshots.
    pub fn save(&self) -> GraphSnapshot {
        let mut ordered: Vec<&str> = self
            .walk_preorder(&self.id)
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        let reachable: HashSet<&str> = ordered.iter().copied().collect();
        let mut unreachable: Vec<&str> = self
            .vertices
            .keys()
            .map(String::as_str)
            .filter(|id| !reachable.contains(id))
            .collect();
        unreachable.sort_unstable();
        ordered.extend(unreachable);

        GraphSnapshot {
            id: self.id.clone(),
            vertices: ordered
                .into_iter()
                .filter_map(|id| self.vertices.get(id).cloned())
                .collect(),
            active_vertex: self.active_vertex.clone(),
            active_terminal_vertices: self.active_terminal_vertices.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// Restores a graph from a snapshot
    ///
    /// A dangling active vertex falls back to the root.
    pub fn load(snapshot: GraphSnapshot) -> Self {
        let mut vertices: HashMap<String, Vertex> = snapshot
            .vertices
            .into_iter()
            .map(|vertex| (vertex.id.clone(), vertex))
            .collect();

        if !vertices.contains_key(&snapshot.id) {
            tracing::warn!("Snapshot {} has no root vertex; inserting one", snapshot.id);
            vertices.insert(
                snapshot.id.clone(),
                Vertex::new(snapshot.id.clone(), None, Vec::new()),
            );
        }

        let active_vertex = if vertices.contains_key(&snapshot.active_vertex) {
            snapshot.active_vertex
        } else {
            tracing::warn!(
                "Snapshot active vertex {} missing; falling back to root",
                snapshot.active_vertex
            );
            snapshot.id.clone()
        };

        Self {
            id: snapshot.id,
            vertices,
            active_vertex,
            active_terminal_vertices: snapshot.active_terminal_vertices,
            metadata: snapshot.metadata,
        }
    }
}
