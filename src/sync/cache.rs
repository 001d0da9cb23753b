use crate::graph::SiblingPosition;
use std::collections::HashMap;

/// Per-chat memo of sibling positions keyed by message id
///
/// Owned by a single sync manager and cleared on every structural change.
#[derive(Debug, Default, Clone)]
pub struct SiblingCache {
    positions: HashMap<String, SiblingPosition>,
}

impl SiblingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, message_id: &str) -> Option<SiblingPosition> {
        self.positions.get(message_id).copied()
    }

    pub fn insert(&mut self, message_id: impl Into<String>, position: SiblingPosition) {
        self.positions.insert(message_id.into(), position);
    }

    pub fn invalidate(&mut self) {
        if !self.positions.is_empty() {
            tracing::trace!("Sibling cache invalidated ({} entries)", self.positions.len());
        }
        self.positions.clear();
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
