use std::collections::BTreeMap;

use crate::error::HistoryError;
use crate::key::Key;
use crate::node::MessageNode;

/// Append-only collection of message nodes keyed by hash.
///
/// Nodes are never removed or replaced. The map is ordered so that all keys
/// sharing a hex prefix form one contiguous range.
#[derive(Debug, Default, Clone)]
pub struct NodeStore {
    nodes: BTreeMap<Key, MessageNode>,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a node, returning the stored copy.
    ///
    /// Inserting a node identical to one already stored is a no-op. A node
    /// whose hash is taken by different content is rejected.
    pub fn put(&mut self, node: MessageNode) -> Result<&MessageNode, HistoryError> {
        let hash = node.hash();
        if let Some(existing) = self.nodes.get(&hash) {
            if !existing.same_content(&node) {
                return Err(HistoryError::DuplicateHash(hash));
            }
        } else {
            self.nodes.insert(hash, node);
        }
        self.get(&hash)
    }

    pub fn get(&self, hash: &Key) -> Result<&MessageNode, HistoryError> {
        self.nodes
            .get(hash)
            .ok_or_else(|| HistoryError::NotFound(hash.to_string()))
    }

    pub fn contains(&self, hash: &Key) -> bool {
        self.nodes.contains_key(hash)
    }

    /// Finds the single node whose hex hash starts with `partial`.
    ///
    /// Matching is case-insensitive. More than one match is reported as
    /// ambiguous, never resolved by picking one.
    pub fn resolve_prefix(&self, partial: &str) -> Result<&MessageNode, HistoryError> {
        let prefix = partial.trim().to_lowercase();
        let Some(lower) = Key::lower_bound(&prefix) else {
            return Err(HistoryError::NotFound(partial.to_string()));
        };

        let mut matches = self
            .nodes
            .range(lower..)
            .take_while(|(key, _)| key.has_prefix(&prefix))
            .map(|(_, node)| node);

        match (matches.next(), matches.next()) {
            (None, _) => Err(HistoryError::NotFound(partial.to_string())),
            (Some(node), None) => Ok(node),
            (Some(_), Some(_)) => Err(HistoryError::AmbiguousPrefix {
                prefix: partial.to_string(),
                matches: 2,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates over all nodes in hash order.
    pub fn iter(&self) -> impl Iterator<Item = &MessageNode> {
        self.nodes.values()
    }
}
