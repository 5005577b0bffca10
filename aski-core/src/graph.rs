use tracing::debug;

use crate::error::HistoryError;
use crate::key::Key;
use crate::node::{MessageNode, Role};
use crate::persist::Snapshot;
use crate::store::NodeStore;

/// The conversation history: every turn ever created plus a movable HEAD.
///
/// Mutation happens only through [`append_turn`](Self::append_turn) and
/// [`change_head`](Self::change_head). Moving HEAD back and appending starts a
/// new branch; the old branch stays in the store and can be moved to again.
#[derive(Debug, Default, Clone)]
pub struct ConversationGraph {
    store: NodeStore,
    head: Option<Key>,
    summary: Option<String>,
}

impl ConversationGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a graph from a persisted snapshot.
    ///
    /// Every node must match its hash, every parent must be present and HEAD
    /// must point at a stored node.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, HistoryError> {
        let mut store = NodeStore::new();
        for node in snapshot.nodes {
            if !node.verify() {
                return Err(HistoryError::HashMismatch(node.hash()));
            }
            store.put(node)?;
        }

        for node in store.iter() {
            if let Some(parent) = node.parent() {
                if !store.contains(&parent) {
                    return Err(HistoryError::DanglingParent {
                        node: node.hash(),
                        parent,
                    });
                }
            }
        }

        let head = match snapshot.head {
            Some(head) if !store.contains(&head) => return Err(HistoryError::MissingHead(head)),
            Some(head) => Some(head),
            None if store.is_empty() => None,
            None => return Err(HistoryError::HeadlessSnapshot),
        };

        Ok(Self {
            store,
            head,
            summary: snapshot.summary,
        })
    }

    /// Copies the graph out for persistence.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            nodes: self.store.iter().cloned().collect(),
            head: self.head,
            summary: self.summary.clone(),
        }
    }

    /// Appends a turn as a child of HEAD and moves HEAD to it.
    ///
    /// Appending content identical to an existing child of HEAD yields that
    /// child again instead of a new node.
    pub fn append_turn(
        &mut self,
        role: Role,
        content: impl Into<String>,
    ) -> Result<&MessageNode, HistoryError> {
        let node = MessageNode::new(role, content, self.head);
        let hash = node.hash();
        self.store.put(node)?;
        self.head = Some(hash);
        debug!(%hash, %role, "appended turn");
        self.store.get(&hash)
    }

    /// Moves HEAD to the node identified by a hash prefix.
    pub fn change_head(&mut self, partial: &str) -> Result<&MessageNode, HistoryError> {
        let partial = partial.trim();
        if partial.is_empty() {
            return Err(HistoryError::EmptyInput("hash prefix"));
        }
        let hash = self.store.resolve_prefix(partial)?.hash();
        self.head = Some(hash);
        debug!(%hash, "moved head");
        self.store.get(&hash)
    }

    /// Moves HEAD to an exact key, or clears it for `None`.
    pub fn set_head(&mut self, head: Option<Key>) -> Result<(), HistoryError> {
        if let Some(hash) = head {
            self.store.get(&hash)?;
        }
        self.head = head;
        Ok(())
    }

    /// Returns the nodes from the root to HEAD, oldest first.
    pub fn active_path(&self) -> Vec<&MessageNode> {
        let mut path = Vec::new();
        let mut current = self.head;

        while let Some(hash) = current {
            let Ok(node) = self.store.get(&hash) else {
                break;
            };
            path.push(node);
            current = node.parent();
        }

        path.reverse();
        path
    }

    pub fn head(&self) -> Option<Key> {
        self.head
    }

    pub fn head_node(&self) -> Option<&MessageNode> {
        self.head.and_then(|h| self.store.get(&h).ok())
    }

    pub fn is_head(&self, hash: &Key) -> bool {
        self.head.as_ref() == Some(hash)
    }

    pub fn get(&self, hash: &Key) -> Result<&MessageNode, HistoryError> {
        self.store.get(hash)
    }

    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn set_summary(&mut self, summary: impl Into<String>) {
        self.summary = Some(summary.into());
    }
}
