use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::RwLock;

use crate::key::Key;
use crate::node::MessageNode;

/// Everything needed to rebuild a conversation graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub nodes: Vec<MessageNode>,
    pub head: Option<Key>,
    pub summary: Option<String>,
}

/// Short listing of a stored session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub name: String,
    pub head: Option<Key>,
    pub summary: Option<String>,
}

/// Storage for conversation snapshots, one per named session.
///
/// The format is up to the implementation; it must round-trip every node's
/// hash, parent, role and content as well as HEAD.
pub trait Persistence {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Loads a session, or None if it was never saved.
    fn load(&self, session: &str) -> Result<Option<Snapshot>, Self::Error>;

    /// Stores a session, replacing its HEAD and summary.
    fn save(&self, session: &str, snapshot: &Snapshot) -> Result<(), Self::Error>;

    /// Lists stored sessions ordered by name.
    fn sessions(&self) -> Result<Vec<SessionInfo>, Self::Error>;
}

/// An in-memory persistence backend.
///
/// Useful for testing and as a reference implementation.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    sessions: RwLock<BTreeMap<String, Snapshot>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Persistence for MemoryPersistence {
    type Error = Infallible;

    fn load(&self, session: &str) -> Result<Option<Snapshot>, Self::Error> {
        Ok(self.sessions.read().unwrap().get(session).cloned())
    }

    fn save(&self, session: &str, snapshot: &Snapshot) -> Result<(), Self::Error> {
        self.sessions
            .write()
            .unwrap()
            .insert(session.to_string(), snapshot.clone());
        Ok(())
    }

    fn sessions(&self) -> Result<Vec<SessionInfo>, Self::Error> {
        Ok(self
            .sessions
            .read()
            .unwrap()
            .iter()
            .map(|(name, snapshot)| SessionInfo {
                name: name.clone(),
                head: snapshot.head,
                summary: snapshot.summary.clone(),
            })
            .collect())
    }
}
