//! RocksDB-backed conversation persistence for aski.
//!
//! Layout:
//! - `node/<hash>` → CBOR-encoded message node, shared by all sessions
//! - `session/<name>/node/<hash>` → empty marker for session membership
//! - `session/<name>/head` → 32-byte HEAD hash
//! - `session/<name>/summary` → UTF-8 summary text

use std::collections::BTreeMap;
use std::path::Path;

use aski_core::{CodecError, Key, MessageNode, Persistence, SessionInfo, Snapshot};
use rocksdb::{DB, Direction, IteratorMode, Options, WriteBatch};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RocksError {
    #[error("RocksDB error: {0}")]
    Db(#[from] rocksdb::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("session {session} lists node {hash} that is not stored")]
    MissingNode { session: String, hash: Key },

    #[error("corrupt entry under {0}")]
    Corrupt(String),
}

/// A persistent conversation store backed by RocksDB.
pub struct RocksHistory {
    db: DB,
}

const NODE_PREFIX: &[u8] = b"node/";
const SESSION_PREFIX: &[u8] = b"session/";

fn joined(parts: &[&[u8]]) -> Vec<u8> {
    parts.concat()
}

fn node_key(hash: &Key) -> Vec<u8> {
    joined(&[NODE_PREFIX, hash.as_slice()])
}

fn session_prefix(session: &str) -> Vec<u8> {
    joined(&[SESSION_PREFIX, session.as_bytes(), b"/"])
}

fn member_prefix(session: &str) -> Vec<u8> {
    joined(&[&session_prefix(session), b"node/"])
}

fn head_key(session: &str) -> Vec<u8> {
    joined(&[&session_prefix(session), b"head"])
}

fn summary_key(session: &str) -> Vec<u8> {
    joined(&[&session_prefix(session), b"summary"])
}

impl RocksHistory {
    /// Opens a RocksDB store at the given path.
    ///
    /// Creates the database if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RocksError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self { db })
    }

    /// Collects every key/value pair starting with `prefix`, prefix stripped.
    fn scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, RocksError> {
        let mut out = Vec::new();
        for item in self
            .db
            .iterator(IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, value) = item?;
            let Some(rest) = key.strip_prefix(prefix) else {
                break;
            };
            out.push((rest.to_vec(), value.to_vec()));
        }
        Ok(out)
    }

    fn read_head(&self, session: &str) -> Result<Option<Key>, RocksError> {
        match self.db.get(head_key(session))? {
            Some(bytes) => Key::from_slice(&bytes)
                .map(Some)
                .ok_or_else(|| RocksError::Corrupt(format!("{session}/head"))),
            None => Ok(None),
        }
    }

    fn read_summary(&self, session: &str) -> Result<Option<String>, RocksError> {
        match self.db.get(summary_key(session))? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| RocksError::Corrupt(format!("{session}/summary"))),
            None => Ok(None),
        }
    }
}

impl Persistence for RocksHistory {
    type Error = RocksError;

    fn load(&self, session: &str) -> Result<Option<Snapshot>, Self::Error> {
        let members = self.scan(&member_prefix(session))?;
        let head = self.read_head(session)?;
        if members.is_empty() && head.is_none() {
            return Ok(None);
        }

        let mut nodes = Vec::with_capacity(members.len());
        for (hash_bytes, _) in members {
            let hash = Key::from_slice(&hash_bytes)
                .ok_or_else(|| RocksError::Corrupt(format!("{session}/node")))?;
            let bytes = self.db.get(node_key(&hash))?.ok_or_else(|| RocksError::MissingNode {
                session: session.to_string(),
                hash,
            })?;
            nodes.push(MessageNode::from_bytes(&bytes)?);
        }

        Ok(Some(Snapshot {
            nodes,
            head,
            summary: self.read_summary(session)?,
        }))
    }

    fn save(&self, session: &str, snapshot: &Snapshot) -> Result<(), Self::Error> {
        let mut batch = WriteBatch::default();
        let members = member_prefix(session);

        for node in &snapshot.nodes {
            let hash = node.hash();
            batch.put(node_key(&hash), node.to_bytes()?);
            batch.put(joined(&[&members, hash.as_slice()]), b"");
        }

        match snapshot.head {
            Some(head) => batch.put(head_key(session), head.as_bytes()),
            None => batch.delete(head_key(session)),
        }
        match &snapshot.summary {
            Some(summary) => batch.put(summary_key(session), summary.as_bytes()),
            None => batch.delete(summary_key(session)),
        }

        self.db.write(batch)?;
        Ok(())
    }

    fn sessions(&self) -> Result<Vec<SessionInfo>, Self::Error> {
        let mut names = BTreeMap::new();
        for (rest, _) in self.scan(SESSION_PREFIX)? {
            let Some(split) = rest.iter().position(|b| *b == b'/') else {
                continue;
            };
            if let Ok(name) = std::str::from_utf8(&rest[..split]) {
                names.insert(name.to_string(), ());
            }
        }

        names
            .into_keys()
            .map(|name| {
                Ok(SessionInfo {
                    head: self.read_head(&name)?,
                    summary: self.read_summary(&name)?,
                    name,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aski_core::{ConversationGraph, Role};
    use tempfile::TempDir;

    fn temp_store() -> (RocksHistory, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksHistory::open(dir.path()).unwrap();
        (store, dir)
    }

    fn sample_graph() -> ConversationGraph {
        let mut graph = ConversationGraph::new();
        graph.append_turn(Role::System, "sys").unwrap();
        let q = graph.append_turn(Role::User, "q").unwrap().hash();
        graph.append_turn(Role::Assistant, "a1").unwrap();
        graph.change_head(&q.to_string()).unwrap();
        graph.append_turn(Role::Assistant, "a2").unwrap();
        graph.set_summary("sample");
        graph
    }

    #[test]
    fn load_missing_session() {
        let (store, _dir) = temp_store();
        assert_eq!(store.load("nope").unwrap(), None);
    }

    #[test]
    fn save_load_keeps_branches_and_head() {
        let (store, _dir) = temp_store();
        let graph = sample_graph();

        store.save("s1", &graph.snapshot()).unwrap();
        let restored = ConversationGraph::from_snapshot(store.load("s1").unwrap().unwrap()).unwrap();

        assert_eq!(restored.len(), 4);
        assert_eq!(restored.head(), graph.head());
        assert_eq!(restored.summary(), Some("sample"));
        let path: Vec<_> = restored.active_path().iter().map(|n| n.content()).collect();
        assert_eq!(path, ["sys", "q", "a2"]);
    }

    #[test]
    fn sessions_share_nodes_but_not_heads() {
        let (store, _dir) = temp_store();
        let mut graph = sample_graph();
        store.save("a", &graph.snapshot()).unwrap();

        graph.append_turn(Role::User, "more").unwrap();
        store.save("b", &graph.snapshot()).unwrap();

        let a = store.load("a").unwrap().unwrap();
        let b = store.load("b").unwrap().unwrap();
        assert_eq!(a.nodes.len(), 4);
        assert_eq!(b.nodes.len(), 5);
        assert_ne!(a.head, b.head);

        let names: Vec<_> = store.sessions().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn persistence() {
        let dir = TempDir::new().unwrap();
        let graph = sample_graph();

        {
            let store = RocksHistory::open(dir.path()).unwrap();
            store.save("s", &graph.snapshot()).unwrap();
        }

        {
            let store = RocksHistory::open(dir.path()).unwrap();
            let snapshot = store.load("s").unwrap().unwrap();
            assert_eq!(snapshot.head, graph.head());
            assert!(snapshot.nodes.iter().all(|n| n.verify()));
        }
    }
}
