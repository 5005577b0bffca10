use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CodecError;
use crate::key::Key;

/// Author of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            _ => Err(format!("unknown role: {}", s)),
        }
    }
}

/// One turn of the conversation.
///
/// The hash is derived from `(role, content, parent)` at construction and the
/// node is immutable afterwards; there are no setters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageNode {
    hash: Key,
    parent: Option<Key>,
    role: Role,
    content: String,
}

impl MessageNode {
    /// Creates a node, computing its hash.
    pub fn new(role: Role, content: impl Into<String>, parent: Option<Key>) -> Self {
        let content = content.into();
        let hash = Self::compute_hash(role, &content, parent.as_ref());
        MessageNode {
            hash,
            parent,
            role,
            content,
        }
    }

    /// Rebuilds a node from stored parts without recomputing the hash.
    ///
    /// Use [`MessageNode::verify`] to check the stored hash afterwards.
    pub fn from_parts(hash: Key, parent: Option<Key>, role: Role, content: String) -> Self {
        MessageNode {
            hash,
            parent,
            role,
            content,
        }
    }

    /// Hashes the role, the length-prefixed content and the parent key.
    pub fn compute_hash(role: Role, content: &str, parent: Option<&Key>) -> Key {
        let mut hasher = blake3::Hasher::new();
        hasher.update(role.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(&(content.len() as u64).to_le_bytes());
        hasher.update(content.as_bytes());
        match parent {
            Some(parent) => {
                hasher.update(&[1]);
                hasher.update(parent.as_bytes());
            }
            None => {
                hasher.update(&[0]);
            }
        }
        Key::from_bytes(*hasher.finalize().as_bytes())
    }

    pub fn hash(&self) -> Key {
        self.hash
    }

    pub fn parent(&self) -> Option<Key> {
        self.parent
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Returns true if the stored hash matches the node's contents.
    pub fn verify(&self) -> bool {
        Self::compute_hash(self.role, &self.content, self.parent.as_ref()) == self.hash
    }

    /// Returns true if both nodes carry the same role, content and parent.
    pub fn same_content(&self, other: &MessageNode) -> bool {
        self.role == other.role && self.parent == other.parent && self.content == other.content
    }

    /// Serializes the node to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(buf)
    }

    /// Deserializes a node from CBOR bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, CodecError> {
        ciborium::from_reader(data).map_err(|e| CodecError::Decode(e.to_string()))
    }
}
