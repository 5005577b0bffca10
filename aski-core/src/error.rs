use thiserror::Error;

use crate::key::Key;

/// Errors raised by the node store and the conversation graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("no message matches {0}")]
    NotFound(String),

    #[error("{prefix} is ambiguous: {matches} or more messages match")]
    AmbiguousPrefix { prefix: String, matches: usize },

    #[error("hash collision on {0}: stored message has different content")]
    DuplicateHash(Key),

    #[error("missing argument: {0}")]
    EmptyInput(&'static str),

    #[error("message {node} refers to unknown parent {parent}")]
    DanglingParent { node: Key, parent: Key },

    #[error("message {0} does not match its hash")]
    HashMismatch(Key),

    #[error("head {0} is not in the store")]
    MissingHead(Key),

    #[error("snapshot has messages but no head")]
    HeadlessSnapshot,
}

/// Failure of a remote completion call, propagated with its cause.
#[derive(Debug, Error)]
#[error("transport failed: {0}")]
pub struct TransportError(#[source] Box<dyn std::error::Error + Send + Sync>);

impl TransportError {
    pub fn new(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        TransportError(cause.into())
    }

    pub fn cause(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.0.as_ref()
    }
}

/// CBOR encoding or decoding failure.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode: {0}")]
    Encode(String),
    #[error("failed to decode: {0}")]
    Decode(String),
}
