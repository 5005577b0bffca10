//! Conversation history engine for aski.
//!
//! Core concepts:
//! - **MessageNode**: one turn, identified by a Blake3 hash of its role, content and parent
//! - **NodeStore**: append-only collection of nodes with hash-prefix lookup
//! - **ConversationGraph**: the node store plus a single movable HEAD
//! - **StreamAggregator**: folds a cancellable stream of text deltas into one reply
//! - **TurnCommitter**: appends user input and model replies to the graph
//! - **CommandTable**: `:`-prefixed meta commands matched by unambiguous prefix
//!
//! # Example
//!
//! ```
//! use aski_core::{ConversationGraph, Role};
//!
//! let mut graph = ConversationGraph::new();
//! graph.append_turn(Role::System, "You are terse.").unwrap();
//! let question = graph.append_turn(Role::User, "Hi?").unwrap().hash();
//! graph.append_turn(Role::Assistant, "Hello.").unwrap();
//!
//! // Rewind to the question and branch off with a different answer.
//! graph.change_head(&question.to_string()).unwrap();
//! graph.append_turn(Role::Assistant, "Hey.").unwrap();
//! assert_eq!(graph.active_path().len(), 3);
//! assert_eq!(graph.len(), 4);
//! ```

pub mod command;
mod commit;
mod error;
mod graph;
mod key;
mod node;
mod params;
mod persist;
mod store;
mod stream;
mod transport;

pub use commit::{Exchange, ExchangeError, FailurePolicy, TurnCommitter};
pub use error::{CodecError, HistoryError, TransportError};
pub use graph::ConversationGraph;
pub use key::{Key, SHORT_LEN};
pub use node::{MessageNode, Role};
pub use params::{DEFAULT_MODEL, RequestParams};
pub use persist::{MemoryPersistence, Persistence, SessionInfo, Snapshot};
pub use store::NodeStore;
pub use stream::{StreamAggregator, StreamOutcome, StreamState};
pub use transport::{DeltaStream, Edited, Editor, Summarizer, Transport};

/// Re-exported so callers share the token type the aggregator selects on.
pub use tokio_util::sync::CancellationToken;
