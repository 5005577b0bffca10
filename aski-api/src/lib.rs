//! Chat completion transports for aski.
//!
//! [`OpenAiClient`] and [`AnthropicClient`] implement [`aski_core::Transport`]
//! by sending the active path to their provider. In streaming mode the reply
//! arrives as server-sent events and is forwarded chunk by chunk; in REST mode
//! the whole reply is delivered as a single delta. Both also implement
//! [`aski_core::Summarizer`] by asking a small model for a one-line title.
//!
//! # Example
//!
//! ```ignore
//! use aski_core::{CancellationToken, ConversationGraph, FailurePolicy, RequestParams, Role, TurnCommitter};
//! use aski_api::OpenAiClient;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = OpenAiClient::new("your-api-key");
//!     let mut graph = ConversationGraph::new();
//!     graph.append_turn(Role::System, "You are terse.").unwrap();
//!
//!     let mut committer = TurnCommitter::new(&mut graph, FailurePolicy::Discard);
//!     let cancel = CancellationToken::new();
//!     committer
//!         .exchange("Hello!", &client, &RequestParams::default(), &cancel, std::io::stdout())
//!         .await
//!         .unwrap();
//! }
//! ```

pub mod anthropic;
pub mod openai;

mod error;
mod sse;
mod summary;

pub use anthropic::AnthropicClient;
pub use error::ApiError;
pub use openai::OpenAiClient;
pub use sse::{ChunkMapper, SseEvent, SseParser, delta_stream};
pub use summary::{SUMMARY_INSTRUCTION, clean_title, transcript};
