use std::io::Write;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{HistoryError, TransportError};
use crate::graph::ConversationGraph;
use crate::key::Key;
use crate::node::Role;
use crate::params::RequestParams;
use crate::stream::{StreamAggregator, StreamOutcome, StreamState};
use crate::transport::Transport;

/// What to do with text that arrived before a transport failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Commit nothing and move HEAD back to where the turn started.
    #[default]
    Discard,
    /// Commit the partial reply as if the stream had completed.
    KeepPartial,
}

/// Errors from one user/assistant exchange.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result of a finished exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub user: Key,
    /// The committed reply, if any.
    pub reply: Option<Key>,
    pub state: StreamState,
}

/// Appends user turns and model replies to a graph.
pub struct TurnCommitter<'g> {
    graph: &'g mut ConversationGraph,
    policy: FailurePolicy,
}

impl<'g> TurnCommitter<'g> {
    pub fn new(graph: &'g mut ConversationGraph, policy: FailurePolicy) -> Self {
        Self { graph, policy }
    }

    pub fn commit_user(&mut self, content: &str) -> Result<Key, HistoryError> {
        let hash = self.graph.append_turn(Role::User, content)?.hash();
        info!(%hash, "committed user turn");
        Ok(hash)
    }

    /// Commits the reply carried by a stream outcome.
    ///
    /// Completed replies are always committed. Cancelled replies are committed
    /// when something arrived before the interrupt. Failed replies follow the
    /// failure policy; the error is returned either way.
    pub fn commit_reply(&mut self, outcome: StreamOutcome) -> Result<Option<Key>, ExchangeError> {
        match outcome {
            StreamOutcome::Completed(text) => Ok(Some(self.commit_assistant(text)?)),
            StreamOutcome::Cancelled(text) if text.is_empty() => {
                info!("cancelled before any output; nothing committed");
                Ok(None)
            }
            StreamOutcome::Cancelled(text) => Ok(Some(self.commit_assistant(text)?)),
            StreamOutcome::Failed { error, partial } => {
                if self.policy == FailurePolicy::KeepPartial && !partial.is_empty() {
                    self.commit_assistant(partial)?;
                }
                Err(error.into())
            }
        }
    }

    fn commit_assistant(&mut self, text: String) -> Result<Key, HistoryError> {
        let hash = self.graph.append_turn(Role::Assistant, text)?.hash();
        info!(%hash, "committed reply");
        Ok(hash)
    }

    /// Runs a full turn: commit the input, stream the reply, commit the reply.
    ///
    /// When the reply fails under [`FailurePolicy::Discard`], HEAD returns to
    /// the node it was on before the input was committed, so submitting the
    /// same input again reuses the existing user node.
    pub async fn exchange<T, W>(
        &mut self,
        input: &str,
        transport: &T,
        params: &RequestParams,
        cancel: &CancellationToken,
        echo: W,
    ) -> Result<Exchange, ExchangeError>
    where
        T: Transport,
        W: Write,
    {
        let before = self.graph.head();
        let user = self.commit_user(input)?;

        let outcome = {
            let path = self.graph.active_path();
            StreamAggregator::new(echo)
                .run(transport, &path, params, cancel)
                .await
        };
        let state = outcome.state();

        match self.commit_reply(outcome) {
            Ok(reply) => Ok(Exchange { user, reply, state }),
            Err(e) => {
                if self.policy == FailurePolicy::Discard {
                    warn!(error = %e, "reply failed; restoring head");
                    self.graph.set_head(before)?;
                }
                Err(e)
            }
        }
    }
}
