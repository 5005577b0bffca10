use std::io::Write;

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::node::MessageNode;
use crate::params::RequestParams;
use crate::transport::Transport;

/// Lifecycle of one streamed reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Requesting,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl StreamState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamState::Completed | StreamState::Cancelled | StreamState::Failed
        )
    }
}

/// How a streamed reply ended, with everything accumulated up to that point.
#[derive(Debug)]
pub enum StreamOutcome {
    /// The provider signalled end-of-stream.
    Completed(String),
    /// The user interrupted; the text is whatever arrived before that.
    Cancelled(String),
    /// The transport failed; `partial` is what arrived before the error.
    Failed {
        error: TransportError,
        partial: String,
    },
}

impl StreamOutcome {
    pub fn state(&self) -> StreamState {
        match self {
            StreamOutcome::Completed(_) => StreamState::Completed,
            StreamOutcome::Cancelled(_) => StreamState::Cancelled,
            StreamOutcome::Failed { .. } => StreamState::Failed,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            StreamOutcome::Completed(text) | StreamOutcome::Cancelled(text) => text,
            StreamOutcome::Failed { partial, .. } => partial,
        }
    }
}

/// Folds incremental model output into one reply.
///
/// Each chunk is appended to the buffer in arrival order and written to
/// `echo` straight away. Cancellation wins over a chunk that is ready at the
/// same moment. The aggregator is consumed by a run, so every run reaches
/// exactly one terminal state.
pub struct StreamAggregator<W> {
    state: StreamState,
    buffer: String,
    echo: W,
}

impl<W: Write> StreamAggregator<W> {
    pub fn new(echo: W) -> Self {
        Self {
            state: StreamState::Idle,
            buffer: String::new(),
            echo,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Submits the path to the transport and aggregates the reply.
    pub async fn run<T: Transport>(
        mut self,
        transport: &T,
        path: &[&MessageNode],
        params: &RequestParams,
        cancel: &CancellationToken,
    ) -> StreamOutcome {
        self.transition(StreamState::Requesting);

        let submitted = tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.cancelled(),
            result = transport.submit(path, params) => result,
        };

        match submitted {
            Ok(deltas) => self.drive(deltas, cancel).await,
            Err(error) => self.failed(error),
        }
    }

    /// Aggregates an already opened delta stream.
    pub async fn drive<S>(mut self, mut deltas: S, cancel: &CancellationToken) -> StreamOutcome
    where
        S: Stream<Item = Result<String, TransportError>> + Unpin,
    {
        if self.state == StreamState::Idle {
            self.transition(StreamState::Requesting);
        }

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.cancelled(),
                next = deltas.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    if self.state == StreamState::Requesting {
                        self.transition(StreamState::Streaming);
                    }
                    self.push(&chunk);
                }
                Some(Err(error)) => return self.failed(error),
                None => return self.completed(),
            }
        }
    }

    fn push(&mut self, chunk: &str) {
        self.buffer.push_str(chunk);
        if let Err(e) = self
            .echo
            .write_all(chunk.as_bytes())
            .and_then(|_| self.echo.flush())
        {
            warn!(error = %e, "failed to echo chunk");
        }
    }

    fn transition(&mut self, next: StreamState) {
        debug!(from = ?self.state, to = ?next, "stream state");
        self.state = next;
    }

    fn completed(mut self) -> StreamOutcome {
        self.transition(StreamState::Completed);
        info!(len = self.buffer.len(), "stream completed");
        StreamOutcome::Completed(self.buffer)
    }

    fn cancelled(mut self) -> StreamOutcome {
        self.transition(StreamState::Cancelled);
        info!(len = self.buffer.len(), "stream cancelled");
        StreamOutcome::Cancelled(self.buffer)
    }

    fn failed(mut self, error: TransportError) -> StreamOutcome {
        self.transition(StreamState::Failed);
        warn!(error = %error, len = self.buffer.len(), "stream failed");
        StreamOutcome::Failed {
            error,
            partial: self.buffer,
        }
    }
}
