use std::collections::VecDeque;

use aski_core::{DeltaStream, TransportError};
use futures::{Stream, StreamExt, stream};
use serde_json::Value;
use tracing::warn;

use crate::error::ApiError;

/// One event decoded from a completion event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A fragment of the assistant's reply.
    Delta(String),
    /// The provider signalled the end of the reply.
    Done,
    /// An error object sent in place of a chunk.
    Error(String),
}

/// Maps one JSON `data:` payload to an event, or None to skip it.
pub type ChunkMapper = fn(&Value) -> Option<SseEvent>;

/// Incremental parser for SSE text streams.
///
/// Bytes are buffered until a full frame arrives, so multi-byte characters
/// split across network chunks decode correctly. What a payload means is
/// left to the provider's [`ChunkMapper`].
#[derive(Debug)]
pub struct SseParser {
    buffer: Vec<u8>,
    map: ChunkMapper,
}

impl SseParser {
    pub fn new(map: ChunkMapper) -> Self {
        Self {
            buffer: Vec::new(),
            map,
        }
    }

    /// Feed arbitrary bytes into the parser and drain complete events.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend(bytes.iter().filter(|b| **b != b'\r'));
        let mut events = Vec::new();

        while let Some(split) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let frame: Vec<u8> = self.buffer.drain(0..split + 2).collect();
            let frame = String::from_utf8_lossy(&frame[..split]);

            let Some(payload) = extract_data_payload(&frame) else {
                continue;
            };
            if payload == "[DONE]" {
                events.push(SseEvent::Done);
                continue;
            }
            match serde_json::from_str::<Value>(&payload) {
                Ok(value) => events.extend((self.map)(&value)),
                Err(e) => events.push(SseEvent::Error(format!("malformed chunk: {e}"))),
            }
        }

        events
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }
}

fn extract_data_payload(frame: &str) -> Option<String> {
    let data_lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

struct DeltaState<S> {
    bytes: S,
    parser: SseParser,
    pending: VecDeque<SseEvent>,
    finished: bool,
}

/// Turns a raw SSE byte stream into text deltas.
///
/// The stream ends at [`SseEvent::Done`] or when the connection closes. An
/// error event, a transport error or a truncated frame yields one `Err` and
/// ends the stream.
pub fn delta_stream<S, B, E>(bytes: S, map: ChunkMapper) -> DeltaStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    let state = DeltaState {
        bytes: Box::pin(bytes),
        parser: SseParser::new(map),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if st.finished {
                return None;
            }

            if let Some(event) = st.pending.pop_front() {
                match event {
                    SseEvent::Delta(text) => return Some((Ok(text), st)),
                    SseEvent::Done => {
                        st.finished = true;
                        return None;
                    }
                    SseEvent::Error(message) => {
                        st.finished = true;
                        let err = ApiError::Stream(message);
                        return Some((Err(TransportError::from(err)), st));
                    }
                }
            }

            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    let events = st.parser.feed(chunk.as_ref());
                    st.pending.extend(events);
                }
                Some(Err(e)) => {
                    st.finished = true;
                    let err: ApiError = e.into();
                    return Some((Err(TransportError::from(err)), st));
                }
                None => {
                    st.finished = true;
                    if st.parser.is_empty_buffer() {
                        return None;
                    }
                    warn!("connection closed inside an event");
                    let err = ApiError::Stream("connection closed mid-event".into());
                    return Some((Err(TransportError::from(err)), st));
                }
            }
        }
    })
    .boxed()
}
