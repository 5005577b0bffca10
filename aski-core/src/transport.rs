use std::future::Future;

use futures::stream::BoxStream;

use crate::error::TransportError;
use crate::node::MessageNode;
use crate::params::RequestParams;

/// Text deltas of one model reply, ending at end-of-stream or an error.
pub type DeltaStream = BoxStream<'static, Result<String, TransportError>>;

/// A remote completion API.
///
/// Implementations only see the active path and the parameters; request
/// shapes, authentication and retries are their own business.
pub trait Transport: Send + Sync {
    fn submit(
        &self,
        path: &[&MessageNode],
        params: &RequestParams,
    ) -> impl Future<Output = Result<DeltaStream, TransportError>> + Send;
}

/// Produces a short description of a conversation.
pub trait Summarizer: Send + Sync {
    fn summarize(
        &self,
        path: &[&MessageNode],
    ) -> impl Future<Output = Result<String, TransportError>> + Send;
}

/// Result of an editor session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edited {
    pub text: String,
    pub modified: bool,
}

impl Edited {
    pub fn unchanged() -> Self {
        Edited {
            text: String::new(),
            modified: false,
        }
    }
}

/// A blocking, interactive text editor.
pub trait Editor {
    type Error: std::error::Error + Send + Sync + 'static;

    fn edit(&self, path: &[&MessageNode]) -> Result<Edited, Self::Error>;
}
