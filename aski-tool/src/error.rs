use aski_core::HistoryError;
use aski_rocks::RocksError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AskiError {
    #[error("API key not found. Set {0} or configure ~/.config/aski/config.toml")]
    ApiKeyNotFound(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] RocksError),

    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    #[error("Invalid session name: {0:?}")]
    InvalidSession(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

impl From<std::convert::Infallible> for AskiError {
    fn from(e: std::convert::Infallible) -> Self {
        match e {}
    }
}
