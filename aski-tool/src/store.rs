use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use aski_core::{ConversationGraph, Persistence, Role};
use aski_rocks::RocksHistory;
use tracing::info;

use crate::config::Profile;
use crate::error::AskiError;

pub fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("aski")
        .join("store")
}

pub fn open_store(path: &Path) -> Result<RocksHistory, AskiError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(RocksHistory::open(path)?)
}

/// Names a fresh session after the current time.
pub fn new_session_name() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("session-{secs}")
}

/// Session names become key segments, so `/` and blanks are rejected.
pub fn validate_session_name(name: &str) -> Result<(), AskiError> {
    if name.is_empty() || name.contains('/') || name.chars().any(char::is_whitespace) {
        return Err(AskiError::InvalidSession(name.to_string()));
    }
    Ok(())
}

pub fn load_session<P>(store: &P, name: &str) -> Result<ConversationGraph, AskiError>
where
    P: Persistence,
    AskiError: From<P::Error>,
{
    validate_session_name(name)?;
    let snapshot = store
        .load(name)?
        .ok_or_else(|| AskiError::SessionNotFound(name.to_string()))?;
    let graph = ConversationGraph::from_snapshot(snapshot)?;
    info!(session = name, nodes = graph.len(), "session loaded");
    Ok(graph)
}

/// Builds the opening turns of a new conversation.
///
/// `system` replaces the profile's system context when given. An empty
/// system context adds no system turn.
pub fn seed_graph(profile: &Profile, system: Option<&str>) -> Result<ConversationGraph, AskiError> {
    let mut graph = ConversationGraph::new();

    let system = system.unwrap_or(&profile.system_context);
    if !system.trim().is_empty() {
        graph.append_turn(Role::System, system)?;
    }
    for message in &profile.messages {
        graph.append_turn(message.role, message.content.as_str())?;
    }

    Ok(graph)
}
