use std::fmt::Write as _;

use thiserror::Error;
use tracing::info;

use crate::error::{HistoryError, TransportError};
use crate::graph::ConversationGraph;
use crate::key::Key;
use crate::transport::{Editor, Summarizer};

/// Marks input as a command rather than a user turn.
pub const PREFIX: char = ':';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    History,
    Summary,
    Move,
    Config,
    Editor,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: CommandKind,
}

pub const COMMANDS: &[CommandEntry] = &[
    CommandEntry {
        name: "history",
        description: "Show conversation history.",
        kind: CommandKind::History,
    },
    CommandEntry {
        name: "summary",
        description: "Show conversation summary.",
        kind: CommandKind::Summary,
    },
    CommandEntry {
        name: "move",
        description: "Change HEAD to another message.",
        kind: CommandKind::Move,
    },
    CommandEntry {
        name: "config",
        description: "Open configuration directory.",
        kind: CommandKind::Config,
    },
    CommandEntry {
        name: "editor",
        description: "Open an external text editor.",
        kind: CommandKind::Editor,
    },
    CommandEntry {
        name: "exit",
        description: "Exit the program.",
        kind: CommandKind::Exit,
    },
];

/// A parsed command with its argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    History,
    Summary,
    Move(String),
    Config,
    Editor,
    Exit,
}

/// What the session loop should do after a command ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Render the active path.
    History,
    /// Render this summary.
    Summary(String),
    /// HEAD moved to this node.
    Moved(Key),
    /// Submit this text as the next user turn.
    Submit(String),
    /// The editor was closed without changes.
    Unchanged,
    /// Open the configuration directory.
    OpenConfig,
    Exit,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command.\n\n{help}")]
    UnknownCommand { input: String, help: String },

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error("summary failed: {0}")]
    Summary(#[from] TransportError),

    #[error("editor failed: {0}")]
    Editor(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A fixed set of commands matched by unambiguous prefix.
#[derive(Debug, Clone, Copy)]
pub struct CommandTable<'a> {
    entries: &'a [CommandEntry],
}

impl Default for CommandTable<'static> {
    fn default() -> Self {
        Self { entries: COMMANDS }
    }
}

impl<'a> CommandTable<'a> {
    pub fn new(entries: &'a [CommandEntry]) -> Self {
        Self { entries }
    }

    /// Finds the only entry whose name starts with `token`.
    ///
    /// No match and several matches are both reported as unknown.
    pub fn resolve(&self, token: &str) -> Result<&'a CommandEntry, CommandError> {
        let mut found = None;
        for entry in self.entries {
            if entry.name.starts_with(token) {
                if found.is_some() {
                    return Err(self.unknown(token));
                }
                found = Some(entry);
            }
        }
        found.ok_or_else(|| self.unknown(token))
    }

    /// Parses input such as `:mo 3fa2` into a command.
    pub fn parse(&self, input: &str) -> Result<Command, CommandError> {
        let trimmed = input.trim();
        let body = trimmed.strip_prefix(PREFIX).unwrap_or(trimmed);
        let mut words = body.split_whitespace();
        let token = words.next().unwrap_or("");

        let entry = self.resolve(token)?;
        Ok(match entry.kind {
            CommandKind::History => Command::History,
            CommandKind::Summary => Command::Summary,
            CommandKind::Move => Command::Move(words.next().unwrap_or("").to_string()),
            CommandKind::Config => Command::Config,
            CommandKind::Editor => Command::Editor,
            CommandKind::Exit => Command::Exit,
        })
    }

    /// Renders the table as help text.
    pub fn help(&self) -> String {
        let mut out = String::new();
        for entry in self.entries {
            let name = format!("{}{}", PREFIX, entry.name);
            let _ = writeln!(out, "  {:<8} - {}", name, entry.description);
        }
        out
    }

    fn unknown(&self, token: &str) -> CommandError {
        CommandError::UnknownCommand {
            input: token.to_string(),
            help: self.help(),
        }
    }
}

/// Returns true if the input should go through the dispatcher.
pub fn is_command(input: &str) -> bool {
    input.trim_start().starts_with(PREFIX)
}

/// Runs a command against the graph.
///
/// The summary is produced by `summarizer` only when none is cached yet.
pub async fn dispatch<S, E>(
    command: Command,
    graph: &mut ConversationGraph,
    summarizer: &S,
    editor: &E,
) -> Result<Outcome, CommandError>
where
    S: Summarizer,
    E: Editor,
{
    match command {
        Command::History => Ok(Outcome::History),
        Command::Summary => {
            if let Some(summary) = graph.summary() {
                return Ok(Outcome::Summary(summary.to_string()));
            }
            let summary = summarizer.summarize(&graph.active_path()).await?;
            graph.set_summary(summary.clone());
            Ok(Outcome::Summary(summary))
        }
        Command::Move(partial) => {
            let hash = graph.change_head(&partial)?.hash();
            info!(%hash, "head moved by command");
            Ok(Outcome::Moved(hash))
        }
        Command::Editor => {
            let edited = editor
                .edit(&graph.active_path())
                .map_err(|e| CommandError::Editor(Box::new(e)))?;
            if edited.modified && !edited.text.trim().is_empty() {
                Ok(Outcome::Submit(edited.text))
            } else {
                Ok(Outcome::Unchanged)
            }
        }
        Command::Config => Ok(Outcome::OpenConfig),
        Command::Exit => Ok(Outcome::Exit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_prefix_resolves() {
        let table = CommandTable::default();
        assert_eq!(table.resolve("h").unwrap().kind, CommandKind::History);
        assert_eq!(table.resolve("mo").unwrap().kind, CommandKind::Move);
        assert_eq!(table.resolve("exit").unwrap().kind, CommandKind::Exit);
    }

    #[test]
    fn shared_prefix_is_unknown() {
        let table = CommandTable::default();
        // editor and exit both start with e
        assert!(matches!(
            table.resolve("e"),
            Err(CommandError::UnknownCommand { .. })
        ));
        assert!(matches!(
            table.resolve(""),
            Err(CommandError::UnknownCommand { .. })
        ));
    }

    #[test]
    fn no_match_is_unknown_with_help() {
        let err = CommandTable::default().resolve("quit").unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("unknown command."));
        assert!(text.contains(":history"));
        assert!(text.contains(":exit"));
    }

    #[test]
    fn adding_an_entry_makes_prefix_ambiguous() {
        let history_only = [COMMANDS[0]];
        let table = CommandTable::new(&history_only);
        assert_eq!(table.resolve("h").unwrap().name, "history");

        let with_help = [
            COMMANDS[0],
            CommandEntry {
                name: "help",
                description: "Show help.",
                kind: CommandKind::History,
            },
        ];
        let table = CommandTable::new(&with_help);
        assert!(matches!(
            table.resolve("h"),
            Err(CommandError::UnknownCommand { .. })
        ));
        assert_eq!(table.resolve("hi").unwrap().name, "history");
    }

    #[test]
    fn parse_move_with_and_without_argument() {
        let table = CommandTable::default();
        assert_eq!(
            table.parse(":move 3fa2").unwrap(),
            Command::Move("3fa2".into())
        );
        assert_eq!(table.parse("  :m  ").unwrap(), Command::Move(String::new()));
    }

    #[test]
    fn is_command_checks_prefix() {
        assert!(is_command(":history"));
        assert!(is_command("  :h"));
        assert!(!is_command("what is :history?"));
    }
}
