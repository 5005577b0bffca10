use std::fmt::Write as _;
use std::io::{self, Write};
use std::process::Command;

use aski_core::{Edited, Editor, MessageNode};
use tracing::debug;

/// Opens `$EDITOR` on a temp file seeded with the active path as comments.
pub struct ExternalEditor {
    program: String,
}

impl ExternalEditor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn from_env() -> Self {
        match std::env::var("EDITOR") {
            Ok(program) if !program.trim().is_empty() => Self::new(program),
            _ if cfg!(windows) => Self::new("notepad.exe"),
            _ => Self::new("vim"),
        }
    }

    fn command(&self) -> Command {
        let mut words = self.program.split_whitespace();
        let mut command = Command::new(words.next().unwrap_or("vim"));
        command.args(words);
        // VS Code returns immediately unless told to wait
        if self.program.contains("code") && !self.program.contains("--wait") {
            command.arg("--wait");
        }
        command
    }
}

/// Renders the path newest first as `#` comments below two blank lines.
pub fn template(path: &[&MessageNode]) -> String {
    let mut out = String::from("\n\n");
    for (i, node) in path.iter().enumerate().rev() {
        let parent = node.parent().map(|p| p.short()).unwrap_or_default();
        let head = if i + 1 == path.len() { "Head" } else { "" };
        let _ = writeln!(out, "#");
        let _ = writeln!(
            out,
            "# {} -> {} [{}] {}",
            node.hash().short(),
            parent,
            node.role(),
            head
        );
        for line in node.content().split('\n') {
            let _ = writeln!(out, "#   {line}");
        }
    }
    out
}

/// Drops comment lines; a blank remainder counts as unmodified.
pub fn strip_comments(text: &str) -> Edited {
    let kept: Vec<&str> = text.lines().filter(|l| !l.starts_with('#')).collect();
    let body = kept.join("\n");
    let body = body.trim();
    if body.is_empty() {
        return Edited::unchanged();
    }
    Edited {
        text: body.to_string(),
        modified: true,
    }
}

impl Editor for ExternalEditor {
    type Error = io::Error;

    fn edit(&self, path: &[&MessageNode]) -> Result<Edited, Self::Error> {
        let mut file = tempfile::Builder::new()
            .prefix("aski-editor-")
            .suffix(".txt")
            .tempfile()?;
        file.write_all(template(path).as_bytes())?;
        file.flush()?;

        debug!(program = %self.program, path = %file.path().display(), "launching editor");
        let status = self.command().arg(file.path()).status()?;
        if !status.success() {
            return Err(io::Error::other(format!("editor exited with {status}")));
        }

        let text = std::fs::read_to_string(file.path())?;
        Ok(strip_comments(&text))
    }
}
