use std::io::{self, Write};

use aski_core::{ConversationGraph, MessageNode, SessionInfo};
use crossterm::style::Stylize;

const HEAD_MARK: &str = "Head";

fn parent_label(node: &MessageNode) -> String {
    node.parent()
        .map(|p| p.short())
        .unwrap_or_else(|| "root".to_string())
}

fn content<W: Write>(out: &mut W, text: &str) -> io::Result<()> {
    for line in text.split('\n') {
        writeln!(out, "  {line}")?;
    }
    Ok(())
}

/// Prints the active path, oldest first, marking HEAD.
pub fn history<W: Write>(out: &mut W, graph: &ConversationGraph) -> io::Result<()> {
    for node in graph.active_path() {
        let header = format!(
            "{} -> {} [{}]",
            node.hash().short(),
            parent_label(node),
            node.role()
        );
        let mark = if graph.is_head(&node.hash()) {
            HEAD_MARK
        } else {
            ""
        };
        writeln!(out, "{} {}", header.yellow(), mark.blue())?;
        content(out, node.content())?;
        writeln!(out)?;
    }
    Ok(())
}

/// Prints the node HEAD just moved to.
pub fn moved<W: Write>(out: &mut W, node: &MessageNode) -> io::Result<()> {
    let header = format!("{} [{}]", node.hash().short(), node.role());
    writeln!(out, "{} {}", header.yellow(), HEAD_MARK.blue())?;
    content(out, node.content())
}

pub fn summary<W: Write>(out: &mut W, text: &str) -> io::Result<()> {
    writeln!(out, "{}", text.blue())
}

pub fn sessions<W: Write>(out: &mut W, sessions: &[SessionInfo]) -> io::Result<()> {
    for session in sessions {
        let head = session.head.map(|h| h.short()).unwrap_or_default();
        let summary = session.summary.as_deref().unwrap_or("");
        writeln!(out, "{:<24} {} {}", session.name, format!("{head:<6}").yellow(), summary)?;
    }
    Ok(())
}

pub fn notice(text: &str) {
    eprintln!("{}", text.dark_grey());
}

pub fn error(err: &dyn std::error::Error) {
    eprintln!("{} {}", "Error:".red(), err);
}

pub fn prompt<W: Write>(out: &mut W) -> io::Result<()> {
    write!(out, "{} ", ">".green())?;
    out.flush()
}
