use aski_core::{MessageNode, Role};

/// Instruction appended after the transcript when asking for a title.
pub const SUMMARY_INSTRUCTION: &str = "Give only this conversation a short title in the language of the conversation in one line, without symbols.";

/// Number of trailing turns a summary looks at.
const SUMMARY_WINDOW: usize = 2;

/// Renders the last two turns of `path` as `role says :content` lines.
///
/// System turns inside the window are skipped.
pub fn transcript(path: &[&MessageNode]) -> String {
    let start = path.len().saturating_sub(SUMMARY_WINDOW);
    path[start..]
        .iter()
        .filter(|n| n.role() != Role::System)
        .map(|n| format!("{} says :{}\n", n.role(), n.content()))
        .collect()
}

/// Strips the punctuation models like to wrap titles in.
pub fn clean_title(raw: &str) -> String {
    raw.replace(['.', '"'], "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(turns: &[(Role, &str)]) -> Vec<MessageNode> {
        let mut parent = None;
        turns
            .iter()
            .map(|(role, content)| {
                let node = MessageNode::new(*role, *content, parent);
                parent = Some(node.hash());
                node
            })
            .collect()
    }

    #[test]
    fn transcript_uses_last_two_non_system_turns() {
        let nodes = chain(&[
            (Role::System, "sys"),
            (Role::User, "first"),
            (Role::Assistant, "second"),
            (Role::User, "third"),
        ]);
        let path: Vec<_> = nodes.iter().collect();

        assert_eq!(
            transcript(&path),
            "assistant says :second\nuser says :third\n"
        );
        assert_eq!(transcript(&path[..2]), "user says :first\n");
    }

    #[test]
    fn clean_title_strips_dots_and_quotes() {
        assert_eq!(clean_title("\"Rust lifetimes.\"\n"), "Rust lifetimes");
    }
}
