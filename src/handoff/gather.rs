//! Serializing a conversation branch into the stable textual format the
//! summary generator and the compact-hook adapter both consume.

use crate::provider::{ContentBlock, Message, Role};

/// Role-prefixed, block-flattened rendering of a message list.
///
/// Shared with the host's own compaction summarizer so that a handoff
/// summary and an in-place compaction summary read the same history the
/// same way.
#[must_use]
pub fn format_messages(messages: &[Message]) -> String {
    let mut parts = Vec::new();
    for msg in messages {
        let role_label = match msg.role {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::ToolResult => "Tool Result",
        };
        for block in msg.content.iter() {
            match block {
                ContentBlock::Text { text } => parts.push(format!("[{role_label}]: {text}")),
                ContentBlock::Thinking { thinking } => {
                    parts.push(format!("[{role_label} thinking]: {thinking}"));
                }
                ContentBlock::ToolCall { name, arguments, .. } => {
                    parts.push(format!("[Tool call: {name}({arguments})]"));
                }
                ContentBlock::ToolResult { content, is_error, .. } => {
                    let prefix = if *is_error { "Error" } else { "Result" };
                    parts.push(format!("[Tool {prefix}]: {content}"));
                }
                ContentBlock::Image { .. } => parts.push(format!("[{role_label}]: [image]")),
            }
        }
    }
    parts.join("\n\n")
}

/// Gather the current branch as a serialized conversation, or `None` if
/// there is nothing to hand off.
#[must_use]
pub fn gather_conversation(messages: &[Message]) -> Option<String> {
    if messages.is_empty() {
        return None;
    }
    Some(format_messages(messages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn text(role: Role, s: &str) -> Message {
        Message {
            role,
            content: Arc::new(vec![ContentBlock::Text { text: s.to_string() }]),
            timestamp: 0,
        }
    }

    #[test]
    fn test_format_messages() {
        let messages = vec![text(Role::User, "hello"), text(Role::Assistant, "hi")];
        let formatted = format_messages(&messages);
        assert!(formatted.contains("[User]: hello"));
        assert!(formatted.contains("[Assistant]: hi"));
    }

    #[test]
    fn test_gather_empty_is_none() {
        assert!(gather_conversation(&[]).is_none());
    }
}
