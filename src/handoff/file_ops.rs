//! Derives a compact record of touched files from tool-call history alone.

use crate::provider::{ContentBlock, Message, Role};
use std::collections::{BTreeSet, HashMap};

/// Collapsed markers plus the expansion each one stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOps {
    pub markers_text: String,
    pub expansions: HashMap<String, String>,
}

/// Walk assistant messages for `read` / `write` / `edit` tool calls whose
/// arguments carry a string `path`, and build the collapsed-marker output.
///
/// Returns `None` if no file operations were found.
#[must_use]
pub fn extract_file_ops(messages: &[Message]) -> Option<FileOps> {
    let mut read: BTreeSet<String> = BTreeSet::new();
    let mut written: BTreeSet<String> = BTreeSet::new();
    let mut edited: BTreeSet<String> = BTreeSet::new();

    for message in messages {
        if message.role != Role::Assistant {
            continue;
        }
        for block in message.content.iter() {
            let ContentBlock::ToolCall { name, arguments, .. } = block else {
                continue;
            };
            let Some(path) = arguments.get("path").and_then(|v| v.as_str()) else {
                continue;
            };
            match name.as_str() {
                "read" => {
                    read.insert(path.to_string());
                }
                "write" => {
                    written.insert(path.to_string());
                }
                "edit" => {
                    edited.insert(path.to_string());
                }
                _ => {}
            }
        }
    }

    let modified: BTreeSet<String> = written.union(&edited).cloned().collect();
    let read_only: BTreeSet<String> = read.difference(&modified).cloned().collect();

    if read_only.is_empty() && modified.is_empty() {
        return None;
    }

    let mut markers = Vec::new();
    let mut expansions = HashMap::new();

    if !read_only.is_empty() {
        let marker = collapsed_marker(read_only.len(), "read");
        let expansion = tagged_block("read-files", &read_only);
        expansions.insert(marker.clone(), expansion);
        markers.push(marker);
    }
    if !modified.is_empty() {
        let marker = collapsed_marker(modified.len(), "modified");
        let expansion = tagged_block("modified-files", &modified);
        expansions.insert(marker.clone(), expansion);
        markers.push(marker);
    }

    Some(FileOps {
        markers_text: markers.join(" "),
        expansions,
    })
}

fn collapsed_marker(count: usize, verb: &str) -> String {
    let noun = if count == 1 { "filename" } else { "filenames" };
    format!("[+{count} {verb} {noun}]")
}

fn tagged_block(tag: &str, paths: &BTreeSet<String>) -> String {
    let body = paths.iter().cloned().collect::<Vec<_>>().join("\n");
    format!("<{tag}>\n{body}\n</{tag}>")
}
