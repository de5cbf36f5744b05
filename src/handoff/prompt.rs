//! Assembles the editor-ready handoff prompt from a summary, optional file
//! operations, and an optional ancestry chain.

use super::file_ops::FileOps;
use std::path::Path;

const SKILL_DIRECTIVE: &str = "/skill:pi-session-query";

#[must_use]
pub fn assemble_prompt(summary_text: &str, file_ops: Option<&FileOps>, ancestry: &[&Path]) -> String {
    let mut body = summary_text.to_string();
    if let Some(ops) = file_ops {
        body.push_str("\n\n");
        body.push_str(&ops.markers_text);
    }

    let Some((parent, ancestors)) = ancestry.split_first() else {
        return body;
    };

    let mut header = format!("{SKILL_DIRECTIVE}\n\n**Parent session:** `{}`\n", parent.display());
    if !ancestors.is_empty() {
        header.push_str("\n**Ancestor sessions:**\n");
        for path in ancestors {
            header.push_str(&format!("- `{}`\n", path.display()));
        }
    }
    header.push('\n');
    header.push_str(&body);
    header
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_no_parent_omits_header() {
        let prompt = assemble_prompt("summary body", None, &[]);
        assert_eq!(prompt, "summary body");
        assert!(!prompt.contains("Parent session"));
        assert!(!prompt.contains("/skill:"));
    }

    #[test]
    fn test_single_parent() {
        let parent = Path::new("/sessions/a.jsonl");
        let prompt = assemble_prompt("summary body", None, &[parent]);
        assert!(prompt.starts_with(SKILL_DIRECTIVE));
        assert!(prompt.contains("**Parent session:** `/sessions/a.jsonl`"));
        assert!(!prompt.contains("Ancestor sessions"));
    }

    #[test]
    fn test_multiple_ancestors() {
        let parent = Path::new("/sessions/a.jsonl");
        let grandparent = Path::new("/sessions/root.jsonl");
        let prompt = assemble_prompt("summary body", None, &[parent, grandparent]);
        assert!(prompt.contains("**Ancestor sessions:**"));
        assert!(prompt.contains("- `/sessions/root.jsonl`"));
    }

    #[test]
    fn test_includes_markers() {
        let ops = FileOps {
            markers_text: "[+1 read filename]".to_string(),
            expansions: HashMap::new(),
        };
        let prompt = assemble_prompt("summary body", Some(&ops), &[]);
        assert!(prompt.contains("[+1 read filename]"));
    }
}
