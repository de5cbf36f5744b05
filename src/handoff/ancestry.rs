//! Walks a session's parent chain, reading only the header line of each
//! file so the walk costs O(depth) bytes, not O(total history).

use crate::session::SessionStore;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Starting from `start` (typically the immediate parent of the session
/// being handed off from), follow `parentSession` headers until the chain
/// ends, a file is missing, the header is malformed, or a cycle is
/// detected.
#[must_use]
pub fn walk_ancestry(start: &Path) -> Vec<PathBuf> {
    let mut chain = Vec::new();
    let mut visited = HashSet::new();
    let mut current = start.to_path_buf();

    loop {
        if visited.contains(&current) {
            break;
        }
        visited.insert(current.clone());
        chain.push(current.clone());

        let Ok(header) = SessionStore::read_header(&current) else {
            break;
        };
        match header.parent_session {
            Some(parent) => current = parent,
            None => break,
        }
    }

    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStore;

    #[test]
    fn test_walks_linear_chain() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        let (_, root) = store.create_session(None).unwrap();
        let (_, middle) = store.create_session(Some(&root)).unwrap();
        let (_, leaf) = store.create_session(Some(&middle)).unwrap();

        let chain = walk_ancestry(&middle);
        assert_eq!(chain, vec![middle.clone(), root.clone()]);

        let full_chain = walk_ancestry(&leaf);
        assert_eq!(full_chain, vec![leaf, middle, root]);
    }

    #[test]
    fn test_missing_file_terminates() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist.jsonl");
        assert_eq!(walk_ancestry(&missing), vec![missing]);
    }

    #[test]
    fn test_cycle_terminates() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.jsonl");
        let b = dir.path().join("b.jsonl");
        std::fs::write(
            &a,
            format!(
                "{{\"type\":\"session\",\"parentSession\":{:?}}}\n",
                b.display().to_string()
            ),
        )
        .unwrap();
        std::fs::write(
            &b,
            format!(
                "{{\"type\":\"session\",\"parentSession\":{:?}}}\n",
                a.display().to_string()
            ),
        )
        .unwrap();

        let chain = walk_ancestry(&a);
        assert_eq!(chain.len(), 2);
    }
}
