//! Append-only, file-based session journal.
//!
//! Each session is one JSONL file. The first line is always a header
//! naming an optional parent session; the ancestry walker reads only that
//! line, never the rest of the file, so following a long parent chain
//! costs O(depth) bytes rather than O(total history).

use crate::provider::{ContentBlock, Message, Role};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

use super::generate_session_id;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("session not found: {0}")]
    NotFound(String),

    #[error("malformed session header in {0}")]
    InvalidHeader(PathBuf),
}

/// The first line of every session file.
#[derive(Debug, Clone, Default)]
pub struct SessionHeader {
    pub parent_session: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Entry {
    Session {
        #[serde(rename = "parentSession", skip_serializing_if = "Option::is_none")]
        parent_session: Option<PathBuf>,
    },
    Message {
        message: Message,
    },
    Summary {
        text: String,
        cutoff: i64,
    },
}

/// Listing-friendly projection of a session file.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: String,
    pub path: PathBuf,
    pub updated_at: i64,
    pub first_user_message: Option<String>,
}

pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Open or create a session directory.
    pub fn open(dir: &Path) -> Result<Self, SessionStoreError> {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Create a new session file, writing its header line, and return its path.
    pub fn create_session(&self, parent: Option<&Path>) -> Result<(String, PathBuf), SessionStoreError> {
        let id = generate_session_id();
        let path = self.dir.join(format!("{id}.jsonl"));
        let header = Entry::Session {
            parent_session: parent.map(Path::to_path_buf),
        };
        let mut file = File::create(&path)?;
        writeln!(file, "{}", serde_json::to_string(&header)?)?;
        Ok((id, path))
    }

    pub fn append_message(&self, path: &Path, message: &Message) -> Result<(), SessionStoreError> {
        let entry = Entry::Message {
            message: message.clone(),
        };
        let mut file = OpenOptions::new().append(true).open(path)?;
        writeln!(file, "{}", serde_json::to_string(&entry)?)?;
        Ok(())
    }

    pub fn record_summary(
        &self,
        path: &Path,
        text: &str,
        cutoff: i64,
    ) -> Result<(), SessionStoreError> {
        let entry = Entry::Summary {
            text: text.to_string(),
            cutoff,
        };
        let mut file = OpenOptions::new().append(true).open(path)?;
        writeln!(file, "{}", serde_json::to_string(&entry)?)?;
        Ok(())
    }

    /// Read only the first line of a session file and parse it as a header.
    ///
    /// Free function (no `&self`) so the ancestry walker can call it
    /// against paths that may not belong to this store's directory, such
    /// as a parent session recorded before a session directory moved.
    pub fn read_header(path: &Path) -> Result<SessionHeader, SessionStoreError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut line = String::new();
        reader.read_line(&mut line)?;
        let entry: Entry =
            serde_json::from_str(line.trim_end()).map_err(|_| SessionStoreError::InvalidHeader(path.to_path_buf()))?;
        match entry {
            Entry::Session { parent_session } => Ok(SessionHeader { parent_session }),
            _ => Err(SessionStoreError::InvalidHeader(path.to_path_buf())),
        }
    }

    /// Read the current branch: every message after the most recent
    /// summary entry (or from the start, if there is none).
    pub fn branch(&self, path: &Path) -> Result<Vec<Message>, SessionStoreError> {
        if !path.exists() {
            return Err(SessionStoreError::NotFound(path.display().to_string()));
        }
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut messages = Vec::new();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if i == 0 || line.trim().is_empty() {
                continue;
            }
            let entry: Entry = serde_json::from_str(&line)?;
            match entry {
                Entry::Message { message } => messages.push(message),
                Entry::Summary { text, cutoff } => {
                    messages.clear();
                    messages.push(Message {
                        role: Role::Assistant,
                        content: std::sync::Arc::new(vec![ContentBlock::Text { text }]),
                        timestamp: cutoff,
                    });
                }
                Entry::Session { .. } => {}
            }
        }
        Ok(messages)
    }

    pub fn list_recent(&self, limit: usize) -> Result<Vec<SessionSummary>, SessionStoreError> {
        let mut summaries = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            let updated_at = entry
                .metadata()?
                .modified()?
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);
            let first_user_message = self.branch(&path).ok().and_then(|msgs| {
                msgs.into_iter().find(|m| m.role == Role::User).map(|m| {
                    m.content
                        .iter()
                        .filter_map(|b| match b {
                            ContentBlock::Text { text } => Some(text.clone()),
                            _ => None,
                        })
                        .collect::<Vec<_>>()
                        .join(" ")
                })
            });
            summaries.push(SessionSummary {
                id,
                path,
                updated_at,
                first_user_message,
            });
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries.truncate(limit);
        Ok(summaries)
    }

    /// Delete session files whose last modification is older than `days`.
    pub fn cleanup_old_sessions(&self, days: u64) -> Result<usize, SessionStoreError> {
        if days == 0 {
            return Ok(0);
        }
        let cutoff = SystemTime::now() - std::time::Duration::from_secs(days * 86_400);
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            if entry.metadata()?.modified()? < cutoff {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn msg(role: Role, text: &str, ts: i64) -> Message {
        Message {
            role,
            content: Arc::new(vec![ContentBlock::Text {
                text: text.to_string(),
            }]),
            timestamp: ts,
        }
    }

    #[test]
    fn test_create_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        let (_, path) = store.create_session(None).unwrap();
        store
            .append_message(&path, &msg(Role::User, "hello", 1))
            .unwrap();
        store
            .append_message(&path, &msg(Role::Assistant, "hi", 2))
            .unwrap();
        let branch = store.branch(&path).unwrap();
        assert_eq!(branch.len(), 2);
    }

    #[test]
    fn test_header_no_parent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        let (_, path) = store.create_session(None).unwrap();
        let header = SessionStore::read_header(&path).unwrap();
        assert!(header.parent_session.is_none());
    }

    #[test]
    fn test_header_with_parent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        let (_, parent_path) = store.create_session(None).unwrap();
        let (_, child_path) = store.create_session(Some(&parent_path)).unwrap();
        let header = SessionStore::read_header(&child_path).unwrap();
        assert_eq!(header.parent_session, Some(parent_path));
    }

    #[test]
    fn test_branch_respects_summary_cutoff() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        let (_, path) = store.create_session(None).unwrap();
        store
            .append_message(&path, &msg(Role::User, "first", 1))
            .unwrap();
        store
            .append_message(&path, &msg(Role::Assistant, "second", 2))
            .unwrap();
        store.record_summary(&path, "summarized so far", 2).unwrap();
        store
            .append_message(&path, &msg(Role::User, "third", 3))
            .unwrap();
        let branch = store.branch(&path).unwrap();
        assert_eq!(branch.len(), 2);
        assert_eq!(branch[1].timestamp, 3);
    }

    #[test]
    fn test_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        let result = store.branch(&dir.path().join("missing.jsonl"));
        assert!(matches!(result, Err(SessionStoreError::NotFound(_))));
    }

    #[test]
    fn test_list_recent_orders_by_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        let (_, p1) = store.create_session(None).unwrap();
        store.append_message(&p1, &msg(Role::User, "a", 1)).unwrap();
        let (_, p2) = store.create_session(None).unwrap();
        store.append_message(&p2, &msg(Role::User, "b", 1)).unwrap();
        let recent = store.list_recent(10).unwrap();
        assert_eq!(recent.len(), 2);
    }

    #[test]
    fn test_cleanup_zero_days_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        store.create_session(None).unwrap();
        assert_eq!(store.cleanup_old_sessions(0).unwrap(), 0);
    }
}
