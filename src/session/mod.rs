mod store;

pub use store::{SessionHeader, SessionStore, SessionStoreError, SessionSummary};

use crate::provider::Message;
use chrono::Local;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct Session {
    pub id: String,
    pub path: PathBuf,
    pub working_dir: PathBuf,
    pub model: String,
    pub messages: Vec<Message>,
    pub abort_token: CancellationToken,
}

/// Generate a session id: `YYYYMMDD-HHMMSS-xxxx` (timestamp + 4-char random suffix).
fn generate_session_id() -> String {
    let timestamp = Local::now().format("%Y%m%d-%H%M%S");
    let suffix = &uuid::Uuid::new_v4().to_string()[..4];
    format!("{timestamp}-{suffix}")
}

impl Session {
    #[must_use]
    pub fn new(path: PathBuf, working_dir: PathBuf, model: String) -> Self {
        Self {
            id: generate_session_id(),
            path,
            working_dir,
            model,
            messages: Vec::new(),
            abort_token: CancellationToken::new(),
        }
    }
}
