//! The handoff engine: transfers an ongoing conversation into a new,
//! focused session carrying a compact, goal-directed summary.
//!
//! Three entry points converge on the same pipeline — generate a summary,
//! assemble a prompt, obtain a new session, stage its editor text — while
//! differing in how the runtime reaches them. See `command`, `tool`, and
//! `compact` for the three adapters, and `SPEC_FULL.md` §4 for the full
//! design.

mod ancestry;
mod compact;
mod command;
mod file_ops;
mod gather;
mod markers;
mod prompt;
mod summary;
mod tool;

pub use ancestry::walk_ancestry;
pub use command::{CommandOutcome, PrivilegedSessionCreator};
pub use compact::HANDOFF_HINT;
pub use file_ops::{extract_file_ops, FileOps};
pub use gather::gather_conversation;
pub use markers::MarkerStore;
pub use prompt::assemble_prompt;
pub use summary::{generate_summary, SummaryOutcome};
pub use tool::{ToolOutcome, HANDOFF_TOOL_NAME};

use crate::events::{
    AgentEnd, BeforeAgentStart, CompactOutcome, ContextEvent, EventHandler, InputEvent,
    InputTransform, SessionBeforeCompact, SessionSwitch, SwitchReason,
};
use crate::provider::ModelClient;
use crate::session::SessionStore;
use crate::ui::UiSurface;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// A handoff requested from inside a running agent turn, parked until the
/// turn settles (§4.5.2, §4.10).
#[derive(Debug, Clone)]
pub struct PendingHandoff {
    pub prompt: String,
    pub parent_session: Option<PathBuf>,
}

/// Owns every piece of transient state the three entry points share.
pub struct Engine {
    store: std::sync::Arc<SessionStore>,
    client: std::sync::Arc<dyn ModelClient>,
    ui: std::sync::Arc<dyn UiSurface>,
    model: String,

    /// Command-path: parent session file -> prompt awaiting installation
    /// on the next `session_switch(reason = new)`.
    pending_text: Mutex<HashMap<PathBuf, String>>,
    /// Tool-path: handoff armed during a turn, drained at `agent_end`.
    pending_handoff: Mutex<Option<PendingHandoff>>,
    /// Set immediately before any raw (non-fan-out) session switch;
    /// cleared by the next `session_switch` event. See §4.6.
    handoff_timestamp: Mutex<Option<i64>>,
    marker_store: MarkerStore,
}

impl Engine {
    #[must_use]
    pub fn new(
        store: std::sync::Arc<SessionStore>,
        client: std::sync::Arc<dyn ModelClient>,
        ui: std::sync::Arc<dyn UiSurface>,
        model: String,
    ) -> Self {
        Self {
            store,
            client,
            ui,
            model,
            pending_text: Mutex::new(HashMap::new()),
            pending_handoff: Mutex::new(None),
            handoff_timestamp: Mutex::new(None),
            marker_store: MarkerStore::new(),
        }
    }

    #[must_use]
    pub fn handoff_timestamp(&self) -> Option<i64> {
        *self.handoff_timestamp.lock().expect("handoff_timestamp lock poisoned")
    }

    fn set_handoff_timestamp(&self, ts: Option<i64>) {
        *self.handoff_timestamp.lock().expect("handoff_timestamp lock poisoned") = ts;
    }
}

#[async_trait]
impl EventHandler for Engine {
    async fn before_agent_start(&self, event: &BeforeAgentStart) -> Option<String> {
        Some(format!("{}\n\n{}", event.system_prompt, compact::HANDOFF_HINT))
    }

    async fn session_switch(&self, event: &SessionSwitch) {
        // A proper switch always supersedes any raw-switch correction in
        // flight, regardless of which adapter is completing.
        self.set_handoff_timestamp(None);

        if event.reason != SwitchReason::New {
            return;
        }
        let Some(parent) = event.header.parent_session.clone() else {
            return;
        };
        let prompt = {
            let mut pending = self.pending_text.lock().expect("pending_text lock poisoned");
            pending.remove(&parent)
        };
        if let Some(prompt) = prompt {
            self.ui.set_editor_text(&prompt);
            self.ui
                .notify("Handoff ready — edit if needed, press Enter to send", crate::ui::Severity::Info);
        }
    }

    async fn context(&self, event: &ContextEvent) -> Option<Vec<crate::provider::Message>> {
        let cutoff = self.handoff_timestamp()?;
        let filtered: Vec<_> = event
            .messages
            .iter()
            .filter(|m| m.timestamp >= cutoff)
            .cloned()
            .collect();
        if filtered.is_empty() {
            None
        } else {
            Some(filtered)
        }
    }

    async fn input(&self, event: &InputEvent) -> Option<InputTransform> {
        let expanded = self.marker_store.expand(&event.text)?;
        Some(InputTransform {
            text: expanded,
            images: event.images.clone(),
        })
    }

    async fn agent_end(&self, event: &AgentEnd) {
        tool::drain_pending_handoff(self, &event.session_path).await;
    }

    async fn session_before_compact(&self, event: &SessionBeforeCompact) -> CompactOutcome {
        compact::handle_compact_hook(self, event).await
    }
}
