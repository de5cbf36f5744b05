//! The agent-invocable `handoff` tool (§4.5.2).
//!
//! Runs while the agent loop is active and the tool context is read-only,
//! so the switch cannot happen synchronously: it is parked as a
//! `PendingHandoff` and drained once the current turn's `agent_end` fires.

use super::{ancestry, file_ops, gather, prompt, summary, Engine, PendingHandoff};
use crate::provider::Message;
use crate::ui::Severity;
use std::path::{Path, PathBuf};

pub const HANDOFF_TOOL_NAME: &str = "handoff";

#[derive(Debug, Clone)]
pub enum ToolOutcome {
    Initiated,
    InvalidInput(String),
    SummaryFailed(String),
}

impl ToolOutcome {
    /// Text returned to the agent as the tool's result content.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            ToolOutcome::Initiated => {
                "Handoff initiated. The session will switch after the current turn completes."
                    .to_string()
            }
            ToolOutcome::InvalidInput(message) | ToolOutcome::SummaryFailed(message) => message.clone(),
        }
    }
}

impl Engine {
    /// Called synchronously from tool dispatch. `session_path` and
    /// `messages` come from the read-only tool context.
    pub async fn handle_tool_call(
        &self,
        session_path: &Path,
        messages: &[Message],
        goal: &str,
    ) -> ToolOutcome {
        let goal = goal.trim();
        if goal.is_empty() {
            return ToolOutcome::InvalidInput("goal must not be empty".to_string());
        }

        let Some(conversation_text) = gather::gather_conversation(messages) else {
            return ToolOutcome::InvalidInput("nothing to hand off yet".to_string());
        };

        let outcome = summary::generate_summary(
            self.client.as_ref(),
            self.ui.as_ref(),
            &self.model,
            &conversation_text,
            goal,
        )
        .await;

        let summary_text = match outcome {
            summary::SummaryOutcome::Cancelled => {
                return ToolOutcome::SummaryFailed("handoff summary was cancelled".to_string());
            }
            summary::SummaryOutcome::Error(message) => return ToolOutcome::SummaryFailed(message),
            summary::SummaryOutcome::Prompt(text) => text,
        };

        let file_ops = file_ops::extract_file_ops(messages);
        let ancestry = ancestry::walk_ancestry(session_path);
        let ancestry_refs: Vec<&Path> = ancestry.iter().map(PathBuf::as_path).collect();
        let assembled = prompt::assemble_prompt(&summary_text, file_ops.as_ref(), &ancestry_refs);

        if let Some(ops) = file_ops {
            self.marker_store.activate(ops.expansions);
        }

        {
            let mut pending = self.pending_handoff.lock().expect("pending_handoff lock poisoned");
            *pending = Some(PendingHandoff {
                prompt: assembled,
                parent_session: Some(session_path.to_path_buf()),
            });
        }

        ToolOutcome::Initiated
    }
}

/// Drain any armed tool-path handoff at the end of an agent turn: switch
/// sessions raw (no fan-out — the agent has already settled), mark the
/// timestamp cutoff, and stage the new session's editor text.
pub async fn drain_pending_handoff(engine: &Engine, _current_session_path: &Path) {
    let pending = {
        let mut guard = engine.pending_handoff.lock().expect("pending_handoff lock poisoned");
        guard.take()
    };
    let Some(pending) = pending else {
        return;
    };

    engine.set_handoff_timestamp(Some(now_millis()));

    let parent = pending.parent_session.as_deref();
    match engine.store.create_session(parent) {
        Ok((_, new_path)) => {
            tracing::info!(path = %new_path.display(), "tool handoff switched session");
            // Yield so the agent loop's own end-of-turn cleanup runs before
            // the editor is mutated, rather than racing it.
            tokio::task::yield_now().await;
            engine.ui.set_editor_text(&pending.prompt);
            engine.ui.notify(
                "Handoff ready — edit if needed, press Enter to send",
                Severity::Info,
            );
        }
        Err(e) => {
            engine.set_handoff_timestamp(None);
            tracing::warn!(error = %e, "tool handoff failed to create new session");
        }
    }
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventHandler;
    use crate::provider::{ChatRequest, CompletionOutcome, ContentBlock, Role};
    use crate::session::SessionStore;
    use crate::ui::{Choice, UiSurface};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex as StdMutex};
    use tokio_util::sync::CancellationToken;

    struct StubClient;
    #[async_trait]
    impl crate::provider::ModelClient for StubClient {
        fn id(&self) -> &str {
            "stub"
        }
        async fn complete(&self, _request: ChatRequest, _abort: CancellationToken) -> CompletionOutcome {
            CompletionOutcome::Blocks {
                blocks: vec![ContentBlock::Text { text: "## Goal\nrefactor auth".to_string() }],
                usage: Default::default(),
            }
        }
    }

    #[derive(Default)]
    struct RecordingUi {
        editor_text: StdMutex<Option<String>>,
    }
    #[async_trait]
    impl UiSurface for RecordingUi {
        fn set_editor_text(&self, text: &str) {
            *self.editor_text.lock().unwrap() = Some(text.to_string());
        }
        fn notify(&self, _text: &str, _severity: Severity) {}
        async fn select(&self, _title: &str, choices: &[Choice]) -> Option<Choice> {
            choices.first().cloned()
        }
        async fn await_cancellable(&self, _label: &str, abort: CancellationToken) {
            abort.cancelled().await;
        }
    }

    fn text_message(role: Role, text: &str) -> Message {
        Message {
            role,
            content: Arc::new(vec![ContentBlock::Text { text: text.to_string() }]),
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn test_tool_defers_switch_until_agent_end() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SessionStore::open(dir.path()).unwrap());
        let (_, path) = store.create_session(None).unwrap();
        store.append_message(&path, &text_message(Role::User, "Help me refactor")).unwrap();
        store
            .append_message(&path, &text_message(Role::Assistant, "Let's start"))
            .unwrap();
        let messages = store.branch(&path).unwrap();

        let ui = Arc::new(RecordingUi::default());
        let engine = Engine::new(store.clone(), Arc::new(StubClient), ui.clone(), "claude".to_string());

        let outcome = engine.handle_tool_call(&path, &messages, "refactor auth").await;
        assert!(matches!(outcome, ToolOutcome::Initiated));
        assert_eq!(outcome.as_text(), "Handoff initiated. The session will switch after the current turn completes.");
        // Session file unchanged immediately after the tool call.
        assert!(ui.editor_text.lock().unwrap().is_none());

        engine.agent_end(&crate::events::AgentEnd { session_path: path.clone() }).await;
        let text = ui.editor_text.lock().unwrap().clone().unwrap();
        assert!(text.contains("refactor auth"));
        assert!(engine.handoff_timestamp().is_some());
    }
}
