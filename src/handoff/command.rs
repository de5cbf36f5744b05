//! The user-facing `/handoff <goal>` command (§4.5.1).
//!
//! Runs with the agent loop idle and a privileged session-creation
//! operation available, so the new session appears via the host's full
//! `session_switch` fan-out rather than a raw switch — the editor text is
//! installed by `Engine::session_switch`, not here.

use super::{ancestry, file_ops, gather, prompt, summary, Engine};
use crate::session::Session;
use crate::ui::Severity;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub enum CommandOutcome {
    Started,
    Cancelled,
    InvalidInput(String),
    SummaryFailed(String),
}

/// The host's privileged new-session operation: creates a session *and*
/// fires the full `session_switch(reason = new)` event fan-out. Distinct
/// from the raw switch the tool and compact-hook adapters use because only
/// the command path runs with the agent loop idle and command-context
/// privileges.
#[async_trait]
pub trait PrivilegedSessionCreator: Send + Sync {
    /// Returns `None` if the user cancelled session creation.
    async fn create_new_session(&self, parent: &Path) -> Option<PathBuf>;
}

impl Engine {
    pub async fn handle_command(
        &self,
        session: &Session,
        goal: &str,
        creator: &dyn PrivilegedSessionCreator,
    ) -> CommandOutcome {
        let goal = goal.trim();
        if goal.is_empty() {
            self.ui.notify("Usage: /handoff <goal>", Severity::Error);
            return CommandOutcome::InvalidInput("empty goal".to_string());
        }

        let Some(conversation_text) = gather::gather_conversation(&session.messages) else {
            self.ui
                .notify("Nothing to hand off yet — send a message first", Severity::Error);
            return CommandOutcome::InvalidInput("empty conversation".to_string());
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
                self.ui.notify("Handoff cancelled", Severity::Info);
                return CommandOutcome::Cancelled;
            }
            summary::SummaryOutcome::Error(message) => {
                self.ui.notify(&format!("Handoff failed: {message}"), Severity::Error);
                return CommandOutcome::SummaryFailed(message);
            }
            summary::SummaryOutcome::Prompt(text) => text,
        };

        let file_ops = file_ops::extract_file_ops(&session.messages);
        let ancestry = ancestry::walk_ancestry(&session.path);
        let ancestry_refs: Vec<&Path> = ancestry.iter().map(PathBuf::as_path).collect();
        let assembled = prompt::assemble_prompt(&summary_text, file_ops.as_ref(), &ancestry_refs);

        {
            let mut pending = self.pending_text.lock().expect("pending_text lock poisoned");
            pending.insert(session.path.clone(), assembled);
        }
        if let Some(ops) = file_ops {
            self.marker_store.activate(ops.expansions);
        }

        if creator.create_new_session(&session.path).await.is_none() {
            let mut pending = self.pending_text.lock().expect("pending_text lock poisoned");
            pending.remove(&session.path);
            self.ui.notify("New session cancelled", Severity::Info);
            return CommandOutcome::Cancelled;
        }

        CommandOutcome::Started
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventHandler;
    use crate::provider::{ChatRequest, CompletionOutcome, Message, Role};
    use crate::session::SessionStore;
    use crate::ui::{Choice, UiSurface};
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
                blocks: vec![crate::provider::ContentBlock::Text {
                    text: "## Goal\ncontinue the work".to_string(),
                }],
                usage: Default::default(),
            }
        }
    }

    #[derive(Default)]
    struct RecordingUi {
        editor_text: StdMutex<Option<String>>,
        notifications: StdMutex<Vec<String>>,
    }
    #[async_trait]
    impl UiSurface for RecordingUi {
        fn set_editor_text(&self, text: &str) {
            *self.editor_text.lock().unwrap() = Some(text.to_string());
        }
        fn notify(&self, text: &str, _severity: Severity) {
            self.notifications.lock().unwrap().push(text.to_string());
        }
        async fn select(&self, _title: &str, choices: &[Choice]) -> Option<Choice> {
            choices.first().cloned()
        }
        async fn await_cancellable(&self, _label: &str, abort: CancellationToken) {
            abort.cancelled().await;
        }
    }

    struct AlwaysCreates {
        store: Arc<SessionStore>,
        bus_target: Arc<Engine>,
    }
    #[async_trait]
    impl PrivilegedSessionCreator for AlwaysCreates {
        async fn create_new_session(&self, parent: &Path) -> Option<PathBuf> {
            let (_, path) = self.store.create_session(Some(parent)).ok()?;
            let header = SessionStore::read_header(&path).ok()?;
            self.bus_target
                .session_switch(&crate::events::SessionSwitch {
                    reason: crate::events::SwitchReason::New,
                    session_path: path.clone(),
                    header,
                })
                .await;
            Some(path)
        }
    }

    #[tokio::test]
    async fn test_command_happy_path_installs_editor_text() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SessionStore::open(dir.path()).unwrap());
        let (_, path) = store.create_session(None).unwrap();
        let msg = |role, text: &str| Message {
            role,
            content: Arc::new(vec![crate::provider::ContentBlock::Text { text: text.to_string() }]),
            timestamp: 0,
        };
        store.append_message(&path, &msg(Role::User, "How do I implement OAuth?")).unwrap();
        store
            .append_message(&path, &msg(Role::Assistant, "You'll need an auth provider"))
            .unwrap();

        let ui = Arc::new(RecordingUi::default());
        let engine = Arc::new(Engine::new(store.clone(), Arc::new(StubClient), ui.clone(), "claude".to_string()));

        let mut session = Session::new(path.clone(), dir.path().to_path_buf(), "claude".to_string());
        session.messages = store.branch(&path).unwrap();

        let creator = AlwaysCreates {
            store: store.clone(),
            bus_target: engine.clone(),
        };
        let outcome = engine.handle_command(&session, "implement OAuth", &creator).await;
        assert!(matches!(outcome, CommandOutcome::Started));

        let text = ui.editor_text.lock().unwrap().clone().unwrap();
        assert!(text.contains("/skill:pi-session-query"));
        assert!(text.contains(&format!("**Parent session:** `{}`", path.display())));
        assert!(text.contains("continue the work"));
    }

    #[tokio::test]
    async fn test_empty_conversation_aborts_without_model_call() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SessionStore::open(dir.path()).unwrap());
        let (_, path) = store.create_session(None).unwrap();
        let ui = Arc::new(RecordingUi::default());
        let engine = Arc::new(Engine::new(store.clone(), Arc::new(StubClient), ui.clone(), "claude".to_string()));
        let session = Session::new(path.clone(), dir.path().to_path_buf(), "claude".to_string());

        let creator = AlwaysCreates {
            store: store.clone(),
            bus_target: engine.clone(),
        };
        let outcome = engine.handle_command(&session, "anything", &creator).await;
        assert!(matches!(outcome, CommandOutcome::InvalidInput(_)));
        assert!(ui.editor_text.lock().unwrap().is_none());
    }
}
