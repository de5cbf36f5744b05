//! The `session_before_compact` adapter (§4.5.3): offers a handoff instead
//! of lossy in-place compaction when context pressure crosses a threshold.

use super::{ancestry, file_ops, gather, prompt, summary, Engine};
use crate::events::{CompactOutcome, SessionBeforeCompact};
use crate::provider::Message;
use crate::ui::{Choice, Severity};
use std::path::{Path, PathBuf};

pub const HANDOFF_HINT: &str = "\
You can suggest `/handoff <goal>` when context usage is high, or the user \
may invoke the `handoff` tool directly, to continue this work in a fresh \
session with a compact summary instead of losing context to compaction.";

/// Render `preparation` the same way compaction itself would, but using
/// the already-restricted subset the host handed us — re-gathering the
/// full branch here would re-introduce the overflow that triggered this
/// hook in the first place.
fn conversation_text_from_preparation(
    previous_summary: Option<&str>,
    messages: &[Message],
) -> String {
    let mut parts = Vec::new();
    if let Some(prev) = previous_summary {
        parts.push(prev.to_string());
    }
    parts.push(format!("## Recent Conversation\n\n{}", gather::format_messages(messages)));
    parts.join("\n\n")
}

pub async fn handle_compact_hook(engine: &Engine, event: &SessionBeforeCompact) -> CompactOutcome {
    let usage_desc = event
        .preparation
        .usage_pct
        .map_or_else(|| "high".to_string(), |pct| format!("{pct}%"));

    let choice = engine
        .ui
        .select(
            &format!("Context usage is {usage_desc} full. What would you like to do?"),
            &[
                Choice::HandoffToNewSession,
                Choice::CompactContext,
                Choice::ContinueWithoutEither,
            ],
        )
        .await;

    match choice {
        None | Some(Choice::CompactContext) => return CompactOutcome::Proceed,
        Some(Choice::ContinueWithoutEither) => return CompactOutcome::Cancel,
        Some(Choice::HandoffToNewSession) => {}
    }

    let conversation_text = conversation_text_from_preparation(
        event.preparation.previous_summary.as_deref(),
        &event.preparation.messages_to_summarize,
    );

    let outcome = summary::generate_summary(
        engine.client.as_ref(),
        engine.ui.as_ref(),
        &engine.model,
        &conversation_text,
        "Continue this work in a fresh session.",
    )
    .await;

    let summary_text = match outcome {
        summary::SummaryOutcome::Cancelled => {
            engine
                .ui
                .notify("Handoff cancelled. Compacting instead.", Severity::Warning);
            return CompactOutcome::Proceed;
        }
        summary::SummaryOutcome::Error(message) => {
            engine
                .ui
                .notify(&format!("Handoff failed ({message}). Compacting instead."), Severity::Warning);
            return CompactOutcome::Proceed;
        }
        summary::SummaryOutcome::Prompt(text) => text,
    };

    let file_ops = file_ops::extract_file_ops(&event.preparation.messages_to_summarize);
    let ancestry = ancestry::walk_ancestry(&event.session_path);
    let ancestry_refs: Vec<&Path> = ancestry.iter().map(PathBuf::as_path).collect();
    let assembled = prompt::assemble_prompt(&summary_text, file_ops.as_ref(), &ancestry_refs);

    engine.set_handoff_timestamp(Some(now_millis()));
    match engine.store.create_session(Some(&event.session_path)) {
        Ok((_, _new_path)) => {
            if let Some(ops) = file_ops {
                engine.marker_store.activate(ops.expansions);
            }
            engine.ui.set_editor_text(&assembled);
            engine
                .ui
                .notify("Handoff ready — edit if needed, press Enter to send", Severity::Info);
            CompactOutcome::Cancel
        }
        Err(e) => {
            engine.set_handoff_timestamp(None);
            engine
                .ui
                .notify(&format!("Handoff failed ({e}). Compacting instead."), Severity::Warning);
            CompactOutcome::Proceed
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
    use crate::events::CompactPreparation;
    use crate::provider::{ChatRequest, CompletionOutcome};
    use crate::session::SessionStore;
    use crate::ui::UiSurface;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex as StdMutex};
    use tokio_util::sync::CancellationToken;

    struct ErroringClient;
    #[async_trait]
    impl crate::provider::ModelClient for ErroringClient {
        fn id(&self) -> &str {
            "stub"
        }
        async fn complete(&self, _request: ChatRequest, _abort: CancellationToken) -> CompletionOutcome {
            CompletionOutcome::Error("context_length_exceeded".to_string())
        }
    }

    #[derive(Default)]
    struct RecordingUi {
        notifications: StdMutex<Vec<String>>,
        choice: StdMutex<Option<Choice>>,
    }
    #[async_trait]
    impl UiSurface for RecordingUi {
        fn set_editor_text(&self, _text: &str) {}
        fn notify(&self, text: &str, _severity: Severity) {
            self.notifications.lock().unwrap().push(text.to_string());
        }
        async fn select(&self, _title: &str, _choices: &[Choice]) -> Option<Choice> {
            self.choice.lock().unwrap().clone()
        }
        async fn await_cancellable(&self, _label: &str, abort: CancellationToken) {
            abort.cancelled().await;
        }
    }

    #[tokio::test]
    async fn test_summary_error_falls_back_to_compaction() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SessionStore::open(dir.path()).unwrap());
        let (_, path) = store.create_session(None).unwrap();

        let ui = Arc::new(RecordingUi::default());
        *ui.choice.lock().unwrap() = Some(Choice::HandoffToNewSession);
        let engine = Engine::new(store, Arc::new(ErroringClient), ui.clone(), "claude".to_string());

        let event = SessionBeforeCompact {
            session_path: path,
            preparation: CompactPreparation {
                previous_summary: None,
                messages_to_summarize: vec![],
                usage_pct: Some(92),
            },
        };
        let outcome = handle_compact_hook(&engine, &event).await;
        assert_eq!(outcome, CompactOutcome::Proceed);
        let notifications = ui.notifications.lock().unwrap();
        assert!(notifications.iter().any(|n| n.contains("context_length_exceeded")));
        assert!(notifications.iter().any(|n| n.contains("Compacting instead")));
    }

    #[tokio::test]
    async fn test_compact_choice_proceeds_without_notification() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SessionStore::open(dir.path()).unwrap());
        let (_, path) = store.create_session(None).unwrap();

        let ui = Arc::new(RecordingUi::default());
        *ui.choice.lock().unwrap() = Some(Choice::CompactContext);
        let engine = Engine::new(store, Arc::new(ErroringClient), ui.clone(), "claude".to_string());

        let event = SessionBeforeCompact {
            session_path: path,
            preparation: CompactPreparation {
                previous_summary: None,
                messages_to_summarize: vec![],
                usage_pct: Some(92),
            },
        };
        let outcome = handle_compact_hook(&engine, &event).await;
        assert_eq!(outcome, CompactOutcome::Proceed);
        assert!(ui.notifications.lock().unwrap().is_empty());
    }
}
