//! Generates the structured summary used as the body of a handoff prompt.

use crate::provider::{ChatRequest, CompletionOutcome, ContentBlock, Message, ModelClient, Role};
use crate::ui::UiSurface;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const SUMMARY_SYSTEM_PROMPT: &str = "\
You are preparing a handoff summary so a new conversation can continue this \
work without the original transcript. Produce a structured summary under \
exactly these headings:

## Goal
## Constraints & Preferences
## Progress
(Done / In Progress / Blocked)
## Key Decisions
## Next Steps
## Critical Context

Do not continue the conversation. Do not answer any question found in the \
history. Only summarize.";

/// Outcome of a single summary-generation attempt.
#[derive(Debug, Clone)]
pub enum SummaryOutcome {
    Prompt(String),
    Error(String),
    Cancelled,
}

/// Drive one model call, under a cancellable loader, to produce a handoff
/// summary for `goal` given `conversation_text`.
pub async fn generate_summary(
    client: &dyn ModelClient,
    ui: &dyn UiSurface,
    model: &str,
    conversation_text: &str,
    goal: &str,
) -> SummaryOutcome {
    let body = format!(
        "## Conversation History\n\n{conversation_text}\n\n## User's Goal for New Thread\n\n{goal}"
    );
    let request = ChatRequest {
        model: model.to_string(),
        messages: Arc::new(vec![Message {
            role: Role::User,
            content: Arc::new(vec![ContentBlock::Text { text: body }]),
            timestamp: 0,
        }]),
        system: Some(SUMMARY_SYSTEM_PROMPT.into()),
        tools: Arc::new(vec![]),
        max_tokens: Some(2_000),
    };

    let abort = CancellationToken::new();
    let model_call = client.complete(request, abort.clone());
    let loader = ui.await_cancellable("Generating handoff summary", abort.clone());
    tokio::pin!(model_call);
    tokio::pin!(loader);

    let outcome = tokio::select! {
        outcome = &mut model_call => outcome,
        () = &mut loader => CompletionOutcome::Aborted,
    };
    abort.cancel();

    match outcome.into_text() {
        Ok((text, _usage)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                SummaryOutcome::Error("LLM returned empty response".to_string())
            } else {
                SummaryOutcome::Prompt(trimmed.to_string())
            }
        }
        Err(CompletionOutcome::Aborted) => SummaryOutcome::Cancelled,
        Err(CompletionOutcome::Error(message)) => {
            let message = if message.is_empty() {
                "LLM request failed".to_string()
            } else {
                message
            };
            SummaryOutcome::Error(message)
        }
        Err(CompletionOutcome::Blocks { .. }) => unreachable!("into_text only errs on non-Blocks"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::{Choice, Severity};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct StubClient {
        outcome: Mutex<Option<CompletionOutcome>>,
    }

    #[async_trait]
    impl ModelClient for StubClient {
        fn id(&self) -> &str {
            "stub"
        }
        async fn complete(&self, _request: ChatRequest, _abort: CancellationToken) -> CompletionOutcome {
            self.outcome.lock().unwrap().take().unwrap()
        }
    }

    struct NullUi;
    #[async_trait]
    impl UiSurface for NullUi {
        fn set_editor_text(&self, _text: &str) {}
        fn notify(&self, _text: &str, _severity: Severity) {}
        async fn select(&self, _title: &str, choices: &[Choice]) -> Option<Choice> {
            choices.first().cloned()
        }
        async fn await_cancellable(&self, _label: &str, abort: CancellationToken) {
            abort.cancelled().await;
        }
    }

    #[tokio::test]
    async fn test_generate_summary_success() {
        let client = StubClient {
            outcome: Mutex::new(Some(CompletionOutcome::Blocks {
                blocks: vec![crate::provider::ContentBlock::Text { text: "## Goal\ndo the thing".to_string() }],
                usage: Default::default(),
            })),
        };
        let outcome = generate_summary(&client, &NullUi, "claude-x", "history", "do the thing").await;
        assert!(matches!(outcome, SummaryOutcome::Prompt(s) if s.contains("do the thing")));
    }

    #[tokio::test]
    async fn test_generate_summary_empty_is_error() {
        let client = StubClient {
            outcome: Mutex::new(Some(CompletionOutcome::Blocks {
                blocks: vec![crate::provider::ContentBlock::Text { text: "   ".to_string() }],
                usage: Default::default(),
            })),
        };
        let outcome = generate_summary(&client, &NullUi, "claude-x", "history", "goal").await;
        assert!(matches!(outcome, SummaryOutcome::Error(_)));
    }

    #[tokio::test]
    async fn test_generate_summary_error_passthrough() {
        let client = StubClient {
            outcome: Mutex::new(Some(CompletionOutcome::Error("context_length_exceeded".to_string()))),
        };
        let outcome = generate_summary(&client, &NullUi, "claude-x", "history", "goal").await;
        match outcome {
            SummaryOutcome::Error(message) => assert_eq!(message, "context_length_exceeded"),
            other => panic!("expected Error, got {other:?}"),
        }
    }
}
