//! Single-call, non-streaming completion with retry on transient errors.

use crate::agent::context::ContextManager;
use crate::agent::retry::{categorize_error, is_retryable_error};
use crate::agent::AgentEvent;
use crate::compaction::TokenCounter;
use crate::provider::{
    ChatRequest, CompletionOutcome, ContentBlock, Message, ModelClient, Role, ToolCallEvent,
    ToolDefinition,
};
use crate::session::Session;
use crate::tool::ToolOrchestrator;
use anyhow::Result;
use std::borrow::Cow;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const MAX_RETRIES: u32 = 3;
const MAX_RETRY_DELAY: u64 = 60;

pub(crate) struct TurnContext<'a> {
    pub client: &'a Arc<dyn ModelClient>,
    pub orchestrator: &'a Arc<ToolOrchestrator>,
    pub context_manager: &'a Arc<ContextManager>,
    pub token_counter: &'a TokenCounter,
    pub system_prompt: String,
}

pub(crate) async fn run_turn(
    ctx: &TurnContext<'_>,
    session: &Session,
    messages: &[Message],
    tx: &mpsc::Sender<AgentEvent>,
    abort_token: CancellationToken,
) -> Result<(Vec<ContentBlock>, Vec<ToolCallEvent>)> {
    let tool_defs: Vec<ToolDefinition> = ctx
        .orchestrator
        .list_tools()
        .into_iter()
        .map(|t| ToolDefinition {
            name: t.name().to_string(),
            description: t.description().to_string(),
            parameters: t.parameters(),
        })
        .collect();

    let input_tokens = ctx.token_counter.count_str(&ctx.system_prompt)
        + messages.iter().map(|m| ctx.token_counter.count_message(m).total).sum::<usize>();
    let _ = tx.send(AgentEvent::InputTokens(input_tokens)).await;

    let request = ChatRequest {
        model: session.model.clone(),
        messages: Arc::new(messages.to_vec()),
        system: Some(Cow::Owned(ctx.system_prompt.clone())),
        tools: Arc::new(tool_defs),
        max_tokens: None,
    };

    complete_with_retry(ctx.client, ctx.token_counter, &request, tx, &abort_token).await
}

async fn complete_with_retry(
    client: &Arc<dyn ModelClient>,
    token_counter: &TokenCounter,
    request: &ChatRequest,
    tx: &mpsc::Sender<AgentEvent>,
    abort_token: &CancellationToken,
) -> Result<(Vec<ContentBlock>, Vec<ToolCallEvent>)> {
    let mut retry_count = 0u32;

    let (blocks, usage) = loop {
        if abort_token.is_cancelled() {
            return Err(anyhow::anyhow!("Cancelled"));
        }

        match client.complete(request.clone(), abort_token.clone()).await {
            CompletionOutcome::Aborted => return Err(anyhow::anyhow!("Cancelled")),
            CompletionOutcome::Blocks { blocks, usage } => break (blocks, usage),
            CompletionOutcome::Error(err) => {
                if is_retryable_error(&err) && retry_count < MAX_RETRIES {
                    retry_count += 1;
                    let delay = (1u64 << retry_count).min(MAX_RETRY_DELAY);
                    let reason = categorize_error(&err);
                    warn!("{}, retrying in {}s (attempt {}/{})", reason, delay, retry_count, MAX_RETRIES);
                    let _ = tx.send(AgentEvent::Retry(reason.to_string(), delay)).await;
                    tokio::select! {
                        () = abort_token.cancelled() => return Err(anyhow::anyhow!("Cancelled")),
                        () = tokio::time::sleep(std::time::Duration::from_secs(delay)) => {}
                    }
                    continue;
                }
                return Err(anyhow::anyhow!("Completion error: {err}"));
            }
        }
    };

    if usage.input_tokens > 0 || usage.output_tokens > 0 {
        let _ = tx
            .send(AgentEvent::ProviderUsage {
                input_tokens: usage.input_tokens as usize,
                output_tokens: usage.output_tokens as usize,
            })
            .await;
    }

    let mut tool_calls = Vec::new();
    for block in &blocks {
        match block {
            ContentBlock::Text { text } => {
                let tokens = token_counter.count_str(text);
                let _ = tx.send(AgentEvent::OutputTokensDelta(tokens)).await;
                let _ = tx.send(AgentEvent::TextDelta(text.clone())).await;
            }
            ContentBlock::ToolCall { id, name, arguments } => {
                let _ = tx
                    .send(AgentEvent::ToolCallStart(id.clone(), name.clone(), arguments.clone()))
                    .await;
                tool_calls.push(ToolCallEvent {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: arguments.clone(),
                });
            }
            _ => {}
        }
    }

    Ok((blocks, tool_calls))
}

pub(crate) fn append_timestamped(messages: &mut Vec<Message>, role: Role, content: Vec<ContentBlock>, now: i64) {
    messages.push(Message {
        role,
        content: Arc::new(content),
        timestamp: now,
    });
}
