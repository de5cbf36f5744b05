pub mod completion;
pub mod context;
mod events;
pub mod instructions;
mod retry;
mod tools;

pub use events::AgentEvent;

use crate::agent::completion::{append_timestamped, run_turn, TurnContext};
use crate::agent::context::ContextManager;
use crate::agent::instructions::InstructionLoader;
use crate::compaction::{
    check_compaction_needed, prune_messages, CompactionConfig, PruningTier, TokenCounter,
};
use crate::events::{CompactOutcome, CompactPreparation, EventBus};
use crate::provider::{ContentBlock, Message, ModelClient, Role};
use crate::session::Session;
use crate::tool::ToolOrchestrator;
use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

const DEFAULT_SYSTEM_PROMPT: &str = "\
You are switchback, a fast terminal coding agent. You help users with software engineering tasks: \
reading, editing, and creating files, running commands, and searching codebases. \
Be concise — under 4 lines for explanations, longer only for code. \
Never praise the user's question or idea. Prioritize action over explanation.

## Core Principles

- Simple-first: prefer the smallest local fix over a cross-file architecture change.
- Reuse-first: search for existing patterns before inventing new ones. Mirror naming, error handling, style.
- ALWAYS read code before modifying it. Prefer editing existing files over creating new ones.
- Make minimal, focused changes. Don't add features or refactoring beyond what was asked.
- When deleting or moving code, remove it completely. No `// removed`, `// deprecated`, or compatibility shims.
- Comments for non-obvious context only. Don't add docstrings or comments to code you didn't change.
- Add error handling for real failure cases only. Don't handle impossible scenarios.
- Don't add new dependencies without asking.
- Implement completely. No placeholder code, no TODO comments.
- Don't introduce security vulnerabilities (injection, XSS, path traversal).

## Task Execution

You must keep going until the task is completely resolved. Do not stop at analysis or partial fixes. \
Persevere even when tool calls fail — retry with a different approach.

- Unless the user explicitly asks for a plan or explanation, assume they want you to make changes.
- Get context fast, then act. Stop exploring as soon as you can name the files and symbols to change.
- Before tool calls, state what you're doing in 1-2 sentences.
- Only ask when truly blocked — you cannot safely pick a reasonable default, the action is \
destructive and irreversible, or you need a credential. Never ask \"Should I proceed?\" — just do it.

## Tool Usage

Prefer specialized tools (read, edit) over shell equivalents.

- NEVER edit a file without reading it first.
- Run independent tool calls in parallel — multiple reads and searches at once.

## Output

- Reference files with line numbers: `src/main.rs:42`
- No emoji unless the user uses them first.

## Safety

- Don't commit credentials, secrets, or .env files.
- Don't revert or discard changes you didn't make.
- Explain destructive commands before executing them.
- Respect AGENTS.md instructions from the project and user.";

#[derive(Clone)]
pub struct Agent {
    client: Arc<dyn ModelClient>,
    orchestrator: Arc<ToolOrchestrator>,
    event_bus: Arc<EventBus>,
    compaction_config: CompactionConfig,
    /// Dynamic context window size (updated when model changes)
    context_window: Arc<AtomicUsize>,
    token_counter: TokenCounter,
    context_manager: Arc<ContextManager>,
}

/// Create instruction loader from current directory.
fn create_instruction_loader() -> Option<Arc<InstructionLoader>> {
    std::env::current_dir()
        .ok()
        .map(|cwd| Arc::new(InstructionLoader::new(cwd)))
}

/// Create context manager with optional instruction loader and working directory.
fn create_context_manager(system_prompt: String) -> ContextManager {
    let cwd = std::env::current_dir().ok();
    let mut cm = ContextManager::new(system_prompt);
    if let Some(loader) = create_instruction_loader() {
        cm = cm.with_instruction_loader(loader);
    }
    if let Some(ref dir) = cwd {
        cm = cm.with_working_dir(dir.clone());
    }
    cm
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn drain_queued_user_messages(
    session: &mut Session,
    message_queue: Option<&Arc<std::sync::Mutex<Vec<String>>>>,
) -> bool {
    let Some(queue) = message_queue else {
        return false;
    };

    let mut guard = match queue.lock() {
        Ok(g) => g,
        Err(poisoned) => {
            warn!("Message queue lock was poisoned, recovering");
            poisoned.into_inner()
        }
    };
    if guard.is_empty() {
        return false;
    }

    let drained: Vec<String> = guard.drain(..).collect();
    drop(guard);

    for queued_msg in drained {
        append_timestamped(
            &mut session.messages,
            Role::User,
            vec![ContentBlock::Text { text: queued_msg }],
            now_millis(),
        );
    }

    true
}

impl Agent {
    #[must_use]
    pub fn new(
        client: Arc<dyn ModelClient>,
        orchestrator: Arc<ToolOrchestrator>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let system_prompt = DEFAULT_SYSTEM_PROMPT.to_string();
        let compaction_config = CompactionConfig::default();
        let context_window = Arc::new(AtomicUsize::new(compaction_config.context_window));

        let context_manager = create_context_manager(system_prompt);

        Self {
            client,
            orchestrator,
            event_bus,
            compaction_config,
            context_window,
            token_counter: TokenCounter::new(),
            context_manager: Arc::new(context_manager),
        }
    }

    #[must_use]
    pub fn with_compaction_config(mut self, config: CompactionConfig) -> Self {
        self.context_window
            .store(config.context_window, Ordering::Relaxed);
        self.compaction_config = config;
        self
    }

    /// Set a custom system prompt (overrides default).
    #[must_use]
    pub fn with_system_prompt(self, prompt: String) -> Self {
        Self {
            context_manager: Arc::new(create_context_manager(prompt)),
            ..self
        }
    }

    /// Manually compact messages with mechanical pruning only (Tier 1 + 2).
    ///
    /// Synchronous -- safe to call from event handlers.
    /// Returns the number of messages modified, or 0 if no pruning was needed.
    pub fn compact_messages(&self, messages: &mut [Message]) -> usize {
        let mut config = self.compaction_config.clone();
        config.context_window = self.context_window();

        let target = config.target_tokens();
        let result = prune_messages(messages, &config, &self.token_counter, target);
        result.messages_modified
    }

    /// Update the context window size (call when model changes).
    pub fn set_context_window(&self, window: usize) {
        self.context_window.store(window, Ordering::Relaxed);
    }

    /// Get the current context window size.
    #[must_use]
    pub fn context_window(&self) -> usize {
        self.context_window.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn client(&self) -> Arc<dyn ModelClient> {
        self.client.clone()
    }

    /// Access the context manager (e.g., to invalidate the cached render
    /// after AGENTS.md changes).
    pub fn context_manager(&self) -> &ContextManager {
        &self.context_manager
    }

    async fn emit_token_usage(
        &self,
        messages: &[Message],
        system_prompt: &str,
        tx: &mpsc::Sender<AgentEvent>,
    ) {
        let system_tokens = self.token_counter.count_str(system_prompt);
        let message_tokens = self.token_counter.count_messages(messages).total;
        let total = system_tokens + message_tokens;

        let _ = tx
            .send(AgentEvent::TokenUsage {
                used: total,
                max: self.context_window(),
            })
            .await;
    }

    /// Run a task with the given user message.
    ///
    /// Returns the session (with any work completed) and optionally an error.
    /// The session is always returned so partial work can be persisted.
    pub async fn run_task(
        &self,
        mut session: Session,
        user_content: Vec<ContentBlock>,
        tx: mpsc::Sender<AgentEvent>,
        message_queue: Option<Arc<std::sync::Mutex<Vec<String>>>>,
    ) -> (Session, Option<anyhow::Error>) {
        append_timestamped(&mut session.messages, Role::User, user_content, now_millis());

        let base_prompt = self.context_manager.get_system_prompt().await;
        self.emit_token_usage(&session.messages, &base_prompt, &tx)
            .await;

        let result = loop {
            if session.abort_token.is_cancelled() {
                break Some(anyhow::anyhow!("Cancelled"));
            }

            let had_queued = drain_queued_user_messages(&mut session, message_queue.as_ref());
            if had_queued {
                self.emit_token_usage(&session.messages, &base_prompt, &tx)
                    .await;
            }

            match self.execute_turn(&mut session, &tx).await {
                Ok(true) => {}
                Ok(false) => {
                    let had_late_queued =
                        drain_queued_user_messages(&mut session, message_queue.as_ref());
                    if had_late_queued {
                        self.emit_token_usage(&session.messages, &base_prompt, &tx)
                            .await;
                        continue;
                    }
                    break None;
                }
                Err(e) => break Some(e),
            }
        };

        self.event_bus
            .fire_agent_end(session.path.clone())
            .await;

        (session, result)
    }

    async fn execute_turn(
        &self,
        session: &mut Session,
        tx: &mpsc::Sender<AgentEvent>,
    ) -> Result<bool> {
        let base_prompt = self.context_manager.get_system_prompt().await;
        let system_prompt = self.event_bus.fire_before_agent_start(base_prompt).await;

        let filtered_messages = self.event_bus.fire_context(session.messages.clone()).await;

        let turn_ctx = TurnContext {
            client: &self.client,
            orchestrator: &self.orchestrator,
            context_manager: &self.context_manager,
            token_counter: &self.token_counter,
            system_prompt,
        };

        let (assistant_blocks, tool_calls) = run_turn(
            &turn_ctx,
            session,
            &filtered_messages,
            tx,
            session.abort_token.clone(),
        )
        .await?;

        append_timestamped(
            &mut session.messages,
            Role::Assistant,
            assistant_blocks,
            now_millis(),
        );

        let base_prompt = self.context_manager.get_system_prompt().await;
        self.emit_token_usage(&session.messages, &base_prompt, tx)
            .await;

        if tool_calls.is_empty() {
            return Ok(false);
        }

        let tool_results = tools::execute_tools_parallel(
            &self.orchestrator,
            session,
            tool_calls,
            tx,
            session.abort_token.clone(),
        )
        .await?;

        append_timestamped(
            &mut session.messages,
            Role::ToolResult,
            tool_results,
            now_millis(),
        );
        self.emit_token_usage(&session.messages, &base_prompt, tx)
            .await;

        let mut config = self.compaction_config.clone();
        config.context_window = self.context_window();

        let status = check_compaction_needed(&session.messages, &config, &self.token_counter);
        if status.needs_compaction {
            let usage_pct = u8::try_from(
                (status.total_tokens * 100)
                    .checked_div(config.available_tokens().max(1))
                    .unwrap_or(100)
                    .min(100),
            )
            .unwrap_or(100);

            let outcome = self
                .event_bus
                .fire_session_before_compact(
                    session.path.clone(),
                    CompactPreparation {
                        previous_summary: None,
                        messages_to_summarize: session.messages.clone(),
                        usage_pct: Some(usage_pct),
                    },
                )
                .await;

            match outcome {
                CompactOutcome::Cancel => {
                    let _ = tx.send(AgentEvent::HandoffInstead).await;
                }
                CompactOutcome::Proceed => {
                    let target = config.target_tokens();
                    let result =
                        prune_messages(&mut session.messages, &config, &self.token_counter, target);
                    if result.tier_reached != PruningTier::None {
                        let _ = tx
                            .send(AgentEvent::CompactionStatus {
                                before: result.tokens_before,
                                after: result.tokens_after,
                            })
                            .await;
                    }
                }
            }
        }

        Ok(true)
    }
}
