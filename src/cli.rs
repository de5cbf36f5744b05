//! CLI module for one-shot/non-interactive mode.

use crate::agent::{Agent, AgentEvent};
use crate::config::Config;
use crate::events::EventBus;
use crate::handoff::Engine;
use crate::provider::{AnthropicClient, ContentBlock, ModelClient};
use crate::session::{Session, SessionStore};
use crate::tool::{ApprovalHandler, ApprovalResponse, ToolMode, ToolOrchestrator};
use crate::ui::{Choice, Severity, UiSurface};
use anyhow::Result;
use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// switchback - a terminal coding agent with session handoff
#[derive(Parser, Debug)]
#[command(name = "switchback", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Resume the most recently used session (interactive mode only)
    #[arg(long = "continue", global = true)]
    pub continue_session: bool,

    /// Resume a specific session by id, or "select" to choose interactively
    #[arg(long, global = true)]
    pub resume: Option<String>,

    /// Permission mode for the interactive REPL: read, write, or agi
    #[arg(long, global = true)]
    pub permission_mode: Option<String>,

    /// Auto-approve all tool calls in interactive mode
    #[arg(long, global = true)]
    pub auto_approve: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a one-shot prompt (non-interactive)
    Run(RunArgs),
}

/// Resolved permission settings for the interactive REPL.
#[derive(Debug, Clone, Copy)]
pub struct PermissionSettings {
    pub mode: ToolMode,
    pub auto_approve: bool,
}

impl Default for PermissionSettings {
    fn default() -> Self {
        Self {
            mode: ToolMode::Write,
            auto_approve: false,
        }
    }
}

impl Cli {
    /// Resolve permission settings from CLI flags, falling back to config.
    #[must_use]
    pub fn resolve_permissions(&self, config: &Config) -> PermissionSettings {
        let mode = match self.permission_mode.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("read") => ToolMode::Read,
            Some("write") => ToolMode::Write,
            Some("agi") => ToolMode::Agi,
            _ => config.permissions.mode(),
        };
        PermissionSettings {
            mode,
            auto_approve: self.auto_approve,
        }
    }
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// The prompt to execute (use "-" to read from stdin)
    #[arg(required = true)]
    pub prompt: String,

    /// Model to use, e.g. "claude-sonnet-4-5"
    #[arg(short, long)]
    pub model: Option<String>,

    /// Output format
    #[arg(short = 'o', long, default_value = "text", value_enum)]
    pub output_format: OutputFormat,

    /// Quiet mode (response only, no progress)
    #[arg(short, long)]
    pub quiet: bool,

    /// Auto-approve all tool calls
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Maximum agentic turns before stopping
    #[arg(long)]
    pub max_turns: Option<usize>,

    /// Include file content as context
    #[arg(short = 'f', long = "file")]
    pub context_file: Option<PathBuf>,

    /// Working directory
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Disable all tools (pure chat mode)
    #[arg(long)]
    pub no_tools: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(ValueEnum, Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    StreamJson,
}

/// Deny handler for CLI mode without --yes flag (restricted tools will fail with clear message)
struct DenyApprovalHandler;

#[async_trait]
impl ApprovalHandler for DenyApprovalHandler {
    async fn ask_approval(&self, tool_name: &str, _args: &serde_json::Value) -> ApprovalResponse {
        eprintln!("Tool '{tool_name}' requires approval. Use --yes flag to auto-approve.");
        ApprovalResponse::No
    }
}

/// A UI surface for non-interactive mode: notifications go to stderr,
/// selection always takes the first choice, nothing is ever cancellable.
struct HeadlessUi;

#[async_trait]
impl UiSurface for HeadlessUi {
    fn set_editor_text(&self, _text: &str) {}

    fn notify(&self, text: &str, severity: Severity) {
        let prefix = match severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        eprintln!("[{prefix}] {text}");
    }

    async fn select(&self, _title: &str, choices: &[Choice]) -> Option<Choice> {
        choices.first().cloned()
    }

    async fn await_cancellable(&self, _label: &str, abort: CancellationToken) {
        abort.cancelled().await;
    }
}

/// JSON output structure for json/stream-json modes
#[derive(Serialize)]
#[serde(tag = "type")]
enum JsonEvent {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(rename = "thinking_delta")]
    ThinkingDelta { text: String },
    #[serde(rename = "tool_call_start")]
    ToolCallStart { id: String, name: String },
    #[serde(rename = "tool_call_result")]
    ToolCallResult {
        id: String,
        content: String,
        is_error: bool,
    },
    #[serde(rename = "done")]
    Done { response: String },
    #[serde(rename = "error")]
    Error { message: String },
}

/// Run the CLI one-shot mode
pub async fn run(args: RunArgs) -> ExitCode {
    match run_inner(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

async fn run_inner(args: RunArgs) -> Result<ExitCode> {
    // Load config
    let config = Config::load()?;

    // Determine working directory
    let working_dir = args
        .cwd
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    // Read prompt (handle stdin with "-")
    let prompt = if args.prompt == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer.trim().to_string()
    } else {
        args.prompt
    };

    // Optionally prepend context file
    let prompt = if let Some(file_path) = args.context_file {
        let content = std::fs::read_to_string(&file_path)?;
        format!(
            "Context from {}:\n```\n{}\n```\n\n{}",
            file_path.display(),
            content,
            prompt
        )
    } else {
        prompt
    };

    if prompt.is_empty() {
        eprintln!("Error: Empty prompt");
        return Ok(ExitCode::from(1));
    }

    let Some(api_key) = config.api_key() else {
        eprintln!("Error: No API key configured. Set ANTHROPIC_API_KEY, or run `switchback` to set up.");
        return Ok(ExitCode::from(1));
    };

    let model = args
        .model
        .or_else(|| config.model.clone())
        .unwrap_or_else(|| "claude-sonnet-4-5".to_string());

    let client: Arc<dyn ModelClient> = Arc::new(AnthropicClient::new(api_key));

    // Session store + a fresh session for this one-shot run
    let store = Arc::new(SessionStore::open(&config.sessions_dir())?);
    let (_id, session_path) = store.create_session(None)?;
    let session = Session::new(session_path, working_dir, model.clone());
    let abort_token = session.abort_token.clone();

    let ui: Arc<dyn UiSurface> = Arc::new(HeadlessUi);
    let engine = Arc::new(Engine::new(store.clone(), client.clone(), ui, model.clone()));

    let mut event_bus = EventBus::new();
    event_bus.register(engine.clone());
    let event_bus = Arc::new(event_bus);

    // Create orchestrator
    let orchestrator = if args.no_tools {
        Arc::new(ToolOrchestrator::new(ToolMode::Read))
    } else if args.yes {
        Arc::new(ToolOrchestrator::with_builtins(
            ToolMode::Agi,
            engine.clone(),
            store.clone(),
            client.clone(),
            model.clone(),
        ))
    } else {
        let mut orch = ToolOrchestrator::with_builtins(
            ToolMode::Write,
            engine.clone(),
            store.clone(),
            client.clone(),
            model.clone(),
        );
        orch.set_approval_handler(Arc::new(DenyApprovalHandler));
        Arc::new(orch)
    };

    let agent = Arc::new(Agent::new(client, orchestrator, event_bus));

    let (tx, mut rx) = mpsc::channel::<AgentEvent>(100);

    let agent_clone = agent.clone();
    let session_clone = session;
    let user_content = vec![ContentBlock::Text { text: prompt.clone() }];
    let max_turns = args.max_turns;

    let agent_handle = tokio::spawn(async move {
        agent_clone
            .run_task(session_clone, user_content, tx, None)
            .await
    });

    // Collect response
    let mut response = String::new();
    let mut turn_count = 0;
    let mut interrupted = false;
    let output_format = args.output_format;
    let quiet = args.quiet;
    let verbose = args.verbose;

    // Handle events
    while let Some(event) = rx.recv().await {
        match &event {
            AgentEvent::TextDelta(text) => {
                response.push_str(text);
                match output_format {
                    OutputFormat::Text if !quiet => {
                        print!("{text}");
                        io::stdout().flush()?;
                    }
                    OutputFormat::StreamJson => {
                        let json = serde_json::to_string(&JsonEvent::TextDelta { text: text.clone() })?;
                        println!("{json}");
                    }
                    _ => {}
                }
            }
            AgentEvent::ThinkingDelta(text) => {
                if verbose {
                    match output_format {
                        OutputFormat::Text => {
                            eprint!("[thinking] {text}");
                        }
                        OutputFormat::StreamJson => {
                            let json =
                                serde_json::to_string(&JsonEvent::ThinkingDelta { text: text.clone() })?;
                            println!("{json}");
                        }
                        _ => {}
                    }
                }
            }
            AgentEvent::ToolCallStart(id, name, _arguments) => {
                turn_count += 1;
                if let Some(max) = max_turns {
                    if turn_count >= max {
                        eprintln!("\nMax turns ({max}) reached");
                        abort_token.cancel();
                        interrupted = true;
                        break;
                    }
                }
                if !quiet {
                    match output_format {
                        OutputFormat::Text => {
                            eprintln!("\n> {name}({id})");
                        }
                        OutputFormat::StreamJson => {
                            let json = serde_json::to_string(&JsonEvent::ToolCallStart {
                                id: id.clone(),
                                name: name.clone(),
                            })?;
                            println!("{json}");
                        }
                        _ => {}
                    }
                }
            }
            AgentEvent::ToolCallResult(id, content, is_error) => {
                if verbose {
                    match output_format {
                        OutputFormat::Text => {
                            let preview = if content.chars().count() > 200 {
                                let truncated: String = content.chars().take(200).collect();
                                format!("{truncated}...")
                            } else {
                                content.clone()
                            };
                            eprintln!("  -> {preview}");
                        }
                        OutputFormat::StreamJson => {
                            let json = serde_json::to_string(&JsonEvent::ToolCallResult {
                                id: id.clone(),
                                content: content.clone(),
                                is_error: *is_error,
                            })?;
                            println!("{json}");
                        }
                        _ => {}
                    }
                }
            }
            AgentEvent::HandoffInstead => {
                if !quiet {
                    eprintln!("\n[context full — use /handoff to continue in a new session]");
                }
            }
            AgentEvent::Error(e) => {
                match output_format {
                    OutputFormat::Text => eprintln!("Error: {e}"),
                    OutputFormat::StreamJson | OutputFormat::Json => {
                        let json = serde_json::to_string(&JsonEvent::Error { message: e.clone() })?;
                        println!("{json}");
                    }
                }
                return Ok(ExitCode::from(1));
            }
            _ => {}
        }
    }

    // Wait for agent to finish
    let result = agent_handle.await?;

    // Output final result
    match output_format {
        OutputFormat::Text => {
            if quiet {
                println!("{response}");
            } else if !response.ends_with('\n') {
                println!();
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&JsonEvent::Done { response })?;
            println!("{json}");
        }
        OutputFormat::StreamJson => {
            let json = serde_json::to_string(&JsonEvent::Done { response })?;
            println!("{json}");
        }
    }

    if interrupted {
        Ok(ExitCode::from(3))
    } else {
        let (_session, error) = result;
        match error {
            None => Ok(ExitCode::from(0)),
            Some(e) => {
                eprintln!("Error: {e}");
                Ok(ExitCode::from(1))
            }
        }
    }
}
