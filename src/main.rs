use async_trait::async_trait;
use clap::Parser;
use reedline::{
    DefaultPrompt, DefaultPromptSegment, EditCommand, ExternalPrinter, Reedline, Signal,
    ValidationResult, Validator,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use switchback::agent::{Agent, AgentEvent};
use switchback::cli::{Cli, Commands};
use switchback::config::Config;
use switchback::events::{EventBus, InputSource, SwitchReason};
use switchback::handoff::{Engine, PrivilegedSessionCreator};
use switchback::provider::{AnthropicClient, ContentBlock, ModelClient};
use switchback::session::{Session, SessionStore};
use switchback::tool::{ApprovalHandler, ApprovalResponse, ToolOrchestrator};
use switchback::ui::{ReedlineUi, Severity, UiSurface};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run(args)) => switchback::cli::run(args).await,
        None => match run_repl(&cli).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        },
    }
}

/// Allow multi-line input: a line ending in a backslash continues.
struct ContinuationValidator;

impl Validator for ContinuationValidator {
    fn validate(&self, line: &str) -> ValidationResult {
        if line.trim_end().ends_with('\\') {
            ValidationResult::Incomplete
        } else {
            ValidationResult::Complete
        }
    }
}

/// Approval handler for interactive mode: prompts on stdin outside the
/// line editor, since a restricted tool call pauses the agent loop rather
/// than the REPL's own read_line.
struct StdinApprovalHandler;

#[async_trait]
impl ApprovalHandler for StdinApprovalHandler {
    async fn ask_approval(&self, tool_name: &str, _args: &serde_json::Value) -> ApprovalResponse {
        tokio::task::spawn_blocking({
            let tool_name = tool_name.to_string();
            move || {
                eprint!("Allow '{tool_name}'? [y/N/a=always this session] ");
                let _ = std::io::Write::flush(&mut std::io::stderr());
                let mut line = String::new();
                if std::io::stdin().read_line(&mut line).is_err() {
                    return ApprovalResponse::No;
                }
                match line.trim().to_ascii_lowercase().as_str() {
                    "y" | "yes" => ApprovalResponse::Yes,
                    "a" | "always" => ApprovalResponse::AlwaysSession,
                    _ => ApprovalResponse::No,
                }
            }
        })
        .await
        .unwrap_or(ApprovalResponse::No)
    }
}

/// Creates a new session and fires the full `session_switch(New)` fan-out,
/// the privileged operation only the `/handoff` command path performs.
struct ReplSessionCreator {
    store: Arc<SessionStore>,
    event_bus: Arc<EventBus>,
}

#[async_trait]
impl PrivilegedSessionCreator for ReplSessionCreator {
    async fn create_new_session(&self, parent: &Path) -> Option<PathBuf> {
        let (_, path) = self.store.create_session(Some(parent)).ok()?;
        let header = SessionStore::read_header(&path).ok()?;
        self.event_bus
            .fire_session_switch(SwitchReason::New, path.clone(), header)
            .await;
        Some(path)
    }
}

async fn run_repl(cli: &Cli) -> anyhow::Result<()> {
    let config = Config::load()?;
    let permissions = cli.resolve_permissions(&config);

    let Some(api_key) = config.api_key() else {
        anyhow::bail!(
            "No API key configured. Set ANTHROPIC_API_KEY or add one to ~/.switchback/config.toml"
        );
    };
    let model = config.model.clone().unwrap_or_else(|| "claude-sonnet-4-5".to_string());

    let client: Arc<dyn ModelClient> = Arc::new(AnthropicClient::new(api_key));
    let store = Arc::new(SessionStore::open(&config.sessions_dir())?);
    let working_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let printer = ExternalPrinter::default();
    let reedline_ui = Arc::new(ReedlineUi::new(printer.clone()));
    let ui: Arc<dyn UiSurface> = reedline_ui.clone();

    let engine = Arc::new(Engine::new(store.clone(), client.clone(), ui.clone(), model.clone()));
    let mut event_bus = EventBus::new();
    event_bus.register(engine.clone());
    let event_bus = Arc::new(event_bus);

    let mut orchestrator = ToolOrchestrator::with_builtins(
        permissions.mode,
        engine.clone(),
        store.clone(),
        client.clone(),
        model.clone(),
    );
    if !permissions.auto_approve {
        orchestrator.set_approval_handler(Arc::new(StdinApprovalHandler));
    }
    let orchestrator = Arc::new(orchestrator);

    let agent = Arc::new(Agent::new(client, orchestrator, event_bus.clone()));

    let mut session = resolve_initial_session(cli, &store, &working_dir, &model)?;
    let mut persisted = session.messages.len();

    let creator = ReplSessionCreator {
        store: store.clone(),
        event_bus: event_bus.clone(),
    };

    let mut line_editor = Reedline::create()
        .with_external_printer(printer.clone())
        .with_validator(Box::new(ContinuationValidator));
    let prompt = DefaultPrompt::new(
        DefaultPromptSegment::Basic("switchback> ".to_string()),
        DefaultPromptSegment::Empty,
    );

    let _ = printer.print(format!("Session: {}", session.path.display()));

    loop {
        let staged = reedline_ui.take_editor_text();
        if !staged.is_empty() {
            line_editor.run_edit_commands(&[EditCommand::InsertString(staged)]);
        }

        match line_editor.read_line(&prompt) {
            Ok(Signal::Success(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if matches!(line, "/exit" | "/quit") {
                    break;
                }
                if let Some(goal) = line
                    .strip_prefix("/handoff ")
                    .or_else(|| (line == "/handoff").then_some(""))
                {
                    engine.handle_command(&session, goal, &creator).await;
                    continue;
                }

                let transformed = event_bus
                    .fire_input(line.to_string(), vec![], InputSource::Editor)
                    .await;
                let user_content = vec![ContentBlock::Text { text: transformed.text }];
                let (tx, mut rx) = mpsc::channel::<AgentEvent>(100);
                let agent_clone = agent.clone();
                let task_session = session;
                let handle = tokio::spawn(async move {
                    agent_clone.run_task(task_session, user_content, tx, None).await
                });

                while let Some(event) = rx.recv().await {
                    match event {
                        AgentEvent::TextDelta(text) => {
                            let _ = printer.print(text);
                        }
                        AgentEvent::ToolCallStart(id, name, _args) => {
                            let _ = printer.print(format!("> {name}({id})"));
                        }
                        AgentEvent::ToolCallResult(_id, content, is_error) => {
                            if is_error {
                                let _ = printer.print(format!("  error: {content}"));
                            }
                        }
                        AgentEvent::Retry(reason, delay) => {
                            let _ = printer.print(format!("[retrying in {delay}s: {reason}]"));
                        }
                        AgentEvent::HandoffInstead => {
                            let _ = printer.print(
                                "[context nearly full — try /handoff <goal> to continue fresh]"
                                    .to_string(),
                            );
                        }
                        AgentEvent::Error(message) => {
                            let _ = printer.print(format!("error: {message}"));
                        }
                        _ => {}
                    }
                }

                let (returned_session, error) = handle.await?;
                if let Some(e) = error {
                    ui.notify(&format!("{e}"), Severity::Error);
                }
                for message in &returned_session.messages[persisted..] {
                    let _ = store.append_message(&returned_session.path, message);
                }
                persisted = returned_session.messages.len();
                session = returned_session;
            }
            Ok(Signal::CtrlC) => {
                session.abort_token.cancel();
                continue;
            }
            Ok(Signal::CtrlD) => break,
            Err(e) => {
                eprintln!("Input error: {e}");
                break;
            }
        }
    }

    Ok(())
}

fn resolve_initial_session(
    cli: &Cli,
    store: &Arc<SessionStore>,
    working_dir: &Path,
    model: &str,
) -> anyhow::Result<Session> {
    let path = if cli.continue_session {
        store.list_recent(1)?.into_iter().next().map(|s| s.path)
    } else if let Some(id) = &cli.resume {
        store.list_recent(100)?.into_iter().find(|s| &s.id == id).map(|s| s.path)
    } else {
        None
    };

    let path = match path {
        Some(p) => p,
        None => store.create_session(None)?.1,
    };

    let mut session = Session::new(path.clone(), working_dir.to_path_buf(), model.to_string());
    session.messages = store.branch(&path)?;
    Ok(session)
}
