use crate::agent::instructions::InstructionLoader;
use crate::provider::{Message, ToolDefinition};
use minijinja::{context, Environment};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct ContextManager {
    env: Environment<'static>,
    system_prompt_base: String,
    instruction_loader: Option<Arc<InstructionLoader>>,
    render_cache: Mutex<Option<String>>,
    working_dir: Option<PathBuf>,
    dirty: AtomicBool,
}

pub struct ContextAssembly {
    pub system_prompt: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
}

const DEFAULT_SYSTEM_TEMPLATE: &str = r#"{{ base_instructions }}
{% if working_dir %}
## Environment

Working directory: {{ working_dir }}
Date: {{ date }}
{% endif %}
{% if instructions %}
## Project Instructions

{{ instructions }}
{% endif %}
"#;

impl ContextManager {
    #[must_use]
    pub fn new(system_prompt_base: String) -> Self {
        let mut env = Environment::new();
        env.add_template("system", DEFAULT_SYSTEM_TEMPLATE)
            .expect("DEFAULT_SYSTEM_TEMPLATE must be valid minijinja syntax");

        Self {
            env,
            system_prompt_base,
            instruction_loader: None,
            render_cache: Mutex::new(None),
            working_dir: None,
            dirty: AtomicBool::new(true),
        }
    }

    /// Set the instruction loader for AGENTS.md support.
    #[must_use]
    pub fn with_instruction_loader(mut self, loader: Arc<InstructionLoader>) -> Self {
        self.instruction_loader = Some(loader);
        self
    }

    /// Set the working directory for environment context in the system prompt.
    #[must_use]
    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    /// Force the next `get_system_prompt`/`assemble` call to re-render.
    pub fn invalidate(&self) {
        self.dirty.store(true, Ordering::Relaxed);
    }

    /// Get just the system prompt (cached), without assembling messages.
    pub async fn get_system_prompt(&self) -> String {
        let mut cache = self.render_cache.lock().await;
        if !self.dirty.load(Ordering::Relaxed)
            && let Some(ref rendered) = *cache
        {
            return rendered.clone();
        }
        let rendered = self.render_system_prompt();
        *cache = Some(rendered.clone());
        self.dirty.store(false, Ordering::Relaxed);
        rendered
    }

    pub async fn assemble(&self, history: &[Message], available_tools: Vec<ToolDefinition>) -> ContextAssembly {
        let system_prompt = self.get_system_prompt().await;
        ContextAssembly {
            system_prompt,
            messages: history.to_vec(),
            tools: available_tools,
        }
    }

    fn render_system_prompt(&self) -> String {
        let template = self
            .env
            .get_template("system")
            .expect("system template must exist - added in constructor");

        let instructions = self.instruction_loader.as_ref().and_then(|loader| loader.load_all());

        let working_dir = self.working_dir.as_ref().map(|d| d.display().to_string());
        let date = if self.working_dir.is_some() {
            Some(chrono::Local::now().format("%Y-%m-%d").to_string())
        } else {
            None
        };

        template
            .render(context! {
                base_instructions => self.system_prompt_base,
                working_dir => working_dir,
                date => date,
                instructions => instructions,
            })
            .unwrap_or_else(|e| {
                tracing::error!("Failed to render system prompt template: {}", e);
                self.system_prompt_base.clone()
            })
    }
}
