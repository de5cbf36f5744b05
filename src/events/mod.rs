//! The host's lifecycle event bus.
//!
//! Generalized from a tool-lifecycle hook registry (one `HookContext` enum,
//! one `HookResult` type, matched against a single kind) to one event type
//! and modifier per lifecycle moment, because the six events a host fires
//! here carry materially different payloads: a system-prompt string, a
//! session header, a message list, raw editor input, nothing, or a
//! compaction decision. Handlers are composed in registration order.

use crate::provider::Message;
use crate::session::SessionHeader;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchReason {
    New,
    Resume,
}

pub struct BeforeAgentStart {
    pub system_prompt: String,
}

pub struct SessionSwitch {
    pub reason: SwitchReason,
    pub session_path: PathBuf,
    pub header: SessionHeader,
}

pub struct ContextEvent {
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    Editor,
    Paste,
}

pub struct InputEvent {
    pub text: String,
    pub images: Vec<String>,
    pub source: InputSource,
}

pub struct InputTransform {
    pub text: String,
    pub images: Vec<String>,
}

pub struct AgentEnd {
    pub session_path: PathBuf,
}

/// The subset of a compaction's own preparation that the host has already
/// computed before firing the hook — reusing it means the handoff engine
/// never re-gathers the full branch and re-triggers the overflow that
/// caused compaction to run in the first place.
pub struct CompactPreparation {
    pub previous_summary: Option<String>,
    pub messages_to_summarize: Vec<Message>,
    pub usage_pct: Option<u8>,
}

pub struct SessionBeforeCompact {
    pub session_path: PathBuf,
    pub preparation: CompactPreparation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactOutcome {
    Proceed,
    Cancel,
}

/// A handler subscribing to zero or more lifecycle events.
///
/// Every method has a no-op default so a handler interested in only one
/// event need not implement the rest.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn before_agent_start(&self, _event: &BeforeAgentStart) -> Option<String> {
        None
    }

    async fn session_switch(&self, _event: &SessionSwitch) {}

    async fn context(&self, _event: &ContextEvent) -> Option<Vec<Message>> {
        None
    }

    async fn input(&self, _event: &InputEvent) -> Option<InputTransform> {
        None
    }

    async fn agent_end(&self, _event: &AgentEnd) {}

    async fn session_before_compact(&self, _event: &SessionBeforeCompact) -> CompactOutcome {
        CompactOutcome::Proceed
    }
}

#[derive(Default, Clone)]
pub struct EventBus {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub async fn fire_before_agent_start(&self, base_system_prompt: String) -> String {
        let mut prompt = base_system_prompt;
        for handler in &self.handlers {
            let event = BeforeAgentStart {
                system_prompt: prompt.clone(),
            };
            if let Some(replacement) = handler.before_agent_start(&event).await {
                prompt = replacement;
            }
        }
        prompt
    }

    pub async fn fire_session_switch(
        &self,
        reason: SwitchReason,
        session_path: PathBuf,
        header: SessionHeader,
    ) {
        let event = SessionSwitch {
            reason,
            session_path,
            header,
        };
        for handler in &self.handlers {
            handler.session_switch(&event).await;
        }
    }

    pub async fn fire_context(&self, messages: Vec<Message>) -> Vec<Message> {
        let mut current = messages;
        for handler in &self.handlers {
            let event = ContextEvent {
                messages: current.clone(),
            };
            if let Some(replacement) = handler.context(&event).await {
                current = replacement;
            }
        }
        current
    }

    pub async fn fire_input(
        &self,
        text: String,
        images: Vec<String>,
        source: InputSource,
    ) -> InputTransform {
        let mut current = InputTransform { text, images };
        for handler in &self.handlers {
            let event = InputEvent {
                text: current.text.clone(),
                images: current.images.clone(),
                source,
            };
            if let Some(replacement) = handler.input(&event).await {
                current = replacement;
            }
        }
        current
    }

    pub async fn fire_agent_end(&self, session_path: PathBuf) {
        let event = AgentEnd { session_path };
        for handler in &self.handlers {
            handler.agent_end(&event).await;
        }
    }

    pub async fn fire_session_before_compact(
        &self,
        session_path: PathBuf,
        preparation: CompactPreparation,
    ) -> CompactOutcome {
        let event = SessionBeforeCompact {
            session_path,
            preparation,
        };
        for handler in &self.handlers {
            if handler.session_before_compact(&event).await == CompactOutcome::Cancel {
                return CompactOutcome::Cancel;
            }
        }
        CompactOutcome::Proceed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn agent_end(&self, _event: &AgentEnd) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct PromptAppender;

    #[async_trait]
    impl EventHandler for PromptAppender {
        async fn before_agent_start(&self, event: &BeforeAgentStart) -> Option<String> {
            Some(format!("{}\nhint", event.system_prompt))
        }
    }

    #[tokio::test]
    async fn test_handlers_fire_in_registration_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut bus = EventBus::new();
        bus.register(Arc::new(CountingHandler {
            calls: calls.clone(),
        }));
        bus.register(Arc::new(CountingHandler {
            calls: calls.clone(),
        }));
        bus.fire_agent_end(PathBuf::from("/tmp/s.jsonl")).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_before_agent_start_composes() {
        let mut bus = EventBus::new();
        bus.register(Arc::new(PromptAppender));
        let result = bus.fire_before_agent_start("base".to_string()).await;
        assert_eq!(result, "base\nhint");
    }

    #[tokio::test]
    async fn test_compact_cancel_short_circuits() {
        struct Canceller;
        #[async_trait]
        impl EventHandler for Canceller {
            async fn session_before_compact(&self, _event: &SessionBeforeCompact) -> CompactOutcome {
                CompactOutcome::Cancel
            }
        }
        let mut bus = EventBus::new();
        bus.register(Arc::new(Canceller));
        let outcome = bus
            .fire_session_before_compact(
                PathBuf::from("/tmp/s.jsonl"),
                CompactPreparation {
                    previous_summary: None,
                    messages_to_summarize: vec![],
                    usage_pct: Some(92),
                },
            )
            .await;
        assert_eq!(outcome, CompactOutcome::Cancel);
    }
}
