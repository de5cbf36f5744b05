//! The model-client boundary.
//!
//! The handoff engine needs exactly one capability from a model backend: a
//! single non-streaming completion. Multi-provider routing, streaming, and
//! credential flows belong to a full agent host but carry no weight for
//! handoff, so only one concrete backend is implemented here.

mod anthropic;
mod error;
mod types;

pub use anthropic::AnthropicClient;
pub use error::Error as ProviderError;
pub use types::{
    ChatRequest, CompletionOutcome, ContentBlock, Message, Role, ToolCallEvent, ToolDefinition,
    Usage,
};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A model backend capable of a single non-streaming completion.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Identifier used in logs and error messages (e.g. `"anthropic"`).
    fn id(&self) -> &str;

    async fn complete(&self, request: ChatRequest, abort: CancellationToken) -> CompletionOutcome;
}
