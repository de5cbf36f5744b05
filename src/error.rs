use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("provider error: {0}")]
    Provider(#[from] crate::provider::ProviderError),

    #[error("tool error: {0}")]
    Tool(#[from] crate::tool::ToolError),

    #[error("session error: {0}")]
    Session(#[from] crate::session::SessionStoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("agent error: {0}")]
    Agent(String),
}

pub type Result<T> = std::result::Result<T, Error>;
