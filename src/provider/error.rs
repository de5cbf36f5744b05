//! Provider error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("missing API key for {backend}. Set {env_var}")]
    MissingApiKey { backend: String, env_var: String },

    #[error("API error: {0}")]
    Api(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("cancelled")]
    Cancelled,
}
