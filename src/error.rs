//! Agent error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Security violation: {0}")]
    Security(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("SQL generation error: {0}")]
    Generation(String),

    #[error("SQL validation error: {0}")]
    Validation(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Context retrieval error: {0}")]
    Context(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;
