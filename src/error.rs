//! Error types for the financial agent service

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {

    // =============================
    // Request-Fatal Errors
    // =============================

    #[error("Agent unavailable: {0}")]
    AgentUnavailable(String),

    #[error("Conversation {0} not found")]
    ConversationNotFound(Uuid),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    // =============================
    // Contract Errors (fail fast)
    // =============================

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid analysis period: {0}")]
    InvalidPeriod(String),

    #[error("Invalid tool input: {0}")]
    InvalidToolInput(String),

    // =============================
    // Recoverable Tool Errors
    // =============================

    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl AgentError {
    /// Tool-level failures that degrade a single tool's contribution
    /// without aborting the whole request.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AgentError::DataUnavailable(_) | AgentError::UpstreamTimeout(_)
        )
    }
}
