use serde::{Deserialize, Serialize};
use thiserror::Error;
use stoke_tools::ToolError;

/// Closed taxonomy of agent failure modes (spec §7). This is the value the
/// circuit breaker compares, not a string — keep it `Copy` so tracking a
/// failure never allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NoToolCall,
    InvalidXml,
    MissingToolName,
    UnknownTool,
    ToolExecution,
    CircuitBreaker,
    LlmFailure,
    ContextCanceled,
    ApprovalTimeout,
    ApprovalRejected,
    Internal,
}

impl ErrorKind {
    /// Recoverable kinds are surfaced as events *and* re-fed to the model
    /// as a synthetic user message on the next iteration (spec §7).
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            ErrorKind::NoToolCall
                | ErrorKind::InvalidXml
                | ErrorKind::MissingToolName
                | ErrorKind::UnknownTool
                | ErrorKind::ToolExecution
                | ErrorKind::ApprovalTimeout
                | ErrorKind::ApprovalRejected
        )
    }
}

#[derive(Error, Debug, Clone)]
pub enum AgentError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("invalid tool-call xml: {0}")]
    InvalidXml(String),

    #[error("tool name missing or empty")]
    MissingToolName,

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("the model produced no tool call")]
    NoToolCall,

    #[error("circuit breaker tripped: last {0} errors were all {1:?}")]
    CircuitBreaker(usize, ErrorKind),

    #[error("llm call failed: {0}")]
    LlmFailure(String),

    #[error("operation was cancelled")]
    ContextCanceled,

    #[error("approval request timed out")]
    ApprovalTimeout,

    #[error("approval request was rejected")]
    ApprovalRejected,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::Tool(_) => ErrorKind::ToolExecution,
            AgentError::InvalidXml(_) => ErrorKind::InvalidXml,
            AgentError::MissingToolName => ErrorKind::MissingToolName,
            AgentError::UnknownTool(_) => ErrorKind::UnknownTool,
            AgentError::NoToolCall => ErrorKind::NoToolCall,
            AgentError::CircuitBreaker(_, _) => ErrorKind::CircuitBreaker,
            AgentError::LlmFailure(_) => ErrorKind::LlmFailure,
            AgentError::ContextCanceled => ErrorKind::ContextCanceled,
            AgentError::ApprovalTimeout => ErrorKind::ApprovalTimeout,
            AgentError::ApprovalRejected => ErrorKind::ApprovalRejected,
            AgentError::Internal(_) => ErrorKind::Internal,
        }
    }
}
