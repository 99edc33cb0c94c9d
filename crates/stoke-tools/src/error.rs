use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure modes a tool call can hit on the way from raw XML to a result
/// string. Kinds mirror [`crate::xml::XmlErrorKind`] and the agent core's
/// circuit-breaker error kinds so a failure can be tracked without string
/// comparison.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("tool name must not be empty")]
    MissingToolName,

    #[error("invalid tool-call xml: {0}")]
    InvalidXml(String),

    #[error("invalid parameters for {tool_name}: {message}")]
    InvalidParams { tool_name: String, message: String },

    #[error("{tool_name} failed: {message}")]
    Execution { tool_name: String, message: String },

    #[error("{0} was cancelled")]
    Cancelled(String),

    #[error("{0} timed out")]
    Timeout(String),

    #[error("{0} requires approval to run")]
    DeniedByUser(String),
}

impl ToolError {
    pub fn execution<T: Into<String>, M: Into<String>>(tool_name: T, message: M) -> Self {
        ToolError::Execution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    pub fn invalid_params<T: Into<String>, M: Into<String>>(tool_name: T, message: M) -> Self {
        ToolError::InvalidParams {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }
}

/// Raised by [`crate::registry::ToolRegistry::register`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool name must not be empty")]
    EmptyName,

    #[error("a tool named {0:?} is already registered")]
    DuplicateName(String),
}
