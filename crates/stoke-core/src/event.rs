use serde::{Deserialize, Serialize};
use serde_json::Value;
use stoke_tools::ToolCall;

use crate::error::ErrorKind;

/// The closed set of event kinds the core emits on the event channel
/// (spec §4.1). Adding a kind is a deliberate change, not something a
/// single producer should do unilaterally.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentEvent {
    ThinkingStart,
    ThinkingContent { text: String },
    ThinkingEnd,

    MessageStart,
    MessageContent { text: String },
    MessageEnd,

    ToolCallStart,
    ToolCallContent { text: String },
    ToolCallEnd,

    /// The validated, dispatch-ready call (post-XML-parse, post-registry
    /// lookup).
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        server_name: String,
    },
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        result: String,
    },
    ToolResultError {
        tool_call_id: String,
        tool_name: String,
        error: String,
        kind: ErrorKind,
    },

    NoToolCall,

    ApiCallStart {
        context_tokens: usize,
        max_context_tokens: usize,
    },
    ApiCallEnd,

    ToolsUpdate {
        tool_names: Vec<String>,
    },

    UpdateBusy {
        busy: bool,
    },

    TokenUsage {
        prompt_tokens: usize,
        completion_tokens: usize,
        cumulative_tokens: usize,
    },

    SummarizationStart,
    SummarizationProgress {
        items_processed: usize,
        total_items: usize,
        percent: f64,
    },
    SummarizationEnd,

    ToolApprovalRequest {
        approval_id: String,
        tool_name: String,
        arguments: Value,
        preview: Option<String>,
    },

    CommandExecutionStarted {
        tool_call_id: String,
        command: String,
    },
    CommandExecutionOutputChunk {
        tool_call_id: String,
        chunk: String,
        is_stderr: bool,
    },
    CommandExecutionCompleted {
        tool_call_id: String,
        exit_code: i32,
    },

    TurnEnd,

    Error {
        kind: ErrorKind,
        message: String,
    },
}

/// Wraps every event with a monotonically increasing sequence number,
/// scoped to one agent instance, so a subscriber that attaches mid-turn
/// can detect gaps or reconstruct order without relying on channel
/// delivery order alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequencedEvent {
    pub seq: u64,
    pub event: AgentEvent,
}

impl AgentEvent {
    pub fn tool_call(call: &ToolCall) -> Self {
        AgentEvent::ToolCall {
            tool_call_id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            server_name: call.server_name.clone(),
        }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        AgentEvent::Error {
            kind,
            message: message.into(),
        }
    }
}
