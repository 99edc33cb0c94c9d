use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ToolError;
use crate::schema::InputSchema;

/// Name of the one tool the approval manager treats specially: its
/// approval decision is driven by a command whitelist instead of the
/// per-tool auto-approval flag (spec §4.6.1, §9 open question 3).
pub const EXECUTE_COMMAND_TOOL_NAME: &str = "execute_command";

/// Progress forwarded from a running tool to the agent's event stream.
/// Tools never see [`crate::AgentEvent`][agent-event] directly — that type
/// lives in `stoke-core`, which depends on `stoke-tools` and not the other
/// way around — so this is the narrow vocabulary a tool can emit through,
/// forwarded by the core as `command_execution_*` events (spec §4.1).
///
/// [agent-event]: https://docs.rs/stoke-core (out of crate)
#[derive(Debug, Clone)]
pub enum ToolProgressEvent {
    CommandExecutionStarted { command: String },
    CommandExecutionOutputChunk { chunk: String, is_stderr: bool },
    CommandExecutionCompleted { exit_code: i32 },
}

/// Sink a tool execution context forwards [`ToolProgressEvent`]s to.
/// Implemented by the agent core so the event reaches the executor's
/// event channel without this crate knowing about `AgentEvent`.
pub trait ToolEventSink: Send + Sync {
    fn emit(&self, tool_call_id: &str, event: ToolProgressEvent);
}

/// A no-op sink, useful for unit-testing tools in isolation.
pub struct NullEventSink;

impl ToolEventSink for NullEventSink {
    fn emit(&self, _tool_call_id: &str, _event: ToolProgressEvent) {}
}

/// Minimal context passed to `Tool::execute`, exposing only event emission
/// and a read-only registry view instead of the whole agent (spec §9:
/// "Cyclic / back-references").
#[derive(Clone)]
pub struct ExecutionContext {
    pub session_id: String,
    pub tool_call_id: String,
    pub cancellation_token: CancellationToken,
    pub timeout: Duration,
    event_sink: Arc<dyn ToolEventSink>,
}

impl ExecutionContext {
    pub fn new(
        session_id: impl Into<String>,
        tool_call_id: impl Into<String>,
        cancellation_token: CancellationToken,
        event_sink: Arc<dyn ToolEventSink>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            tool_call_id: tool_call_id.into(),
            cancellation_token,
            timeout: Duration::from_secs(300),
            event_sink,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn emit(&self, event: ToolProgressEvent) {
        self.event_sink.emit(&self.tool_call_id, event);
    }
}

/// A capability the agent core can dispatch a parsed [`crate::ToolCall`]
/// to (spec §3: "Tool (capability set)").
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn input_schema(&self) -> InputSchema;

    /// Successful execution ends the turn (spec glossary: "loop-breaking
    /// tool").
    fn is_loop_breaking(&self) -> bool {
        false
    }

    /// Per-tool auto-approval flag (spec §4.6.1). Ignored for
    /// [`EXECUTE_COMMAND_TOOL_NAME`], which is governed by the command
    /// whitelist instead.
    fn auto_approved(&self) -> bool {
        false
    }

    async fn execute(&self, arguments_xml: &str, ctx: &ExecutionContext) -> Result<String, ToolError>;

    /// Optional `Previewable` capability (spec §3): synthesize a
    /// diff/command-summary before approval. `None` means the tool does
    /// not support previews.
    async fn generate_preview(&self, _arguments_xml: &str) -> Option<Result<String, ToolError>> {
        None
    }
}
