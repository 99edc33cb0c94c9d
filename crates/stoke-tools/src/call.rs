use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::xml::ParsedToolCall;

/// A tool invocation extracted from the model's `<tool>` XML (spec §3).
///
/// Built once from the streaming parser's buffered tool-call content,
/// validated against the registry, and dispatched exactly once — it is
/// never reused across iterations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub server_name: String,
    pub tool_name: String,
    /// Raw, unparsed inner XML of `<arguments>`; the tool parses this
    /// against its own schema.
    pub arguments_xml: String,
}

impl ToolCall {
    pub fn new(server_name: impl Into<String>, tool_name: impl Into<String>, arguments_xml: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            server_name: server_name.into(),
            tool_name: tool_name.into(),
            arguments_xml: arguments_xml.into(),
        }
    }

    pub fn is_execute_command(&self) -> bool {
        self.tool_name == crate::tool::EXECUTE_COMMAND_TOOL_NAME
    }
}

impl From<ParsedToolCall> for ToolCall {
    fn from(parsed: ParsedToolCall) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            server_name: parsed.server_name,
            tool_name: parsed.tool_name,
            arguments_xml: parsed.arguments_xml,
        }
    }
}
