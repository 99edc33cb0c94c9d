//! Tool trait, registry, and the `<tool>` XML wire format consumed by the
//! Stoke agent core.

pub mod call;
pub mod error;
pub mod registry;
pub mod schema;
pub mod tool;
pub mod xml;

pub use call::ToolCall;
pub use error::{RegistryError, ToolError};
pub use registry::ToolRegistry;
pub use schema::{InputSchema, ToolSchema};
pub use tool::{ExecutionContext, NullEventSink, Tool, ToolEventSink, ToolProgressEvent, EXECUTE_COMMAND_TOOL_NAME};
pub use xml::{extract_arg_text, parse_tool_call, partial_tool_name, ParsedToolCall, XmlErrorKind, XmlParseError};
