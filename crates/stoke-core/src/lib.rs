//! Core agent runtime: owns the conversation loop, the streaming parser,
//! human-approval gating, bounded memory with summarization, and the
//! circuit breaker that keeps a turn from digging itself into a hole.
//! Front ends talk to it purely through the channel set in [`channel`].

pub mod agent;
pub mod approval;
pub mod breaker;
pub mod channel;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod memory;
pub mod provider;
pub mod stream;

pub use agent::Agent;
pub use approval::{ApprovalManager, CommandWhitelist, DEFAULT_APPROVAL_TIMEOUT};
pub use breaker::CircuitBreaker;
pub use channel::{channel_set, AgentChannels, AgentHandle, AgentInput, ApprovalResponse, DEFAULT_CHANNEL_CAPACITY};
pub use config::{AgentConfig, AgentConfigBuilder};
pub use context::{BufferedToolCallSummarizer, ContextManager, SummarizationStrategy};
pub use error::{AgentError, ErrorKind};
pub use event::AgentEvent;
pub use memory::{Memory, Message, Role, Tokenizer};
pub use provider::{ChunkStream, LLMProvider, StreamChunk};
pub use stream::StreamParser;
