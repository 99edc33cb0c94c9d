use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use tokio_util::sync::CancellationToken;

use crate::memory::Message;

/// A single chunk from the provider's stream (spec §6.2). Chunks are
/// non-restartable: the agent loop consumes them once, in order.
#[derive(Debug, Clone, Default)]
pub struct StreamChunk {
    pub role: Option<String>,
    pub content: Option<String>,
    pub is_thinking: bool,
    pub is_last: bool,
    pub error: Option<String>,
}

impl StreamChunk {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn thinking(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            is_thinking: true,
            ..Default::default()
        }
    }

    pub fn last() -> Self {
        Self {
            is_last: true,
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            is_last: true,
            ..Default::default()
        }
    }
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = StreamChunk> + Send>>;

/// Injected capability for talking to a concrete LLM (spec §6.2). The
/// concrete HTTP client is out of scope for this crate; tests and the
/// executor supply an implementation.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn stream_completion(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
        token: CancellationToken,
    ) -> Result<ChunkStream, String>;
}
