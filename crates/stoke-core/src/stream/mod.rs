//! Streaming response parser (spec §4.4). Turns a sequence of
//! [`StreamChunk`](crate::provider::StreamChunk)s into the bracketed
//! `*_start`/`*_content`/`*_end` [`AgentEvent`] triples, and — once a tool
//! call closes — the raw XML text ready for [`stoke_tools::parse_tool_call`].

mod extractor;

pub use extractor::{ExtractedChunk, ToolCallExtractor};

use crate::event::AgentEvent;
use crate::provider::StreamChunk;

/// Spec §4.4 rule 1: a stream error that is really just the user stopping
/// the turn must not surface as an [`AgentEvent::Error`].
fn is_cancellation_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("context canceled")
        || lower.contains("context cancelled")
        || lower.contains("deadline exceeded")
        || lower.contains("stream read error: context canceled")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Thinking,
    Message,
    ToolCall,
}

/// Drives one assistant turn's worth of [`StreamChunk`]s into [`AgentEvent`]s.
///
/// A single instance is scoped to one turn: construct it fresh per turn,
/// feed chunks in order, and read back [`StreamParser::tool_call_xml`] once
/// a tool call has closed.
#[derive(Debug)]
pub struct StreamParser {
    phase: Phase,
    extractor: ToolCallExtractor,
    tool_call_xml: String,
    message_text: String,
    canceled: bool,
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamParser {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            extractor: ToolCallExtractor::new(),
            tool_call_xml: String::new(),
            message_text: String::new(),
            canceled: false,
        }
    }

    /// Text accumulated from completed non-thinking message content so far
    /// this turn (used to build the assistant [`Message`](crate::memory::Message)).
    pub fn message_text(&self) -> &str {
        &self.message_text
    }

    /// Raw inner text of the most recently closed `<tool>...</tool>` span,
    /// if any.
    pub fn tool_call_xml(&self) -> Option<&str> {
        if self.tool_call_xml.is_empty() {
            None
        } else {
            Some(&self.tool_call_xml)
        }
    }

    pub fn saw_tool_call(&self) -> bool {
        !self.tool_call_xml.is_empty()
    }

    /// Consume one chunk, producing the events it implies. A cancellation
    /// signal observed mid-stream is recorded but never turned into an
    /// [`AgentEvent::Error`] here — the caller decides how to surface
    /// cancellation (spec §4.4: "cancellation suppresses in-flight parse
    /// errors").
    pub fn feed(&mut self, chunk: StreamChunk) -> Vec<AgentEvent> {
        let mut events = Vec::new();

        if let Some(message) = chunk.error {
            self.close_phase(&mut events);
            self.phase = Phase::Idle;
            if !is_cancellation_message(&message) {
                events.push(AgentEvent::error(crate::error::ErrorKind::LlmFailure, message));
            }
            return events;
        }

        if chunk.is_thinking {
            self.enter_thinking(&mut events);
            if let Some(text) = chunk.content {
                if !text.is_empty() {
                    events.push(AgentEvent::ThinkingContent { text });
                }
            }
        } else if let Some(text) = chunk.content {
            self.exit_thinking(&mut events);
            for extracted in self.extractor.feed(&text) {
                self.apply_extracted(extracted, &mut events);
            }
        }

        if chunk.is_last {
            self.close(&mut events);
        }

        events
    }

    pub fn cancel(&mut self) {
        self.canceled = true;
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled
    }

    /// Force-closes whatever sub-stream is open without a trailing
    /// `StreamChunk` to trigger it — the cancellation path (spec §4.4 rule
    /// 1: a canceled turn still emits the closing `*_end` events for
    /// whatever was mid-flight).
    pub fn flush(&mut self) -> Vec<AgentEvent> {
        let mut events = Vec::new();
        self.close(&mut events);
        events
    }

    fn enter_thinking(&mut self, events: &mut Vec<AgentEvent>) {
        if self.phase != Phase::Thinking {
            self.close_phase(events);
            events.push(AgentEvent::ThinkingStart);
            self.phase = Phase::Thinking;
        }
    }

    fn exit_thinking(&mut self, events: &mut Vec<AgentEvent>) {
        if self.phase == Phase::Thinking {
            events.push(AgentEvent::ThinkingEnd);
            self.phase = Phase::Idle;
        }
    }

    fn apply_extracted(&mut self, extracted: ExtractedChunk, events: &mut Vec<AgentEvent>) {
        match extracted {
            ExtractedChunk::Message(text) => {
                if self.phase != Phase::Message {
                    self.close_phase(events);
                    events.push(AgentEvent::MessageStart);
                    self.phase = Phase::Message;
                }
                if !text.is_empty() {
                    self.message_text.push_str(&text);
                    events.push(AgentEvent::MessageContent { text });
                }
            }
            ExtractedChunk::ToolCall(text) => {
                if self.phase != Phase::ToolCall {
                    self.close_phase(events);
                    events.push(AgentEvent::ToolCallStart);
                    self.phase = Phase::ToolCall;
                }
                if !text.is_empty() {
                    self.tool_call_xml.push_str(&text);
                    events.push(AgentEvent::ToolCallContent { text });
                }
            }
        }
    }

    fn close_phase(&mut self, events: &mut Vec<AgentEvent>) {
        match self.phase {
            Phase::Thinking => events.push(AgentEvent::ThinkingEnd),
            Phase::Message => events.push(AgentEvent::MessageEnd),
            Phase::ToolCall => events.push(AgentEvent::ToolCallEnd),
            Phase::Idle => {}
        }
    }

    fn close(&mut self, events: &mut Vec<AgentEvent>) {
        for extracted in self.extractor.flush() {
            self.apply_extracted(extracted, events);
        }
        self.close_phase(events);
        self.phase = Phase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(events: &[AgentEvent]) -> Vec<&'static str> {
        events
            .iter()
            .map(|e| match e {
                AgentEvent::ThinkingStart => "thinking_start",
                AgentEvent::ThinkingContent { .. } => "thinking_content",
                AgentEvent::ThinkingEnd => "thinking_end",
                AgentEvent::MessageStart => "message_start",
                AgentEvent::MessageContent { .. } => "message_content",
                AgentEvent::MessageEnd => "message_end",
                AgentEvent::ToolCallStart => "tool_call_start",
                AgentEvent::ToolCallContent { .. } => "tool_call_content",
                AgentEvent::ToolCallEnd => "tool_call_end",
                _ => "other",
            })
            .collect()
    }

    #[test]
    fn plain_message_turn() {
        let mut parser = StreamParser::new();
        let mut events = parser.feed(StreamChunk::text("hello"));
        events.extend(parser.feed(StreamChunk::last()));
        assert_eq!(
            kinds(&events),
            vec!["message_start", "message_content", "message_end"]
        );
        assert_eq!(parser.message_text(), "hello");
        assert!(!parser.saw_tool_call());
    }

    #[test]
    fn thinking_then_message_then_tool_call() {
        let mut parser = StreamParser::new();
        let mut events = parser.feed(StreamChunk::thinking("pondering"));
        events.extend(parser.feed(StreamChunk::text("Sure, running it. ")));
        events.extend(parser.feed(StreamChunk::text(
            "<tool><tool_name>ls</tool_name></tool>",
        )));
        events.extend(parser.feed(StreamChunk::last()));

        assert_eq!(
            kinds(&events),
            vec![
                "thinking_start",
                "thinking_content",
                "thinking_end",
                "message_start",
                "message_content",
                "message_end",
                "tool_call_start",
                "tool_call_content",
                "tool_call_end",
            ]
        );
        assert_eq!(
            parser.tool_call_xml(),
            Some("<tool><tool_name>ls</tool_name></tool>")
        );
    }

    #[test]
    fn tag_split_across_chunks_still_closes_cleanly() {
        let mut parser = StreamParser::new();
        let mut events = parser.feed(StreamChunk::text("go <to"));
        events.extend(parser.feed(StreamChunk::text("ol><tool_name>ls</tool_name></to")));
        events.extend(parser.feed(StreamChunk::text("ol>")));
        events.extend(parser.feed(StreamChunk::last()));

        assert!(parser.saw_tool_call());
        assert_eq!(
            parser.tool_call_xml(),
            Some("<tool><tool_name>ls</tool_name></tool>")
        );
        assert!(kinds(&events).contains(&"tool_call_end"));
    }

    #[test]
    fn flush_closes_an_open_message_phase_without_a_final_chunk() {
        let mut parser = StreamParser::new();
        let mut events = parser.feed(StreamChunk::text("partial"));
        events.extend(parser.flush());

        assert_eq!(kinds(&events), vec!["message_start", "message_content", "message_end"]);
        assert_eq!(parser.message_text(), "partial");
    }

    #[test]
    fn cancellation_flag_is_observable() {
        let mut parser = StreamParser::new();
        assert!(!parser.is_canceled());
        parser.cancel();
        assert!(parser.is_canceled());
    }

    #[test]
    fn cancellation_error_chunk_closes_the_open_substream_without_an_error_event() {
        let mut parser = StreamParser::new();
        let mut events = parser.feed(StreamChunk::text("partial answer"));
        events.extend(parser.feed(StreamChunk::error("stream read error: context canceled")));

        assert_eq!(kinds(&events), vec!["message_start", "message_content", "message_end"]);
        assert!(!events.iter().any(|e| matches!(e, AgentEvent::Error { .. })));
    }

    #[test]
    fn real_stream_error_closes_substream_and_emits_error() {
        let mut parser = StreamParser::new();
        let mut events = parser.feed(StreamChunk::text("partial answer"));
        events.extend(parser.feed(StreamChunk::error("provider returned HTTP 500")));

        assert_eq!(
            kinds(&events),
            vec!["message_start", "message_content", "message_end", "other"]
        );
        assert!(events.iter().any(|e| matches!(e, AgentEvent::Error { .. })));
    }
}
