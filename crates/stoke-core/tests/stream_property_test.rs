//! Property test for the streaming parser's bracketing invariant (spec §8:
//! "for every `*_start` event, an `*_end` of the same sub-stream follows
//! before any other sub-stream's `*_start`"), run against arbitrary chunk
//! sequences rather than the hand-picked scenarios in `agent_loop_test.rs`.

use proptest::prelude::*;

use stoke_core::event::AgentEvent;
use stoke_core::provider::StreamChunk;
use stoke_core::stream::StreamParser;

#[derive(Debug, Clone)]
enum Piece {
    Thinking(String),
    Message(String),
    ToolCallOpen,
    ToolCallClose,
}

fn arb_piece() -> impl Strategy<Value = Piece> {
    prop_oneof![
        "[a-z ]{0,8}".prop_map(Piece::Thinking),
        "[a-z ]{0,8}".prop_map(Piece::Message),
        Just(Piece::ToolCallOpen),
        Just(Piece::ToolCallClose),
    ]
}

/// Turns an arbitrary sequence of pieces into `StreamChunk`s, keeping
/// `<tool>`/`</tool>` balanced (an unclosed tag is a parser edge case
/// covered directly by `extractor.rs`'s own unit tests, not this property).
fn pieces_to_chunks(pieces: Vec<Piece>) -> Vec<StreamChunk> {
    let mut chunks = Vec::new();
    let mut tool_open = false;
    for piece in pieces {
        match piece {
            Piece::Thinking(text) => chunks.push(StreamChunk::thinking(text)),
            Piece::Message(text) => {
                if !text.is_empty() {
                    chunks.push(StreamChunk::text(text));
                }
            }
            Piece::ToolCallOpen if !tool_open => {
                chunks.push(StreamChunk::text("<tool>"));
                tool_open = true;
            }
            Piece::ToolCallClose if tool_open => {
                chunks.push(StreamChunk::text("</tool>"));
                tool_open = false;
            }
            _ => {}
        }
    }
    if tool_open {
        chunks.push(StreamChunk::text("</tool>"));
    }
    chunks.push(StreamChunk::last());
    chunks
}

/// Which bracketed sub-stream (if any) a kind of event belongs to.
fn bracket_of(event: &AgentEvent) -> Option<&'static str> {
    match event {
        AgentEvent::ThinkingStart | AgentEvent::ThinkingContent { .. } | AgentEvent::ThinkingEnd => Some("thinking"),
        AgentEvent::MessageStart | AgentEvent::MessageContent { .. } | AgentEvent::MessageEnd => Some("message"),
        AgentEvent::ToolCallStart | AgentEvent::ToolCallContent { .. } | AgentEvent::ToolCallEnd => Some("tool_call"),
        _ => None,
    }
}

fn is_start(event: &AgentEvent) -> bool {
    matches!(event, AgentEvent::ThinkingStart | AgentEvent::MessageStart | AgentEvent::ToolCallStart)
}

fn is_end(event: &AgentEvent) -> bool {
    matches!(event, AgentEvent::ThinkingEnd | AgentEvent::MessageEnd | AgentEvent::ToolCallEnd)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn every_start_is_closed_before_a_different_substream_starts(pieces in prop::collection::vec(arb_piece(), 0..20)) {
        let chunks = pieces_to_chunks(pieces);
        let mut parser = StreamParser::new();
        let mut events = Vec::new();
        for chunk in chunks {
            events.extend(parser.feed(chunk));
        }
        events.extend(parser.flush());

        let mut open: Option<&'static str> = None;
        for event in &events {
            if let Some(stream) = bracket_of(event) {
                if is_start(event) {
                    prop_assert!(open.is_none(), "a new sub-stream started while {:?} was still open", open);
                    open = Some(stream);
                } else if is_end(event) {
                    prop_assert_eq!(open, Some(stream), "end event for a sub-stream that wasn't open");
                    open = None;
                }
            }
        }
        prop_assert!(open.is_none(), "a sub-stream was left open at the end of the turn: {:?}", open);
    }
}
