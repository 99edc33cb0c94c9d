//! Splits a growing text buffer into a "message" substream and a
//! "tool-call" substream by locating the first top-level `<tool>...</tool>`
//! span (spec §4.4.1). Tag boundaries may fall across chunk feeds, so a
//! pending tail is buffered until it can be unambiguously classified.

const OPEN_TAG: &str = "<tool>";
const CLOSE_TAG: &str = "</tool>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Message,
    ToolCall,
}

/// One piece of classified output from [`ToolCallExtractor::feed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedChunk {
    Message(String),
    ToolCall(String),
}

#[derive(Debug, Default)]
pub struct ToolCallExtractor {
    mode: Option<Mode>,
    /// Bytes not yet safely classified (might be a partial `<tool>`/`</tool>`
    /// tag boundary).
    pending: String,
}

impl ToolCallExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed new text, returning the chunks that can now be unambiguously
    /// classified. Call [`Self::flush`] once the stream ends to drain
    /// whatever remains buffered.
    pub fn feed(&mut self, text: &str) -> Vec<ExtractedChunk> {
        self.pending.push_str(text);
        self.drain(false)
    }

    pub fn flush(&mut self) -> Vec<ExtractedChunk> {
        self.drain(true)
    }

    fn drain(&mut self, is_final: bool) -> Vec<ExtractedChunk> {
        let mut out = Vec::new();

        loop {
            match self.mode {
                None => {
                    if let Some(idx) = self.pending.find(OPEN_TAG) {
                        if idx > 0 {
                            let message_text = self.pending[..idx].to_string();
                            out.push(ExtractedChunk::Message(message_text));
                        }
                        let after = idx + OPEN_TAG.len();
                        self.pending = self.pending[after..].to_string();
                        out.push(ExtractedChunk::ToolCall(OPEN_TAG.to_string()));
                        self.mode = Some(Mode::ToolCall);
                        continue;
                    }

                    // No full "<tool>" yet. Hold back a tail that could be
                    // the start of one so we never split it mid-tag.
                    let safe_len = longest_prefix_match_len(&self.pending, OPEN_TAG);
                    if is_final {
                        if !self.pending.is_empty() {
                            out.push(ExtractedChunk::Message(std::mem::take(&mut self.pending)));
                        }
                        break;
                    }
                    if self.pending.len() > safe_len {
                        let split_at = self.pending.len() - safe_len;
                        let emit = self.pending[..split_at].to_string();
                        if !emit.is_empty() {
                            out.push(ExtractedChunk::Message(emit));
                        }
                        self.pending = self.pending[split_at..].to_string();
                    }
                    break;
                }
                Some(Mode::ToolCall) => {
                    if let Some(idx) = self.pending.find(CLOSE_TAG) {
                        let end = idx + CLOSE_TAG.len();
                        let tool_text = self.pending[..end].to_string();
                        out.push(ExtractedChunk::ToolCall(tool_text));
                        self.pending = self.pending[end..].to_string();
                        self.mode = None;
                        continue;
                    }

                    let safe_len = longest_prefix_match_len(&self.pending, CLOSE_TAG);
                    if is_final {
                        // Spec §4.4.1: an opened-but-unclosed `<tool>` is
                        // flushed as tool-call content; the downstream XML
                        // parser reports the precise error.
                        if !self.pending.is_empty() {
                            out.push(ExtractedChunk::ToolCall(std::mem::take(
                                &mut self.pending,
                            )));
                        }
                        break;
                    }
                    if self.pending.len() > safe_len {
                        let split_at = self.pending.len() - safe_len;
                        let emit = self.pending[..split_at].to_string();
                        if !emit.is_empty() {
                            out.push(ExtractedChunk::ToolCall(emit));
                        }
                        self.pending = self.pending[split_at..].to_string();
                    }
                    break;
                }
            }
        }

        out
    }

    pub fn is_in_tool_call(&self) -> bool {
        self.mode == Some(Mode::ToolCall)
    }
}

/// Length of the longest suffix of `haystack` that is a proper prefix of
/// `needle` — i.e. how much of `haystack`'s tail could still grow into a
/// full match of `needle` on the next feed.
fn longest_prefix_match_len(haystack: &str, needle: &str) -> usize {
    let max = needle.len().saturating_sub(1).min(haystack.len());
    for len in (1..=max).rev() {
        if needle.as_bytes().starts_with(&haystack.as_bytes()[haystack.len() - len..]) {
            return len;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages_and_tool(chunks: &[ExtractedChunk]) -> (String, String) {
        let mut message = String::new();
        let mut tool = String::new();
        for chunk in chunks {
            match chunk {
                ExtractedChunk::Message(t) => message.push_str(t),
                ExtractedChunk::ToolCall(t) => tool.push_str(t),
            }
        }
        (message, tool)
    }

    #[test]
    fn plain_message_text_passes_through() {
        let mut extractor = ToolCallExtractor::new();
        let mut chunks = extractor.feed("hello world");
        chunks.extend(extractor.flush());
        let (message, tool) = messages_and_tool(&chunks);
        assert_eq!(message, "hello world");
        assert!(tool.is_empty());
    }

    #[test]
    fn extracts_a_single_tool_call() {
        let mut extractor = ToolCallExtractor::new();
        let mut chunks = extractor.feed("before <tool><tool_name>x</tool_name></tool> after");
        chunks.extend(extractor.flush());
        let (message, tool) = messages_and_tool(&chunks);
        assert_eq!(message, "before  after");
        assert_eq!(tool, "<tool><tool_name>x</tool_name></tool>");
    }

    #[test]
    fn handles_tag_split_across_feeds() {
        let mut extractor = ToolCallExtractor::new();
        let mut chunks = Vec::new();
        chunks.extend(extractor.feed("hello <to"));
        chunks.extend(extractor.feed("ol><tool_name>x</tool_name></to"));
        chunks.extend(extractor.feed("ol>"));
        chunks.extend(extractor.flush());
        let (message, tool) = messages_and_tool(&chunks);
        assert_eq!(message, "hello ");
        assert_eq!(tool, "<tool><tool_name>x</tool_name></tool>");
    }

    #[test]
    fn flush_with_unclosed_tool_call_emits_as_tool_call_content() {
        let mut extractor = ToolCallExtractor::new();
        let mut chunks = extractor.feed("<tool><tool_name>x</tool_name>");
        chunks.extend(extractor.flush());
        let (message, tool) = messages_and_tool(&chunks);
        assert!(message.is_empty());
        assert_eq!(tool, "<tool><tool_name>x</tool_name>");
    }

    #[test]
    fn flush_with_no_tool_open_emits_as_message() {
        let mut extractor = ToolCallExtractor::new();
        let mut chunks = extractor.feed("just some prose <to");
        chunks.extend(extractor.flush());
        let (message, tool) = messages_and_tool(&chunks);
        assert_eq!(message, "just some prose <to");
        assert!(tool.is_empty());
    }
}
