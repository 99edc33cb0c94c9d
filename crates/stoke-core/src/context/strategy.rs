//! Pluggable summarization strategies (spec §4.7). The agent loop owns one
//! `Box<dyn SummarizationStrategy>`; swapping it changes *how* history gets
//! compacted without touching the trigger logic in [`super::ContextManager`].

use crate::memory::{Memory, Message};

/// Progress observed mid-summarization, surfaced as
/// [`AgentEvent::SummarizationProgress`](crate::event::AgentEvent::SummarizationProgress).
#[derive(Debug, Clone, Copy)]
pub struct SummarizationProgress {
    pub items_processed: usize,
    pub total_items: usize,
}

impl SummarizationProgress {
    pub fn percent(self) -> f64 {
        if self.total_items == 0 {
            100.0
        } else {
            (self.items_processed as f64 / self.total_items as f64) * 100.0
        }
    }
}

/// A strategy decides which `[start, end)` range of `memory` to collapse
/// and produces the single replacement message (spec §4.3's
/// `replace_range`). Returning `None` means there is nothing eligible to
/// summarize right now.
pub trait SummarizationStrategy: Send + Sync {
    fn plan(&self, memory: &Memory, on_progress: &mut dyn FnMut(SummarizationProgress)) -> Option<SummarizationPlan>;
}

pub struct SummarizationPlan {
    pub start: usize,
    pub end: usize,
    pub replacement: Message,
}

/// The default strategy (spec §4.7): summarizes complete
/// tool-call/tool-result pairs older than `min_age` messages from the tail,
/// provided at least `min_pairs` such pairs exist, and never reaches back
/// further than `max_age` messages from the tail.
pub struct BufferedToolCallSummarizer {
    pub min_age: usize,
    pub min_pairs: usize,
    pub max_age: usize,
}

impl Default for BufferedToolCallSummarizer {
    fn default() -> Self {
        Self {
            min_age: 20,
            min_pairs: 10,
            max_age: 40,
        }
    }
}

impl SummarizationStrategy for BufferedToolCallSummarizer {
    fn plan(
        &self,
        memory: &Memory,
        on_progress: &mut dyn FnMut(SummarizationProgress),
    ) -> Option<SummarizationPlan> {
        use crate::memory::Role;

        let len = memory.len();
        if len <= self.min_age {
            return None;
        }

        // Eligible window: messages older than `min_age` from the tail,
        // but no further back than `max_age` from the tail, leaving a
        // leading system message (if any) untouched.
        let window_start = len.saturating_sub(self.max_age).max(if memory.has_leading_system_message() { 1 } else { 0 });
        let window_end = len.saturating_sub(self.min_age);
        if window_start >= window_end {
            return None;
        }

        let messages: Vec<&Message> = memory.iter().collect();
        let mut pair_count = 0;
        let mut idx = window_start;
        while idx + 1 < window_end {
            if messages[idx].role == Role::Assistant && messages[idx + 1].role == Role::Tool {
                pair_count += 1;
                idx += 2;
            } else {
                idx += 1;
            }
        }

        if pair_count < self.min_pairs {
            return None;
        }

        let total_items = window_end - window_start;
        let mut processed = 0;
        let mut summary_lines = Vec::new();
        let mut idx = window_start;
        while idx < window_end {
            processed += 1;
            on_progress(SummarizationProgress {
                items_processed: processed,
                total_items,
            });
            summary_lines.push(format!(
                "{:?}: {}",
                messages[idx].role,
                truncate(&messages[idx].content, 200)
            ));
            idx += 1;
        }

        let replacement = Message::tool(format!(
            "[summary of {} earlier messages]\n{}",
            total_items,
            summary_lines.join("\n")
        ));

        Some(SummarizationPlan {
            start: window_start,
            end: window_end,
            replacement,
        })
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut truncated: String = s.chars().take(max_chars).collect();
        truncated.push('…');
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Memory, Message};

    fn push_pairs(memory: &mut Memory, count: usize) {
        for i in 0..count {
            memory.add(Message::assistant(format!("call {i}")));
            memory.add(Message::tool(format!("result {i}")));
        }
    }

    #[test]
    fn does_nothing_below_min_age() {
        let mut memory = Memory::new();
        push_pairs(&mut memory, 2);
        let strategy = BufferedToolCallSummarizer::default();
        assert!(strategy.plan(&memory, &mut |_| {}).is_none());
    }

    #[test]
    fn plans_a_summary_once_enough_pairs_age_out() {
        let mut memory = Memory::new();
        memory.add(Message::system("sys"));
        push_pairs(&mut memory, 15);
        let strategy = BufferedToolCallSummarizer::default();
        let plan = strategy.plan(&memory, &mut |_| {});
        assert!(plan.is_some());
        let plan = plan.unwrap();
        assert!(plan.start >= 1);
        assert!(plan.end <= memory.len());
    }

    #[test]
    fn progress_callback_fires_once_per_summarized_item() {
        let mut memory = Memory::new();
        push_pairs(&mut memory, 15);
        let strategy = BufferedToolCallSummarizer::default();
        let mut calls = 0;
        let _ = strategy.plan(&memory, &mut |_p| calls += 1);
        assert!(calls > 0);
    }
}
