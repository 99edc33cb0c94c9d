//! Context window management (spec §4.7): watches token usage against a
//! configured threshold and runs the configured
//! [`SummarizationStrategy`] when it is crossed.

mod strategy;

pub use strategy::{BufferedToolCallSummarizer, SummarizationPlan, SummarizationProgress, SummarizationStrategy};

use crate::event::AgentEvent;
use crate::memory::{Memory, Tokenizer};

/// Holds an ordered list of strategies (spec §9: "a plug-in list, not a
/// class hierarchy"), tried in order until one finds something eligible or
/// the list is exhausted.
pub struct ContextManager {
    strategies: Vec<Box<dyn SummarizationStrategy>>,
    max_tokens: usize,
    threshold_percent: f64,
}

impl ContextManager {
    pub fn new(strategies: Vec<Box<dyn SummarizationStrategy>>, max_tokens: usize, threshold_percent: f64) -> Self {
        Self {
            strategies,
            max_tokens,
            threshold_percent,
        }
    }

    pub fn is_over_threshold(&self, memory: &Memory, tokenizer: &dyn Tokenizer) -> bool {
        if self.max_tokens == 0 {
            return false;
        }
        let used = memory.token_size(tokenizer);
        (used as f64 / self.max_tokens as f64) * 100.0 >= self.threshold_percent
    }

    /// Runs one summarization pass, gated on [`Self::is_over_threshold`],
    /// trying each configured strategy in order until one finds something
    /// eligible; emits the bracketed `summarization_*` events around
    /// whichever one fires. Returns `true` if memory was actually mutated.
    ///
    /// Idempotent: calling this again immediately after a successful run
    /// replans against the now-compacted memory, which the default
    /// strategy will find has nothing eligible (the summary message itself
    /// does not form an assistant/tool pair), so it returns `false`.
    pub fn maybe_summarize(
        &self,
        memory: &mut Memory,
        tokenizer: &dyn Tokenizer,
        emit: &mut dyn FnMut(AgentEvent),
    ) -> bool {
        if !self.is_over_threshold(memory, tokenizer) {
            return false;
        }

        for strategy in &self.strategies {
            let mut plan_progress = Vec::new();
            let Some(plan) = strategy.plan(memory, &mut |p| plan_progress.push(p)) else {
                continue;
            };

            emit(AgentEvent::SummarizationStart);
            for progress in plan_progress {
                emit(AgentEvent::SummarizationProgress {
                    items_processed: progress.items_processed,
                    total_items: progress.total_items,
                    percent: progress.percent(),
                });
            }
            let SummarizationPlan { start, end, replacement } = plan;
            memory.replace_range(start, end, replacement);
            emit(AgentEvent::SummarizationEnd);
            return true;
        }

        false
    }
}
