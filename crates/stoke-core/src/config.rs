//! Agent construction options (spec §6.1).

use std::sync::Arc;
use std::time::Duration;

use crate::approval::{CommandWhitelist, DEFAULT_APPROVAL_TIMEOUT};
use crate::context::{BufferedToolCallSummarizer, SummarizationStrategy};
use crate::memory::Tokenizer;
use crate::provider::LLMProvider;

pub const DEFAULT_CONTEXT_MAX_TOKENS: usize = 100_000;
pub const DEFAULT_CONTEXT_THRESHOLD_PERCENT: f64 = 80.0;
pub const DEFAULT_MAX_ITERATIONS: usize = 50;
pub const DEFAULT_STREAM_BUFFER: usize = crate::channel::DEFAULT_CHANNEL_CAPACITY;
pub const DEFAULT_TOOL_EXECUTION_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_SUMMARIZATION_MIN_AGE: usize = 20;
pub const DEFAULT_SUMMARIZATION_MIN_PAIRS: usize = 10;
pub const DEFAULT_SUMMARIZATION_MAX_AGE: usize = 40;

/// Everything an [`crate::agent::Agent`] needs to be constructed that isn't
/// a channel. Fields with no sensible default (`provider`, `tokenizer`) are
/// required; everything else falls back to the spec's defaults.
///
/// There is no `logger` field here (unlike spec §6.1's `configure()` option
/// list): this crate instruments itself with `tracing::instrument`/events
/// throughout and leaves subscriber wiring to the executor binary, the same
/// division `steer-core` draws between library instrumentation and the
/// `tracing-subscriber` setup that only `steer-cli`'s `main.rs` owns.
pub struct AgentConfig {
    pub system_prompt: Option<String>,
    pub max_iterations: usize,
    pub context_max_tokens: usize,
    pub context_threshold_percent: f64,
    pub summarization_strategies: Vec<Box<dyn SummarizationStrategy>>,
    pub approval_timeout: Duration,
    /// Per-tool-call execution deadline (spec §5), distinct from
    /// `approval_timeout` — a tool waiting on human approval isn't running
    /// yet, so the two clocks are independent.
    pub tool_execution_timeout: Duration,
    pub command_whitelist: CommandWhitelist,
    pub stream_buffer: usize,
    pub provider: Arc<dyn LLMProvider>,
    pub tokenizer: Arc<dyn Tokenizer>,
}

pub struct AgentConfigBuilder {
    system_prompt: Option<String>,
    max_iterations: usize,
    context_max_tokens: usize,
    context_threshold_percent: f64,
    summarization_strategies: Option<Vec<Box<dyn SummarizationStrategy>>>,
    summarization_min_age: usize,
    summarization_min_pairs: usize,
    summarization_max_age: usize,
    approval_timeout: Duration,
    tool_execution_timeout: Duration,
    command_whitelist: CommandWhitelist,
    stream_buffer: usize,
    provider: Arc<dyn LLMProvider>,
    tokenizer: Arc<dyn Tokenizer>,
}

impl AgentConfigBuilder {
    pub fn new(provider: Arc<dyn LLMProvider>, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            system_prompt: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            context_max_tokens: DEFAULT_CONTEXT_MAX_TOKENS,
            context_threshold_percent: DEFAULT_CONTEXT_THRESHOLD_PERCENT,
            summarization_strategies: None,
            summarization_min_age: DEFAULT_SUMMARIZATION_MIN_AGE,
            summarization_min_pairs: DEFAULT_SUMMARIZATION_MIN_PAIRS,
            summarization_max_age: DEFAULT_SUMMARIZATION_MAX_AGE,
            approval_timeout: DEFAULT_APPROVAL_TIMEOUT,
            tool_execution_timeout: DEFAULT_TOOL_EXECUTION_TIMEOUT,
            command_whitelist: CommandWhitelist::default(),
            stream_buffer: DEFAULT_STREAM_BUFFER,
            provider,
            tokenizer,
        }
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn context_max_tokens(mut self, n: usize) -> Self {
        self.context_max_tokens = n;
        self
    }

    pub fn context_threshold_percent(mut self, p: f64) -> Self {
        self.context_threshold_percent = p;
        self
    }

    /// Supplies the ordered strategy list wholesale (spec §4.7/§9: "a
    /// plug-in list, not a class hierarchy"), tried in order until one finds
    /// something eligible. When set, `summarization_min_age`/
    /// `summarization_min_pairs`/`summarization_max_age` are ignored — they
    /// only parameterize the default [`BufferedToolCallSummarizer`].
    pub fn summarization_strategies(mut self, strategies: Vec<Box<dyn SummarizationStrategy>>) -> Self {
        self.summarization_strategies = Some(strategies);
        self
    }

    pub fn summarization_min_age(mut self, n: usize) -> Self {
        self.summarization_min_age = n;
        self
    }

    pub fn summarization_min_pairs(mut self, n: usize) -> Self {
        self.summarization_min_pairs = n;
        self
    }

    pub fn summarization_max_age(mut self, n: usize) -> Self {
        self.summarization_max_age = n;
        self
    }

    pub fn approval_timeout(mut self, timeout: Duration) -> Self {
        self.approval_timeout = timeout;
        self
    }

    pub fn tool_execution_timeout(mut self, timeout: Duration) -> Self {
        self.tool_execution_timeout = timeout;
        self
    }

    pub fn command_whitelist(mut self, whitelist: CommandWhitelist) -> Self {
        self.command_whitelist = whitelist;
        self
    }

    pub fn stream_buffer(mut self, n: usize) -> Self {
        self.stream_buffer = n;
        self
    }

    pub fn build(self) -> AgentConfig {
        AgentConfig {
            system_prompt: self.system_prompt,
            max_iterations: self.max_iterations,
            context_max_tokens: self.context_max_tokens,
            context_threshold_percent: self.context_threshold_percent,
            summarization_strategies: self.summarization_strategies.unwrap_or_else(|| {
                vec![Box::new(BufferedToolCallSummarizer {
                    min_age: self.summarization_min_age,
                    min_pairs: self.summarization_min_pairs,
                    max_age: self.summarization_max_age,
                })]
            }),
            approval_timeout: self.approval_timeout,
            tool_execution_timeout: self.tool_execution_timeout,
            command_whitelist: self.command_whitelist,
            stream_buffer: self.stream_buffer,
            provider: self.provider,
            tokenizer: self.tokenizer,
        }
    }
}
