//! The agent loop (spec §4.9): single task, `event_loop -> process_input ->
//! run_turn -> execute_iteration`, driven entirely off the channel set.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use stoke_tools::{
    parse_tool_call, ExecutionContext, RegistryError, Tool, ToolEventSink, ToolProgressEvent,
    ToolRegistry,
};

use crate::approval::ApprovalManager;
use crate::breaker::CircuitBreaker;
use crate::channel::{AgentChannels, AgentInput, ApprovalResponse};
use crate::config::AgentConfig;
use crate::context::ContextManager;
use crate::error::ErrorKind;
use crate::event::{AgentEvent, SequencedEvent};
use crate::memory::{Memory, Message};
use crate::stream::StreamParser;

/// Renders a [`AgentInput::FormData`] reply as the text of a user
/// [`Message`], so it flows through the same memory/prompt path as free
/// text (spec §4.2: `form_data` is one of `Input`'s three variants).
fn form_data_to_text(data: &std::collections::HashMap<String, serde_json::Value>) -> String {
    let mut entries: Vec<_> = data.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
        .into_iter()
        .map(|(key, value)| format!("{key}: {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn next_sequenced(seq: &AtomicU64, event: AgentEvent) -> SequencedEvent {
    SequencedEvent {
        seq: seq.fetch_add(1, Ordering::Relaxed),
        event,
    }
}

/// Forwards a tool's [`ToolProgressEvent`]s onto the agent's event channel
/// as `command_execution_*` [`AgentEvent`]s (spec §9: tools stay ignorant
/// of `AgentEvent`).
struct CoreEventSink {
    event_tx: mpsc::Sender<SequencedEvent>,
    seq: Arc<AtomicU64>,
}

impl ToolEventSink for CoreEventSink {
    fn emit(&self, tool_call_id: &str, event: ToolProgressEvent) {
        let event = match event {
            ToolProgressEvent::CommandExecutionStarted { command } => {
                AgentEvent::CommandExecutionStarted {
                    tool_call_id: tool_call_id.to_string(),
                    command,
                }
            }
            ToolProgressEvent::CommandExecutionOutputChunk { chunk, is_stderr } => {
                AgentEvent::CommandExecutionOutputChunk {
                    tool_call_id: tool_call_id.to_string(),
                    chunk,
                    is_stderr,
                }
            }
            ToolProgressEvent::CommandExecutionCompleted { exit_code } => {
                AgentEvent::CommandExecutionCompleted {
                    tool_call_id: tool_call_id.to_string(),
                    exit_code,
                }
            }
        };
        // Best effort: a full event channel during a tool's own progress
        // reporting must never block or panic the tool.
        let _ = self.event_tx.try_send(next_sequenced(&self.seq, event));
    }
}

enum IterationOutcome {
    Continue(Option<String>),
    TurnComplete,
    BreakerTripped,
    Canceled,
}

pub struct Agent {
    config: AgentConfig,
    registry: Arc<ToolRegistry>,
    approval: Arc<ApprovalManager>,
    context: ContextManager,
    breaker: CircuitBreaker,
    memory: Memory,
    session_id: String,
    next_seq: Arc<AtomicU64>,

    input_rx: mpsc::Receiver<AgentInput>,
    event_tx: mpsc::Sender<SequencedEvent>,
    approval_rx: mpsc::Receiver<ApprovalResponse>,
    shutdown_rx: mpsc::Receiver<()>,
    done_tx: mpsc::Sender<()>,
}

/// The slice of [`Agent`] state a turn actually needs, borrowed disjointly
/// from `input_rx`/`approval_rx`/`shutdown_rx`/`done_tx` so the turn's
/// future and [`Agent::process_user_message`]'s own `select!` over those
/// channels can run concurrently without both wanting `&mut Agent`.
struct TurnCtx<'a> {
    memory: &'a mut Memory,
    context: &'a mut ContextManager,
    breaker: &'a mut CircuitBreaker,
    config: &'a AgentConfig,
    registry: &'a ToolRegistry,
    approval: &'a ApprovalManager,
    event_tx: &'a mpsc::Sender<SequencedEvent>,
    next_seq: &'a Arc<AtomicU64>,
    session_id: &'a str,
}

impl Agent {
    pub fn new(mut config: AgentConfig, channels: AgentChannels) -> Self {
        let approval = Arc::new(ApprovalManager::new(
            config.command_whitelist.clone(),
            config.approval_timeout,
        ));
        // The strategy list is consumed once, here; `config.summarization_strategies`
        // is left empty afterward.
        let strategies = std::mem::take(&mut config.summarization_strategies);
        let context = ContextManager::new(
            strategies,
            config.context_max_tokens,
            config.context_threshold_percent,
        );

        Self {
            registry: Arc::new(ToolRegistry::new()),
            approval,
            context,
            breaker: CircuitBreaker::new(),
            memory: Memory::new(),
            session_id: Uuid::new_v4().to_string(),
            next_seq: Arc::new(AtomicU64::new(0)),
            config,
            input_rx: channels.input_rx,
            event_tx: channels.event_tx,
            approval_rx: channels.approval_rx,
            shutdown_rx: channels.shutdown_rx,
            done_tx: channels.done_tx,
        }
    }

    pub fn register_tool(&self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        self.registry.register(tool)
    }

    /// Consumes the agent, running the event loop to completion. Returns
    /// once `shutdown` is closed or every input-side channel has hung up.
    #[instrument(skip(self), fields(session_id = %self.session_id))]
    pub async fn run(mut self) {
        self.emit(AgentEvent::ToolsUpdate {
            tool_names: self.registry.list().iter().map(|tool| tool.name().to_string()).collect(),
        })
        .await;

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_rx.recv() => {
                    info!("shutdown received, draining");
                    break;
                }
                maybe_input = self.input_rx.recv() => {
                    match maybe_input {
                        Some(AgentInput::UserMessage(text)) => self.process_user_message(text).await,
                        Some(AgentInput::FormData(data)) => self.process_user_message(form_data_to_text(&data)).await,
                        Some(AgentInput::Cancel) => { /* no turn in flight: no-op */ }
                        None => break,
                    }
                }
                maybe_resp = self.approval_rx.recv() => {
                    match maybe_resp {
                        Some(resp) => self.approval.handle_response(resp),
                        None => {}
                    }
                }
            }
        }

        let _ = self.done_tx.send(()).await;
    }

    async fn emit(&self, event: AgentEvent) {
        let _ = self.event_tx.send(next_sequenced(&self.next_seq, event)).await;
    }

    async fn process_user_message(&mut self, text: String) {
        self.memory.add(Message::user(text));
        self.emit(AgentEvent::UpdateBusy { busy: true }).await;

        let token = CancellationToken::new();

        // Borrow only what the turn mutates/reads; `input_rx`/`approval_rx`/
        // `approval` (for `handle_response`) stay reachable on `self` below
        // since none of them are part of `TurnCtx`.
        let mut turn_ctx = TurnCtx {
            memory: &mut self.memory,
            context: &mut self.context,
            breaker: &mut self.breaker,
            config: &self.config,
            registry: self.registry.as_ref(),
            approval: self.approval.as_ref(),
            event_tx: &self.event_tx,
            next_seq: &self.next_seq,
            session_id: &self.session_id,
        };
        let mut turn = Box::pin(turn_ctx.run_turn(token.clone()));

        loop {
            tokio::select! {
                biased;
                () = &mut turn => break,
                maybe_input = self.input_rx.recv() => {
                    match maybe_input {
                        Some(AgentInput::Cancel) => token.cancel(),
                        Some(AgentInput::UserMessage(queued)) => {
                            warn!("ignoring user message received mid-turn: {queued}");
                        }
                        Some(AgentInput::FormData(_)) => {
                            warn!("ignoring form data received mid-turn");
                        }
                        None => { token.cancel(); }
                    }
                }
                maybe_resp = self.approval_rx.recv() => {
                    if let Some(resp) = maybe_resp {
                        self.approval.handle_response(resp);
                    }
                }
            }
        }
        drop(turn);

        self.emit(AgentEvent::UpdateBusy { busy: false }).await;
        self.emit(AgentEvent::TurnEnd).await;
    }
}

impl TurnCtx<'_> {
    async fn emit(&self, event: AgentEvent) {
        let _ = self.event_tx.send(next_sequenced(self.next_seq, event)).await;
    }

    async fn run_turn(&mut self, token: CancellationToken) {
        let mut error_context: Option<String> = None;

        for _ in 0..self.config.max_iterations {
            if token.is_cancelled() {
                return;
            }

            match self.execute_iteration(&token, error_context.take()).await {
                IterationOutcome::Continue(next) => {
                    error_context = next;
                }
                IterationOutcome::TurnComplete => return,
                IterationOutcome::BreakerTripped => {
                    self.emit(AgentEvent::error(
                        ErrorKind::CircuitBreaker,
                        "circuit breaker tripped: too many repeated errors",
                    ))
                    .await;
                    return;
                }
                IterationOutcome::Canceled => return,
            }
        }
    }

    #[instrument(skip(self, token, error_context))]
    async fn execute_iteration(
        &mut self,
        token: &CancellationToken,
        error_context: Option<String>,
    ) -> IterationOutcome {
        // (b) context management, ahead of building the prompt.
        let event_tx = self.event_tx.clone();
        self.context.maybe_summarize(&mut *self.memory, self.config.tokenizer.as_ref(), &mut |e| {
            let _ = event_tx.try_send(e);
        });

        // (a) build messages.
        let system_message = Message::system(self.build_system_prompt());
        let mut messages = vec![system_message];
        messages.extend(self.memory.snapshot());
        if let Some(ctx) = &error_context {
            messages.push(Message::user(ctx.clone()));
        }

        let context_tokens = self.memory.token_size(self.config.tokenizer.as_ref());
        self.emit(AgentEvent::ApiCallStart {
            context_tokens,
            max_context_tokens: self.config.context_max_tokens,
        })
        .await;

        let stream = match self
            .config
            .provider
            .stream_completion(&messages, self.config.system_prompt.as_deref(), token.clone())
            .await
        {
            Ok(stream) => stream,
            Err(message) => {
                self.emit(AgentEvent::error(ErrorKind::LlmFailure, message)).await;
                if self.breaker.track(ErrorKind::LlmFailure) {
                    return IterationOutcome::BreakerTripped;
                }
                return IterationOutcome::Continue(None);
            }
        };

        let mut parser = StreamParser::new();
        let mut stream = stream;
        let mut canceled = false;
        let mut prompt_tokens = context_tokens;
        let mut completion_tokens = 0usize;

        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    canceled = true;
                    break;
                }
                chunk = stream.next() => {
                    match chunk {
                        Some(chunk) => {
                            if let Some(text) = &chunk.content {
                                completion_tokens += text.split_whitespace().count();
                            }
                            let is_last = chunk.is_last;
                            for event in parser.feed(chunk) {
                                self.emit(event).await;
                            }
                            if is_last {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        if canceled {
            // Cancellation suppresses in-flight parse/stream errors (spec §7).
            for event in parser.flush() {
                self.emit(event).await;
            }
            return IterationOutcome::Canceled;
        }

        self.emit(AgentEvent::ApiCallEnd).await;
        self.emit(AgentEvent::TokenUsage {
            prompt_tokens,
            completion_tokens,
            cumulative_tokens: prompt_tokens + completion_tokens,
        })
        .await;

        // (e) append a single assistant message: prose, then the raw tool-call XML.
        let mut assistant_text = parser.message_text().to_string();
        if let Some(xml) = parser.tool_call_xml() {
            if !assistant_text.is_empty() {
                assistant_text.push('\n');
            }
            assistant_text.push_str(xml);
        }
        self.memory.add(Message::assistant(assistant_text));

        // (f) no tool call produced.
        let Some(tool_call_xml) = parser.tool_call_xml().map(str::to_string) else {
            self.emit(AgentEvent::NoToolCall).await;
            let tripped = self.breaker.track(ErrorKind::NoToolCall);
            if tripped {
                return IterationOutcome::BreakerTripped;
            }
            return IterationOutcome::Continue(Some(
                "You did not issue a <tool> call. Every turn must end in exactly one tool call.".to_string(),
            ));
        };

        // (g) parse.
        let parsed = match parse_tool_call(&tool_call_xml) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.emit(AgentEvent::error(ErrorKind::InvalidXml, err.to_string())).await;
                let tripped = self.breaker.track(ErrorKind::InvalidXml);
                if tripped {
                    return IterationOutcome::BreakerTripped;
                }
                return IterationOutcome::Continue(Some(format!(
                    "Your tool call was malformed XML: {err}. Re-emit a well-formed <tool> call."
                )));
            }
        };
        let call = stoke_tools::ToolCall::from(parsed);

        // (h) validate.
        if call.tool_name.is_empty() {
            self.emit(AgentEvent::error(ErrorKind::MissingToolName, "tool name missing or empty")).await;
            let tripped = self.breaker.track(ErrorKind::MissingToolName);
            if tripped {
                return IterationOutcome::BreakerTripped;
            }
            return IterationOutcome::Continue(Some(
                "Your <tool_name> was empty. Specify which registered tool to call.".to_string(),
            ));
        }
        let Some(tool) = self.registry.get(&call.tool_name) else {
            self.emit(AgentEvent::error(
                ErrorKind::UnknownTool,
                format!("unknown tool: {}", call.tool_name),
            ))
            .await;
            let tripped = self.breaker.track(ErrorKind::UnknownTool);
            if tripped {
                return IterationOutcome::BreakerTripped;
            }
            return IterationOutcome::Continue(Some(format!(
                "There is no tool named '{}'. Choose one of the registered tools.",
                call.tool_name
            )));
        };

        // (i) approval. Command-whitelist wins over the tool's own
        // auto-approval flag for `execute_command` (spec §9 resolved open
        // question); the whitelist matches against the actual command text,
        // not the raw `<arguments>` XML blob it's nested inside.
        let auto_approved = if call.is_execute_command() {
            stoke_tools::extract_arg_text(&call.arguments_xml, "command")
                .is_some_and(|command| self.approval.is_execute_command_whitelisted(&command))
        } else {
            tool.auto_approved()
        };

        if !auto_approved {
            let preview = tool.generate_preview(&call.arguments_xml).await.and_then(Result::ok);
            let approval_id = Uuid::new_v4().to_string();
            let event_tx = self.event_tx.clone();
            let tool_name = call.tool_name.clone();
            let arguments = serde_json::Value::String(call.arguments_xml.clone());
            let outcome = self
                .approval
                .request(approval_id.clone(), token, |id| {
                    let event = AgentEvent::ToolApprovalRequest {
                        approval_id: id.to_string(),
                        tool_name: tool_name.clone(),
                        arguments: arguments.clone(),
                        preview: preview.clone(),
                    };
                    let _ = event_tx.try_send(event);
                })
                .await;

            match outcome {
                Ok(true) => {}
                Ok(false) => {
                    self.memory.add(Message::user("Tool call was rejected by the user."));
                    return IterationOutcome::Continue(None);
                }
                Err(crate::error::AgentError::ApprovalTimeout) => {
                    self.memory.add(Message::user("Tool approval timed out"));
                    return IterationOutcome::Continue(None);
                }
                Err(crate::error::AgentError::ContextCanceled) => {
                    return IterationOutcome::Canceled;
                }
                Err(_) => {
                    return IterationOutcome::Continue(None);
                }
            }
        }

        // (j) dispatch.
        self.emit(AgentEvent::tool_call(&call)).await;
        let sink: Arc<dyn ToolEventSink> = Arc::new(CoreEventSink {
            event_tx: self.event_tx.clone(),
            seq: self.next_seq.clone(),
        });
        let exec_ctx = ExecutionContext::new(self.session_id.to_string(), call.id.clone(), token.clone(), sink)
            .with_timeout(self.config.tool_execution_timeout);

        let deadline = exec_ctx.timeout;
        let result = tokio::time::timeout(deadline, tool.execute(&call.arguments_xml, &exec_ctx)).await;

        match result {
            Ok(Ok(output)) => {
                self.emit(AgentEvent::ToolResult {
                    tool_call_id: call.id.clone(),
                    tool_name: call.tool_name.clone(),
                    result: output.clone(),
                })
                .await;
                self.memory.add(Message::tool(output));
                self.breaker.reset();
                if tool.is_loop_breaking() {
                    IterationOutcome::TurnComplete
                } else {
                    IterationOutcome::Continue(None)
                }
            }
            Ok(Err(err)) => {
                self.emit(AgentEvent::ToolResultError {
                    tool_call_id: call.id.clone(),
                    tool_name: call.tool_name.clone(),
                    error: err.to_string(),
                    kind: ErrorKind::ToolExecution,
                })
                .await;
                let tripped = self.breaker.track(ErrorKind::ToolExecution);
                if tripped {
                    IterationOutcome::BreakerTripped
                } else {
                    IterationOutcome::Continue(Some(format!(
                        "Tool '{}' failed: {err}. Adjust arguments and try again.",
                        call.tool_name
                    )))
                }
            }
            Err(_elapsed) => {
                self.emit(AgentEvent::ToolResultError {
                    tool_call_id: call.id.clone(),
                    tool_name: call.tool_name.clone(),
                    error: "tool execution deadline exceeded".to_string(),
                    kind: ErrorKind::ToolExecution,
                })
                .await;
                let tripped = self.breaker.track(ErrorKind::ToolExecution);
                if tripped {
                    IterationOutcome::BreakerTripped
                } else {
                    IterationOutcome::Continue(Some(format!(
                        "Tool '{}' timed out. Try a narrower request.",
                        call.tool_name
                    )))
                }
            }
        }
    }

    fn build_system_prompt(&self) -> String {
        let mut prompt = String::new();
        if let Some(custom) = &self.config.system_prompt {
            prompt.push_str(custom);
            prompt.push_str("\n\n");
        }
        prompt.push_str("Available tools:\n");
        for schema in self.registry.schemas() {
            prompt.push_str(&format!("- {}: {}\n", schema.name, schema.description));
        }
        prompt
    }
}
