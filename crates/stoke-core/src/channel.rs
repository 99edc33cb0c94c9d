//! The four-channel contract between the agent loop and whatever front end
//! drives it (spec §4.2). The core never imports a UI crate; it only ever
//! reads from `input`, writes to `event`, and mediates `approval`.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::event::SequencedEvent;
#[cfg(test)]
use crate::event::AgentEvent;

/// User/front-end input delivered to the agent loop (spec §4.2: the
/// `{user_text, form_data, cancel}` variants of `Input`).
#[derive(Debug, Clone)]
pub enum AgentInput {
    UserMessage(String),
    /// A structured reply to an interactive prompt a tool raised (e.g. a
    /// filled-in form from an `ask_question`-style tool), appended to
    /// memory as a user message the same way `UserMessage` is.
    FormData(HashMap<String, Value>),
    Cancel,
}

/// A human's answer to an [`AgentEvent::ToolApprovalRequest`].
#[derive(Debug, Clone)]
pub struct ApprovalResponse {
    pub approval_id: String,
    pub approved: bool,
}

pub const DEFAULT_CHANNEL_CAPACITY: usize = 128;

/// Sender half handed to whatever drives the agent (CLI, TUI, RPC server).
pub struct AgentHandle {
    pub input_tx: mpsc::Sender<AgentInput>,
    pub event_rx: mpsc::Receiver<SequencedEvent>,
    pub approval_tx: mpsc::Sender<ApprovalResponse>,
    pub shutdown_tx: mpsc::Sender<()>,
    pub done_rx: mpsc::Receiver<()>,
}

/// Receiver half owned by the agent loop task.
pub struct AgentChannels {
    pub input_rx: mpsc::Receiver<AgentInput>,
    pub event_tx: mpsc::Sender<SequencedEvent>,
    pub approval_rx: mpsc::Receiver<ApprovalResponse>,
    pub shutdown_rx: mpsc::Receiver<()>,
    pub done_tx: mpsc::Sender<()>,
}

/// Builds a connected [`AgentHandle`]/[`AgentChannels`] pair. Only the core
/// (holder of `event_tx`/`done_tx`) ever closes those two; a front end may
/// close `shutdown_tx` exactly once to request a graceful stop.
pub fn channel_set(capacity: usize) -> (AgentHandle, AgentChannels) {
    let (input_tx, input_rx) = mpsc::channel(capacity);
    let (event_tx, event_rx) = mpsc::channel(capacity);
    let (approval_tx, approval_rx) = mpsc::channel(capacity);
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let (done_tx, done_rx) = mpsc::channel(1);

    (
        AgentHandle {
            input_tx,
            event_rx,
            approval_tx,
            shutdown_tx,
            done_rx,
        },
        AgentChannels {
            input_rx,
            event_tx,
            approval_rx,
            shutdown_rx,
            done_tx,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn input_flows_from_handle_to_channels() {
        let (handle, mut channels) = channel_set(4);
        handle
            .input_tx
            .send(AgentInput::UserMessage("hi".into()))
            .await
            .expect("send should succeed on a fresh channel");
        let received = channels.input_rx.recv().await.expect("receiver open");
        matches!(received, AgentInput::UserMessage(text) if text == "hi");
    }

    #[tokio::test]
    async fn events_flow_from_channels_to_handle() {
        let (mut handle, channels) = channel_set(4);
        channels
            .event_tx
            .send(SequencedEvent {
                seq: 0,
                event: AgentEvent::TurnEnd,
            })
            .await
            .expect("send should succeed");
        drop(channels);
        let received = handle.event_rx.recv().await;
        assert!(matches!(
            received,
            Some(SequencedEvent {
                event: AgentEvent::TurnEnd,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn shutdown_can_be_sent_exactly_once_without_error() {
        let (handle, mut channels) = channel_set(4);
        handle.shutdown_tx.send(()).await.expect("first shutdown send");
        let signal = channels.shutdown_rx.recv().await;
        assert!(signal.is_some());
    }
}
