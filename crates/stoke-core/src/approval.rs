//! Human-approval gating for tool calls (spec §4.6). A tool call either
//! auto-approves (whitelisted `execute_command` prefix, or a tool that
//! declares [`Tool::auto_approved`](stoke_tools::Tool::auto_approved)) or
//! blocks on a [`AgentEvent::ToolApprovalRequest`]/[`ApprovalResponse`]
//! round trip with a default five-minute timeout.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::channel::ApprovalResponse;
use crate::error::AgentError;

pub const DEFAULT_APPROVAL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// A command-prefix whitelist for `execute_command` (spec §4.6 resolved
/// open question: the whitelist wins over a tool's own `auto_approved`
/// flag for this one tool, since the command, not the tool, is what the
/// user is actually approving).
#[derive(Debug, Clone, Default)]
pub struct CommandWhitelist {
    prefixes: Vec<Vec<String>>,
}

impl CommandWhitelist {
    pub fn new(prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            prefixes: prefixes
                .into_iter()
                .filter_map(|p| shell_words::split(&p.into()).ok())
                .collect(),
        }
    }

    /// `command` matches if its tokenized form starts with any whitelisted
    /// prefix's tokens. `npm` matches `npm install express`; `npm test`
    /// does not match a bare `npm` invocation with no subcommand.
    pub fn allows(&self, command: &str) -> bool {
        let Ok(tokens) = shell_words::split(command) else {
            return false;
        };
        self.prefixes
            .iter()
            .any(|prefix| tokens.len() >= prefix.len() && tokens[..prefix.len()] == prefix[..])
    }
}

struct Pending {
    responder: oneshot::Sender<bool>,
}

/// Tracks in-flight approval requests keyed by approval id.
#[derive(Default)]
pub struct ApprovalManager {
    pending: Mutex<HashMap<String, Pending>>,
    whitelist: CommandWhitelist,
    timeout: Duration,
}

impl ApprovalManager {
    pub fn new(whitelist: CommandWhitelist, timeout: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            whitelist,
            timeout,
        }
    }

    pub fn is_execute_command_whitelisted(&self, command: &str) -> bool {
        self.whitelist.allows(command)
    }

    /// Registers a new pending approval and blocks until it is answered,
    /// canceled, or times out. `notify` is called with the registered
    /// approval id after registration but before awaiting, so the caller
    /// can emit the `ToolApprovalRequest` event without a race against a
    /// reply that arrives before the event is published.
    pub async fn request(
        &self,
        approval_id: String,
        cancellation: &CancellationToken,
        notify: impl FnOnce(&str),
    ) -> Result<bool, AgentError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.insert(approval_id.clone(), Pending { responder: tx });
        }

        notify(&approval_id);

        let result = tokio::select! {
            biased;
            _ = cancellation.cancelled() => {
                self.pending.lock().unwrap_or_else(|e| e.into_inner()).remove(&approval_id);
                Err(AgentError::ContextCanceled)
            }
            reply = rx => {
                match reply {
                    Ok(approved) => Ok(approved),
                    Err(_) => Err(AgentError::Internal("approval responder dropped".into())),
                }
            }
            _ = tokio::time::sleep(self.timeout) => {
                self.pending.lock().unwrap_or_else(|e| e.into_inner()).remove(&approval_id);
                Err(AgentError::ApprovalTimeout)
            }
        };

        result
    }

    /// Delivers an incoming [`ApprovalResponse`] to its waiting request, if
    /// one is still pending. Removing the entry from the map *is* the
    /// close-once guard: only the thread that wins the `remove` gets to
    /// send on the oneshot, so a duplicate or late response is a silent
    /// no-op rather than a double-send panic.
    pub fn handle_response(&self, response: ApprovalResponse) {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&response.approval_id);
        if let Some(pending) = pending {
            let _ = pending.responder.send(response.approved);
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("npm", "npm install express", true)]
    #[case("npm install", "npm install express", true)]
    #[case("npm test", "npm install express", false)]
    #[case("npm", "npminstall express", false)]
    fn whitelist_matches_by_token_prefix(
        #[case] allowed: &str,
        #[case] command: &str,
        #[case] expected: bool,
    ) {
        let whitelist = CommandWhitelist::new([allowed]);
        assert_eq!(whitelist.allows(command), expected);
    }

    #[tokio::test]
    async fn approval_granted_resolves_true() {
        let manager = ApprovalManager::new(CommandWhitelist::default(), Duration::from_secs(5));
        let token = CancellationToken::new();
        let manager_ref = &manager;
        let (result, _) = tokio::join!(
            manager_ref.request("a1".into(), &token, |_| {}),
            async {
                manager_ref.handle_response(ApprovalResponse {
                    approval_id: "a1".into(),
                    approved: true,
                });
            }
        );
        assert!(matches!(result, Ok(true)));
    }

    #[tokio::test]
    async fn cancellation_short_circuits_request() {
        let manager = ApprovalManager::new(CommandWhitelist::default(), Duration::from_secs(5));
        let token = CancellationToken::new();
        token.cancel();
        let result = manager.request("a2".into(), &token, |_| {}).await;
        assert!(matches!(result, Err(AgentError::ContextCanceled)));
    }

    #[tokio::test]
    async fn timeout_fires_when_nothing_answers() {
        let manager = ApprovalManager::new(CommandWhitelist::default(), Duration::from_millis(10));
        let token = CancellationToken::new();
        let result = manager.request("a3".into(), &token, |_| {}).await;
        assert!(matches!(result, Err(AgentError::ApprovalTimeout)));
    }

    #[tokio::test]
    async fn duplicate_response_after_resolution_is_a_no_op() {
        let manager = ApprovalManager::new(CommandWhitelist::default(), Duration::from_secs(5));
        let token = CancellationToken::new();
        let manager_ref = &manager;
        let (result, _) = tokio::join!(
            manager_ref.request("a4".into(), &token, |_| {}),
            async {
                manager_ref.handle_response(ApprovalResponse {
                    approval_id: "a4".into(),
                    approved: true,
                });
            }
        );
        assert!(matches!(result, Ok(true)));
        // Late duplicate: no pending entry left, must not panic.
        manager.handle_response(ApprovalResponse {
            approval_id: "a4".into(),
            approved: false,
        });
    }
}
