//! Circuit breaker (spec §4.8): trips when the last `WINDOW` recorded
//! errors are all the same [`ErrorKind`], forcing the turn to stop digging
//! itself deeper instead of retrying the same failure forever.

use std::collections::VecDeque;

use crate::error::ErrorKind;

pub const WINDOW: usize = 5;

#[derive(Debug, Default)]
pub struct CircuitBreaker {
    recent: VecDeque<ErrorKind>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            recent: VecDeque::with_capacity(WINDOW),
        }
    }

    /// Records an error and reports whether the breaker has now tripped.
    pub fn track(&mut self, kind: ErrorKind) -> bool {
        if self.recent.len() == WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(kind);
        self.is_tripped()
    }

    pub fn is_tripped(&self) -> bool {
        self.recent.len() == WINDOW && self.recent.iter().all(|k| *k == self.recent[0])
    }

    /// Clears tracked history. Called after a successful tool execution
    /// (spec §4.8: success resets the window, not just a tripped state).
    pub fn reset(&mut self) {
        self.recent.clear();
    }
}
