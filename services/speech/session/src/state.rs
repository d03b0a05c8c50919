//! Session lifecycle state.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle stage of a session
///
/// Stages only move forward. `Closed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum SessionState {
    /// Configured, not started
    Created = 0,
    /// Transport connect in progress
    Connecting = 1,
    /// Transport open, init not yet written
    Connected = 2,
    /// Init written, waiting for `listening`
    AwaitingReadiness = 3,
    /// Server is ready, input flowing
    Streaming = 4,
    /// Transport ended, teardown running
    Closing = 5,
    /// Session ended normally
    Closed = 6,
    /// Transport failure
    Failed = 7,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Created,
            1 => SessionState::Connecting,
            2 => SessionState::Connected,
            3 => SessionState::AwaitingReadiness,
            4 => SessionState::Streaming,
            5 => SessionState::Closing,
            6 => SessionState::Closed,
            _ => SessionState::Failed,
        }
    }

    /// Whether no further transition is possible
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Created => "created",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::AwaitingReadiness => "awaiting-readiness",
            SessionState::Streaming => "streaming",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Shared, forward-only state holder
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    /// Create a cell in [`SessionState::Created`]
    pub fn new() -> Self {
        Self(AtomicU8::new(SessionState::Created as u8))
    }

    /// Current state
    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `next` if it is ahead of the current state and the current
    /// state is not terminal. Returns whether the transition happened.
    pub fn advance(&self, next: SessionState) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                let current = SessionState::from_u8(current);
                (!current.is_terminal() && next > current).then_some(next as u8)
            })
            .is_ok()
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}
