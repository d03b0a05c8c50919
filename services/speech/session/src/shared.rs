//! State shared by the listener and sender of one session.

use once_cell::sync::OnceCell;
use speech_wire::EnvelopeCodec;
use std::sync::Arc;

use crate::signal::Signal;
use crate::state::StateCell;
use crate::transport::Connection;

/// Per-session state handed to both workers
///
/// The connection is written once, when the connect completes, and is
/// read-only afterwards.
#[derive(Debug)]
pub struct SessionShared {
    /// Transaction id of the session
    pub trx: String,
    /// Codec used for every control frame of the session
    pub codec: EnvelopeCodec,
    /// Fired when the websocket is open
    pub connected: Signal,
    /// Fired when the server reports `listening`
    pub listening: Signal,
    /// Write half of the websocket once connected
    pub connection: OnceCell<Arc<Connection>>,
    /// Lifecycle stage
    pub state: StateCell,
}

impl SessionShared {
    /// Fresh state for `trx`
    pub fn new(trx: impl Into<String>) -> Self {
        Self {
            trx: trx.into(),
            codec: EnvelopeCodec::new(),
            connected: Signal::new(),
            listening: Signal::new(),
            connection: OnceCell::new(),
            state: StateCell::new(),
        }
    }

    /// Open connection, if any
    pub fn open_connection(&self) -> Option<&Arc<Connection>> {
        self.connection.get().filter(|connection| connection.is_open())
    }
}
