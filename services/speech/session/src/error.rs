//! Session error types.

use speech_auth::AuthError;
use speech_wire::WireError;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Session errors
///
/// `Configuration`, `DuplicateSession` and `Auth` are returned from
/// [`SpeechSession::start`](crate::SpeechSession::start) and session
/// construction. `Transport` reaches the caller only through the observer.
/// `Protocol` is logged and never surfaced.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Missing or invalid session setup
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Another live session holds the same trx
    #[error("Session {0} is already active")]
    DuplicateSession(String),

    /// Credential unavailable
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Connection or write failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Inbound message could not be understood
    #[error("Protocol error: {0}")]
    Protocol(#[from] WireError),
}

impl From<tungstenite::Error> for SessionError {
    fn from(e: tungstenite::Error) -> Self {
        SessionError::Transport(e.to_string())
    }
}

impl From<url::ParseError> for SessionError {
    fn from(e: url::ParseError) -> Self {
        SessionError::Configuration(format!("invalid websocket url: {}", e))
    }
}
