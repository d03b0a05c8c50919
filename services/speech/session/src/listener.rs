//! Inbound side of a session.
//!
//! The listener opens the websocket, publishes the write half for the sender,
//! then reads frames until the socket ends. Server events are forwarded to the
//! observer; a failed wake-word check or a failed final response stops the
//! sender. When the socket ends the session is torn down and exactly one
//! terminal callback is delivered.

use futures::StreamExt;
use speech_wire::{Incoming, VrexResponse};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, error::ProtocolError, Message};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::SessionError;
use crate::observer::SpeechResultObserver;
use crate::registry::TrxGuard;
use crate::sender::MessageSender;
use crate::shared::SessionShared;
use crate::state::SessionState;
use crate::transport::Connection;

/// Websocket reader for one session
#[derive(Debug)]
pub struct ConnectionListener {
    shared: Arc<SessionShared>,
    uri: Url,
}

impl ConnectionListener {
    /// Listener for the session described by `shared`, connecting to `uri`
    pub fn new(shared: Arc<SessionShared>, uri: Url) -> Self {
        Self { shared, uri }
    }

    /// Connection URI
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// Connect and read on `runtime` until the session ends
    ///
    /// `guard` is released during teardown, before the terminal callback.
    pub fn start(
        self,
        runtime: &Handle,
        sender: Arc<MessageSender>,
        observer: Arc<dyn SpeechResultObserver>,
        guard: TrxGuard,
    ) -> JoinHandle<()> {
        runtime.spawn(self.run(sender, observer, guard))
    }

    async fn run(
        self,
        sender: Arc<MessageSender>,
        observer: Arc<dyn SpeechResultObserver>,
        guard: TrxGuard,
    ) {
        let trx = self.shared.trx.clone();
        self.shared.state.advance(SessionState::Connecting);
        info!(trx = %trx, "Connecting to websocket URL...");

        let outcome = self.read_session(&sender, observer.as_ref()).await;

        self.shared.state.advance(SessionState::Closing);
        debug!(trx = %trx, "Performing speech session cleanup");
        sender.shutdown();
        if let Some(connection) = self.shared.connection.get() {
            connection.close().await;
        }
        guard.release();

        match outcome {
            Ok(close_notice) => {
                self.shared.state.advance(SessionState::Closed);
                info!(trx = %trx, "Websocket session closed");
                observer.on_close_connection(close_notice.as_ref());
            }
            Err(e) => {
                self.shared.state.advance(SessionState::Failed);
                error!(trx = %trx, "Websocket session error: {}", e);
                observer.on_error(&e);
            }
        }
    }

    async fn read_session(
        &self,
        sender: &MessageSender,
        observer: &dyn SpeechResultObserver,
    ) -> Result<Option<VrexResponse>, SessionError> {
        let (socket, _response) = tokio_tungstenite::connect_async(self.uri.as_str()).await?;
        let (sink, mut stream) = socket.split();

        let connection = Arc::new(Connection::new(sink));
        if self.shared.connection.set(connection.clone()).is_err() {
            return Err(SessionError::Transport(
                "session already has a connection".to_string(),
            ));
        }
        self.shared.state.advance(SessionState::Connected);
        self.shared.connected.fire();
        info!(
            trx = %self.shared.trx,
            "Successfully established websocket connection with speech server"
        );

        let mut close_notice = None;
        while let Some(frame) = stream.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                // A server that announced the close may drop the socket without a handshake
                Err(tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake))
                    if close_notice.is_some() =>
                {
                    break
                }
                Err(e) => {
                    connection.mark_closed();
                    return Err(e.into());
                }
            };
            match frame {
                Message::Text(text) => self.dispatch(&text, sender, observer, &mut close_notice),
                Message::Binary(data) => {
                    debug!(trx = %self.shared.trx, "Ignoring {} byte binary frame", data.len())
                }
                Message::Close(frame) => {
                    debug!(trx = %self.shared.trx, "Close frame received: {:?}", frame);
                    connection.mark_closed();
                }
                _ => {}
            }
        }

        connection.mark_closed();
        Ok(close_notice)
    }

    fn dispatch(
        &self,
        text: &str,
        sender: &MessageSender,
        observer: &dyn SpeechResultObserver,
        close_notice: &mut Option<VrexResponse>,
    ) {
        let trx = &self.shared.trx;
        debug!(trx = %trx, "RECEIVED message: {}", text);

        let incoming = match self.shared.codec.decode_incoming(text) {
            Ok((_, incoming)) => incoming,
            Err(e) => {
                warn!(trx = %trx, "Dropping inbound message: {}", SessionError::from(e));
                return;
            }
        };

        match incoming {
            Incoming::Listening => {
                info!(trx = %trx, "Speech server is now awaiting input from the client");
                self.shared.state.advance(SessionState::Streaming);
                self.shared.listening.fire();
                observer.on_listening();
            }
            Incoming::Transcription(transcription) if transcription.is_final => {
                info!(trx = %trx, "FINAL transcription received: {}", transcription.text);
                observer.on_final_transcription_received(&transcription.text);
            }
            Incoming::Transcription(transcription) => {
                info!(trx = %trx, "PARTIAL transcription received: {}", transcription.text);
                observer.on_partial_transcription_received(&transcription.text);
            }
            Incoming::WuwVerification(wuw) if wuw.passed => {
                info!(trx = %trx, "WUW verification PASSED (confidence {:?})", wuw.confidence);
                observer.on_wake_up_word_verification_success(wuw.confidence);
            }
            Incoming::WuwVerification(wuw) => {
                error!(trx = %trx, "WUW verification FAILED (confidence {:?})", wuw.confidence);
                sender.shutdown();
                observer.on_wake_up_word_verification_failure(wuw.confidence);
            }
            Incoming::FinalResponse(response) if response.is_success() => {
                info!(trx = %trx, "Final successful response received");
                observer.on_final_response_success(&response);
            }
            Incoming::FinalResponse(response) => {
                error!(
                    trx = %trx,
                    "Final unsuccessful response received: returnCode={} error={:?}",
                    response.return_code, response.error_message
                );
                sender.shutdown();
                observer.on_final_response_failure(&response);
            }
            Incoming::CloseConnection(response) => {
                info!(
                    trx = %trx,
                    "Server is closing the websocket connection (returnCode={})",
                    response.return_code
                );
                *close_notice = Some(response);
            }
            Incoming::Unhandled(msg_type) => {
                error!(trx = %trx, "Internal error - unhandled message: {}", msg_type);
            }
        }
    }
}
