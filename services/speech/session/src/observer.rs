//! Caller-facing session callbacks.

use speech_wire::VrexResponse;

use crate::error::SessionError;

/// Receiver of session events
///
/// Callbacks run on the session's inbound task and should return quickly.
/// Exactly one of [`on_close_connection`](Self::on_close_connection) and
/// [`on_error`](Self::on_error) is delivered per started session.
#[allow(unused_variables)]
pub trait SpeechResultObserver: Send + Sync {
    /// Server is ready for input
    fn on_listening(&self) {}

    /// Partial transcription update
    fn on_partial_transcription_received(&self, text: &str) {}

    /// Final transcription of the utterance
    fn on_final_transcription_received(&self, text: &str) {}

    /// Wake word confirmed
    fn on_wake_up_word_verification_success(&self, confidence: Option<i32>) {}

    /// Wake word rejected; outbound sending has been stopped
    fn on_wake_up_word_verification_failure(&self, confidence: Option<i32>) {}

    /// Request succeeded
    fn on_final_response_success(&self, result: &VrexResponse) {}

    /// Request failed; outbound sending has been stopped
    fn on_final_response_failure(&self, result: &VrexResponse) {}

    /// Session ended; carries the server's close notice if one was received
    fn on_close_connection(&self, result: Option<&VrexResponse>) {}

    /// Session ended on a transport failure
    fn on_error(&self, cause: &SessionError) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SpeechResultObserver for NoopObserver {}
