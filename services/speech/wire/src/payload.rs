//! Payload models carried inside envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Transcription update (`asr`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcription {
    /// Recognized text so far
    #[serde(default)]
    pub text: String,
    /// Whether this is the final transcription of the utterance
    #[serde(default)]
    pub is_final: bool,
}

/// Wake-up-word verification result (`wuwVerification`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WuwVerification {
    /// Whether the wake word was confirmed
    #[serde(default)]
    pub passed: bool,
    /// Verification confidence score
    #[serde(default)]
    pub confidence: Option<i32>,
}

fn default_connection_closed() -> bool {
    true
}

/// Final outcome of a request (`vrexResponse`, `closeConnection`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VrexResponse {
    /// 0 on success, anything else is a failure
    #[serde(default)]
    pub return_code: i32,
    /// Command the server resolved, opaque to the client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_command: Option<Value>,
    /// Error description for failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Human readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_message: Option<String>,
    /// Whether the server closes the connection after this response
    #[serde(default = "default_connection_closed")]
    pub connection_closed: bool,
    /// Execution result, opaque to the client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute_response: Option<Value>,
}

impl VrexResponse {
    /// Whether the return code signals success
    pub fn is_success(&self) -> bool {
        self.return_code == 0
    }
}

impl Default for VrexResponse {
    fn default() -> Self {
        Self {
            return_code: 0,
            last_command: None,
            error_message: None,
            display_message: None,
            connection_closed: true,
            execute_response: None,
        }
    }
}

/// End of audio input marker (`endOfStream`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndOfStream {
    /// Reason code, 0 for a normal end of input
    pub reason: i32,
}

impl EndOfStream {
    /// Marker for input that ran to completion
    pub fn normal() -> Self {
        Self { reason: 0 }
    }
}

/// Supplemental context sent after init (`context`)
///
/// The content is defined by the caller; the session only forwards it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextMessage(pub Value);

impl ContextMessage {
    /// Wrap an already structured value
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Build from any serializable context model
    pub fn from_serializable<T: Serialize>(model: &T) -> Result<Self, serde_json::Error> {
        Ok(Self(serde_json::to_value(model)?))
    }
}
