//! Message type vocabulary.
//!
//! The set is closed: anything the server sends outside of it is reported as
//! [`WireError::Type`](crate::WireError::Type) and ignored by the session.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Message types as defined in the speech protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// Session initialization (client→server)
    #[serde(rename = "init")]
    Init,
    /// End of audio input (client→server)
    #[serde(rename = "endOfStream")]
    EndOfStream,
    /// Supplemental context (client→server)
    #[serde(rename = "context")]
    Context,
    /// Server is ready to receive input (server→client)
    #[serde(rename = "listening")]
    Listening,
    /// Partial or final transcription (server→client)
    #[serde(rename = "asr")]
    Asr,
    /// Wake-up-word verification result (server→client)
    #[serde(rename = "wuwVerification")]
    WuwVerification,
    /// Final outcome of the request (server→client)
    #[serde(rename = "vrexResponse")]
    VrexResponse,
    /// Session termination notice (bidirectional)
    #[serde(rename = "closeConnection")]
    CloseConnection,
}

impl MessageType {
    /// All known message types
    pub const ALL: [MessageType; 8] = [
        MessageType::Init,
        MessageType::EndOfStream,
        MessageType::Context,
        MessageType::Listening,
        MessageType::Asr,
        MessageType::WuwVerification,
        MessageType::VrexResponse,
        MessageType::CloseConnection,
    ];

    /// Wire name of the message type
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Init => "init",
            MessageType::EndOfStream => "endOfStream",
            MessageType::Context => "context",
            MessageType::Listening => "listening",
            MessageType::Asr => "asr",
            MessageType::WuwVerification => "wuwVerification",
            MessageType::VrexResponse => "vrexResponse",
            MessageType::CloseConnection => "closeConnection",
        }
    }

    /// Look up a wire name, ignoring ASCII case
    pub fn from_wire(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|typ| typ.as_str().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for MessageType {
    type Error = crate::WireError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_wire(value).ok_or_else(|| crate::WireError::Type(value.to_string()))
    }
}
