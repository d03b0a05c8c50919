//! Dispatchable view of server messages.

use crate::envelope::Envelope;
use crate::error::WireError;
use crate::message_type::MessageType;
use crate::payload::{Transcription, VrexResponse, WuwVerification};
use serde::de::DeserializeOwned;

/// Server message resolved to its typed payload
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// Server is ready to receive input
    Listening,
    /// Partial or final transcription
    Transcription(Transcription),
    /// Wake-up-word verification result
    WuwVerification(WuwVerification),
    /// Final outcome of the request
    FinalResponse(VrexResponse),
    /// Server is closing the session
    CloseConnection(VrexResponse),
    /// Known type the client never expects to receive
    Unhandled(MessageType),
}

impl Incoming {
    /// Resolve an envelope into a typed message
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, WireError> {
        let incoming = match envelope.message_type()? {
            MessageType::Listening => Incoming::Listening,
            MessageType::Asr => Incoming::Transcription(payload(envelope, "asr")?),
            MessageType::WuwVerification => {
                Incoming::WuwVerification(payload(envelope, "wuwVerification")?)
            }
            MessageType::VrexResponse => {
                Incoming::FinalResponse(payload(envelope, "vrexResponse")?)
            }
            // Close notices may come without a body
            MessageType::CloseConnection => Incoming::CloseConnection(
                optional_payload(envelope, "closeConnection")?.unwrap_or_default(),
            ),
            other => Incoming::Unhandled(other),
        };
        Ok(incoming)
    }
}

fn payload<T: DeserializeOwned>(envelope: &Envelope, kind: &'static str) -> Result<T, WireError> {
    optional_payload(envelope, kind)?.ok_or(WireError::MissingPayload(kind))
}

fn optional_payload<T: DeserializeOwned>(
    envelope: &Envelope,
    kind: &'static str,
) -> Result<Option<T>, WireError> {
    match &envelope.msg_payload {
        None => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|source| WireError::Payload { kind, source }),
    }
}
