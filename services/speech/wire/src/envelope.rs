//! Envelope framing for text frames.
//!
//! This module provides the envelope structure that wraps every control
//! message, and the codec that turns envelopes into text frames and back.

use crate::error::WireError;
use crate::inbound::Incoming;
use crate::message_type::MessageType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum accepted size of an inbound text frame (1 MiB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Current wall clock in epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Wire unit for every control message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Wire name of the message type
    pub msg_type: String,
    /// Transaction id of the owning session
    #[serde(default)]
    pub trx: String,
    /// Creation time in epoch milliseconds
    #[serde(default)]
    pub created: i64,
    /// Type specific payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_payload: Option<Value>,
}

impl Envelope {
    /// Create an envelope without payload, stamped with the current time
    pub fn new(trx: &str, msg_type: MessageType) -> Self {
        Self {
            msg_type: msg_type.as_str().to_string(),
            trx: trx.to_string(),
            created: now_millis(),
            msg_payload: None,
        }
    }

    /// Create an envelope carrying a serialized payload
    pub fn with_payload<T: Serialize>(
        trx: &str,
        msg_type: MessageType,
        payload: &T,
    ) -> Result<Self, WireError> {
        let mut envelope = Self::new(trx, msg_type);
        envelope.msg_payload = Some(serde_json::to_value(payload)?);
        Ok(envelope)
    }

    /// Resolve the message type against the known vocabulary
    pub fn message_type(&self) -> Result<MessageType, WireError> {
        MessageType::try_from(self.msg_type.as_str())
    }
}

/// Encoder/decoder for envelope text frames
///
/// One codec is constructed per session and shared by its listener and sender.
#[derive(Debug, Clone)]
pub struct EnvelopeCodec {
    max_message_size: usize,
}

impl EnvelopeCodec {
    /// Create a codec with the default size limit
    pub fn new() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    /// Create a codec with a custom inbound size limit
    pub fn with_max_message_size(max_message_size: usize) -> Self {
        Self { max_message_size }
    }

    /// Encode an envelope as a text frame body
    pub fn encode(&self, envelope: &Envelope) -> Result<String, WireError> {
        Ok(serde_json::to_string(envelope)?)
    }

    /// Decode a text frame body into an envelope
    ///
    /// Unknown fields are ignored so that newer servers stay readable.
    pub fn decode(&self, text: &str) -> Result<Envelope, WireError> {
        if text.len() > self.max_message_size {
            return Err(WireError::Size(text.len()));
        }
        Ok(serde_json::from_str(text)?)
    }

    /// Decode a text frame body straight into a dispatchable message
    pub fn decode_incoming(&self, text: &str) -> Result<(Envelope, Incoming), WireError> {
        let envelope = self.decode(text)?;
        let incoming = Incoming::from_envelope(&envelope)?;
        Ok((envelope, incoming))
    }
}

impl Default for EnvelopeCodec {
    fn default() -> Self {
        Self::new()
    }
}
