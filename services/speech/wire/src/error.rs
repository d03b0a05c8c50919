//! Wire protocol error types.

use thiserror::Error;

/// Wire protocol errors
#[derive(Error, Debug)]
pub enum WireError {
    /// Body is not valid JSON or does not match the envelope shape
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Size limit exceeded
    #[error("size limit exceeded: {0}")]
    Size(usize),

    /// msgType is outside the known vocabulary
    #[error("unknown type {0}")]
    Type(String),

    /// Payload required by the message type is absent
    #[error("missing payload for {0}")]
    MissingPayload(&'static str),

    /// Payload present but does not match the expected model
    #[error("invalid {kind} payload: {source}")]
    Payload {
        /// Message type whose payload failed to decode
        kind: &'static str,
        /// Underlying decode error
        source: serde_json::Error,
    },
}
