//! Envelope framing, message vocabulary and payload models for the speech protocol.
//!
//! Every control message exchanged with the speech server travels as a JSON
//! text frame wrapped in an [`Envelope`]. Audio travels separately as raw
//! binary frames and never touches this crate.
//!
//! ## Wire Format
//!
//! ```text
//! {
//!   "msgType":    "listening" | "asr" | ...,   closed vocabulary, see MessageType
//!   "trx":        "<transaction id>",          correlates all frames of one session
//!   "created":    1700000000000,               epoch millis at construction
//!   "msgPayload": { ... }                      type specific, optional
//! }
//! ```
//!
//! ## Vocabulary
//!
//! | direction     | msgType           | payload             |
//! |---------------|-------------------|---------------------|
//! | client→server | `init`            | [`InitPayload`]     |
//! | client→server | `endOfStream`     | [`EndOfStream`]     |
//! | client→server | `context`         | [`ContextMessage`]  |
//! | server→client | `listening`       | none                |
//! | server→client | `asr`             | [`Transcription`]   |
//! | server→client | `wuwVerification` | [`WuwVerification`] |
//! | server→client | `vrexResponse`    | [`VrexResponse`]    |
//! | bidirectional | `closeConnection` | [`VrexResponse`]    |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod envelope;
pub mod error;
pub mod inbound;
pub mod init;
pub mod message_type;
pub mod payload;

// Re-export main types
pub use envelope::{now_millis, Envelope, EnvelopeCodec, DEFAULT_MAX_MESSAGE_SIZE};
pub use error::WireError;
pub use inbound::Incoming;
pub use init::{IdValue, InitPayload, CONTEXT_CAPABILITY};
pub use message_type::MessageType;
pub use payload::{ContextMessage, EndOfStream, Transcription, VrexResponse, WuwVerification};
