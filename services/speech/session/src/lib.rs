//! Websocket session engine for the speech service.
//!
//! One [`SpeechSession`] drives one interaction over its own websocket:
//!
//! - **ConnectionListener**: opens the socket, reads server events and hands
//!   them to the observer, tears the session down when the socket ends
//! - **MessageSender**: a single worker that writes init, context, input
//!   frames and end-of-stream in that order, gated on the connect and
//!   `listening` signals with bounded waits
//! - **SpeechSession**: validates setup, resolves identity and credentials,
//!   then wires the listener and sender together
//!
//! ## Example
//!
//! ```rust,no_run
//! use speech_session::{InputSource, SessionConfig, SpeechSession, generate_trx};
//! use speech_wire::InitPayload;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = SessionConfig::new("wss://speech.example.com/ws", "my-app")
//!     .with_identity(Some("device".into()), Some("account".into()), None);
//!
//! let mut session = SpeechSession::new(generate_trx(), &config)?
//!     .with_init(InitPayload::new())
//!     .with_audio(InputSource::from_path("utterance.pcm").await?);
//! session.start()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod input;
pub mod listener;
pub mod observer;
pub mod registry;
pub mod sender;
pub mod session;
pub mod shared;
pub mod signal;
pub mod state;
pub mod transport;

// Re-export main types
pub use error::SessionError;
pub use input::{
    audio_pipe, InputSource, PipeClosed, PipeReader, PipeWriter, DEFAULT_CHUNK_SIZE,
    DEFAULT_PIPE_CAPACITY,
};
pub use listener::ConnectionListener;
pub use observer::{NoopObserver, SpeechResultObserver};
pub use registry::{SessionRegistry, TrxGuard};
pub use sender::{ContextSupplier, MessageSender, SendTimeouts};
pub use session::{generate_trx, SessionConfig, SpeechSession};
pub use shared::SessionShared;
pub use signal::Signal;
pub use state::SessionState;
pub use transport::{build_uri, Connection};
