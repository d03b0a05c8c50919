//! VREX speech client SDK.
//!
//! Streams audio or text to the speech service over a websocket and reports
//! transcriptions, wake-word verification and the final response through a
//! [`SpeechResultObserver`].
//!
//! The SDK is split into:
//!
//! - **speech-wire**: envelope framing and payload models
//! - **speech-auth**: bearer token authorities and their refresh task
//! - **speech-session**: the per-interaction websocket session
//! - **this crate**: configuration files, log setup and bootstrap
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vrex_speech::{generate_trx, InitPayload, InputSource, NoopObserver, SpeechApplication};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = SpeechApplication::new()
//!     .with_config_file("speech-config.yml")
//!     .init()
//!     .await?;
//!
//! let mut session = manager
//!     .new_session(generate_trx())?
//!     .with_init(InitPayload::new())
//!     .with_audio(InputSource::text("HBO"))
//!     .with_observer(Arc::new(NoopObserver));
//! session.start()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod application;
pub mod config;
pub mod logging;

// Re-export main types
pub use application::{
    SpeechApplication, SpeechConfigurationManager, DEFAULT_CONFIG_FILE, DEFAULT_SECRETS_FILE,
};
pub use config::{
    AuthSettings, ConfigError, ConnectionConfig, LoggingConfig, SecretsConfig,
    SpeechConfiguration, WebsocketConfig,
};
pub use logging::{init_logging, SpeechLogFormatter};

pub use speech_auth::{
    AuthConfig, AuthError, AuthSnapshot, FixedAuthority, SatAuthority, TokenAuthority,
};
pub use speech_session::{
    audio_pipe, generate_trx, InputSource, NoopObserver, PipeClosed, PipeWriter, SessionConfig,
    SessionError, SessionState, SpeechResultObserver, SpeechSession,
};
pub use speech_wire::{
    ContextMessage, EndOfStream, InitPayload, MessageType, Transcription, VrexResponse,
    WuwVerification,
};
