//! Bearer credential authority for the speech service.
//!
//! A [`TokenAuthority`] hands out the current [`AuthSnapshot`] to sessions at
//! connection-build time and keeps it fresh with a periodic background
//! refresh. The snapshot lives in a [`SnapshotCell`]: readers clone an `Arc`
//! to an immutable snapshot, the refresher swaps in a new one, so a reader
//! always sees a whole token and its fetch time, never a mix of old and new.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod refresh;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Immutable credential as fetched from the authority
#[derive(Clone, PartialEq, Eq)]
pub struct AuthSnapshot {
    /// Bearer token passed to the speech server
    pub token: String,
    /// When the token was obtained
    pub fetched_at: DateTime<Utc>,
}

impl AuthSnapshot {
    /// Snapshot of a token fetched now
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            fetched_at: Utc::now(),
        }
    }
}

impl fmt::Debug for AuthSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSnapshot")
            .field("token", &"<redacted>")
            .field("fetched_at", &self.fetched_at)
            .finish()
    }
}

/// Swap-on-write holder of the current snapshot
///
/// The write lock is held only for the pointer swap.
#[derive(Debug, Default)]
pub struct SnapshotCell {
    current: RwLock<Option<Arc<AuthSnapshot>>>,
}

impl SnapshotCell {
    /// Create an empty cell
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot, if one was ever stored
    pub fn load(&self) -> Option<Arc<AuthSnapshot>> {
        self.current.read().clone()
    }

    /// Replace the snapshot, returning the previous one
    ///
    /// Once a snapshot is stored the cell never goes back to empty.
    pub fn store(&self, snapshot: AuthSnapshot) -> Arc<AuthSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self.current.write() = Some(snapshot.clone());
        snapshot
    }
}

/// Credential errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be parsed
    #[error("Invalid token response: {0}")]
    Json(#[from] serde_json::Error),

    /// Authority answered with a non-success status
    #[error("Token request rejected with status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        body: String,
    },

    /// Response carried no usable token
    #[error("Token response contained no token")]
    EmptyToken,

    /// Required setting missing
    #[error("Auth not configured: {0} is missing")]
    NotConfigured(&'static str),

    /// No token has been fetched yet
    #[error("No token fetched yet")]
    NotFetched,

    /// Failure injected by the stub authority
    #[error("Stub authority failure: {0}")]
    Stub(String),
}

/// Source of bearer credentials
///
/// Implementations must be safe to read from any number of sessions while a
/// refresh is in flight.
#[async_trait]
pub trait TokenAuthority: Send + Sync + fmt::Debug {
    /// Current snapshot, `None` until the first successful fetch
    fn current(&self) -> Option<Arc<AuthSnapshot>>;

    /// Fetch the first token; failure is fatal to startup
    async fn fetch_initial(&self) -> Result<Arc<AuthSnapshot>, AuthError>;

    /// Fetch a new token and swap it in on success
    async fn refresh(&self) -> Result<Arc<AuthSnapshot>, AuthError>;

    /// Start the periodic refresh task
    ///
    /// Returns `false` if a task is already running or none could be started.
    fn schedule_refresh(&self, interval: Duration) -> bool;

    /// Current bearer token
    fn token(&self) -> Option<String> {
        self.current().map(|snapshot| snapshot.token.clone())
    }
}

// Re-export backend implementations
pub use backend::fixed::FixedAuthority;
pub use backend::sat::{AuthConfig, SatAuthority};
pub use refresh::RefreshTask;
