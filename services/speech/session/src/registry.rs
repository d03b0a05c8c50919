//! Registry of live transaction ids.

use dashmap::DashSet;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::error::SessionError;

/// Registry shared by every session in the process
static GLOBAL_SESSION_REGISTRY: Lazy<Arc<SessionRegistry>> =
    Lazy::new(|| Arc::new(SessionRegistry::new()));

/// Set of trx values held by live sessions
#[derive(Debug, Default)]
pub struct SessionRegistry {
    active: DashSet<String>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    pub fn global() -> Arc<SessionRegistry> {
        GLOBAL_SESSION_REGISTRY.clone()
    }

    /// Claim `trx` for a new session
    pub fn register(self: &Arc<Self>, trx: &str) -> Result<TrxGuard, SessionError> {
        if !self.active.insert(trx.to_string()) {
            return Err(SessionError::DuplicateSession(trx.to_string()));
        }
        debug!(trx = %trx, "Registered session");
        Ok(TrxGuard {
            registry: self.clone(),
            trx: trx.to_string(),
            released: AtomicBool::new(false),
        })
    }

    /// Whether `trx` is held by a live session
    pub fn is_active(&self, trx: &str) -> bool {
        self.active.contains(trx)
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether no session is live
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// Claim on a trx, released once on session end or drop
#[derive(Debug)]
pub struct TrxGuard {
    registry: Arc<SessionRegistry>,
    trx: String,
    released: AtomicBool,
}

impl TrxGuard {
    /// Release the claim; later calls do nothing
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            self.registry.active.remove(&self.trx);
            debug!(trx = %self.trx, "Released session");
        }
    }
}

impl Drop for TrxGuard {
    fn drop(&mut self) {
        self.release();
    }
}
