//! Stub authority serving tokens from a fixed list.
//!
//! Used in tests and against servers that accept static tokens. Each fetch
//! moves to the next token of the sequence and sticks at the last one.

use crate::refresh::RefreshTask;
use crate::{AuthError, AuthSnapshot, SnapshotCell, TokenAuthority};
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct FixedInner {
    tokens: Vec<String>,
    fetches: AtomicUsize,
    failing: AtomicBool,
    cell: SnapshotCell,
}

impl FixedInner {
    fn fetch(&self) -> Result<Arc<AuthSnapshot>, AuthError> {
        let attempt = self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(AuthError::Stub(format!("fetch {} failed", attempt + 1)));
        }
        let index = attempt.min(self.tokens.len().saturating_sub(1));
        let token = self.tokens.get(index).ok_or(AuthError::EmptyToken)?;
        Ok(self.cell.store(AuthSnapshot::new(token.clone())))
    }
}

/// Authority serving a predefined token sequence
pub struct FixedAuthority {
    inner: Arc<FixedInner>,
    refresh: RefreshTask,
}

impl FixedAuthority {
    /// Authority that always serves `token`
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_sequence(vec![token.into()])
    }

    /// Authority serving `tokens` in order, one per fetch
    pub fn with_sequence(tokens: Vec<String>) -> Self {
        Self {
            inner: Arc::new(FixedInner {
                tokens,
                fetches: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
                cell: SnapshotCell::new(),
            }),
            refresh: RefreshTask::new("fixed"),
        }
    }

    /// Number of fetch attempts so far, failed ones included
    pub fn fetch_count(&self) -> usize {
        self.inner.fetches.load(Ordering::SeqCst)
    }

    /// Make subsequent fetches fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::SeqCst);
    }
}

impl fmt::Debug for FixedAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedAuthority")
            .field("tokens", &self.inner.tokens.len())
            .field("fetches", &self.fetch_count())
            .finish()
    }
}

#[async_trait]
impl TokenAuthority for FixedAuthority {
    fn current(&self) -> Option<Arc<AuthSnapshot>> {
        self.inner.cell.load()
    }

    async fn fetch_initial(&self) -> Result<Arc<AuthSnapshot>, AuthError> {
        self.inner.fetch()
    }

    async fn refresh(&self) -> Result<Arc<AuthSnapshot>, AuthError> {
        self.inner.fetch()
    }

    fn schedule_refresh(&self, interval: Duration) -> bool {
        let inner = self.inner.clone();
        self.refresh
            .start(interval, move || std::future::ready(inner.fetch()))
    }
}
