//! Periodic credential refresh.

use crate::{AuthError, AuthSnapshot};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Owner of one background refresh loop
///
/// The loop is aborted when the task is stopped or dropped.
#[derive(Debug)]
pub struct RefreshTask {
    name: &'static str,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshTask {
    /// Create an idle refresh task
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            handle: Mutex::new(None),
        }
    }

    /// Run `job` every `interval`, first run one interval from now
    ///
    /// Failures are logged and the previous snapshot stays in place.
    /// Must be called from within a Tokio runtime.
    pub fn start<F, Fut>(&self, interval: Duration, mut job: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Arc<AuthSnapshot>, AuthError>> + Send + 'static,
    {
        if interval.is_zero() {
            warn!(authority = self.name, "Refusing to schedule refresh with a zero interval");
            return false;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(authority = self.name, error = %e, "No runtime available for token refresh");
                return false;
            }
        };

        let Some(first_tick) = Instant::now().checked_add(interval) else {
            warn!(authority = self.name, "Refusing to schedule refresh with an unbounded interval");
            return false;
        };

        let mut handle = self.handle.lock();
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            warn!(authority = self.name, "Token refresh already scheduled");
            return false;
        }

        let name = self.name;
        *handle = Some(runtime.spawn(async move {
            let mut ticker = interval_at(first_tick, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match job().await {
                    Ok(snapshot) => {
                        debug!(authority = name, fetched_at = %snapshot.fetched_at, "Token refreshed")
                    }
                    Err(e) => {
                        warn!(authority = name, error = %e, "Token refresh failed, keeping previous token")
                    }
                }
            }
        }));

        info!(authority = self.name, interval_secs = interval.as_secs(), "Scheduled token refresh");
        true
    }

    /// Whether a refresh loop is active
    pub fn is_running(&self) -> bool {
        self.handle.lock().as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Abort the refresh loop
    pub fn stop(&self) {
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for RefreshTask {
    fn drop(&mut self) {
        self.stop();
    }
}
