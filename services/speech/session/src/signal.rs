//! One-shot broadcast signals.
//!
//! A [`Signal`] fires at most once and never resets. Waiters always give a
//! bound; a wait that runs out reports `false` and the caller takes its
//! fallback path.

use std::time::Duration;
use tokio::sync::watch;

/// Fire-once latch observable by any number of waiters
#[derive(Debug)]
pub struct Signal {
    tx: watch::Sender<bool>,
}

impl Signal {
    /// Create an unfired signal
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Fire the signal; returns `true` only for the first call
    pub fn fire(&self) -> bool {
        self.tx.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }

    /// Whether the signal has fired
    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait up to `timeout` for the signal, `true` if it fired
    pub async fn wait(&self, timeout: Duration) -> bool {
        let mut rx = self.tx.subscribe();
        let fired = matches!(
            tokio::time::timeout(timeout, rx.wait_for(|fired| *fired)).await,
            Ok(Ok(_))
        );
        fired
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}
