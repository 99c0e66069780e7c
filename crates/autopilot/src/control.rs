//! Pause/stop control shared between the session and a running goal
//!
//! Pause is a gate checked at every checkpoint; stop cancels a token that aborts
//! in-flight provider calls and pacing delays.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{AutopilotError, Result};

#[derive(Debug, Clone)]
pub struct RunControl {
    paused: Arc<watch::Sender<bool>>,
    cancel: CancellationToken,
}

impl RunControl {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            paused: Arc::new(paused),
            cancel: CancellationToken::new(),
        }
    }

    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait while paused. Returns `Cancelled` once stopped.
    pub async fn checkpoint(&self) -> Result<()> {
        let mut rx = self.paused.subscribe();
        loop {
            if self.cancel.is_cancelled() {
                return Err(AutopilotError::Cancelled);
            }
            if !*rx.borrow_and_update() {
                return Ok(());
            }
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                }
                _ = self.cancel.cancelled() => return Err(AutopilotError::Cancelled),
            }
        }
    }

    /// Run a future unless the run is stopped first.
    pub async fn guard<F>(&self, fut: F) -> Result<F::Output>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AutopilotError::Cancelled),
            out = fut => Ok(out),
        }
    }

    /// Interruptible pacing delay.
    pub async fn sleep(&self, delay: Duration) -> Result<()> {
        if delay.is_zero() {
            return self.checkpoint().await;
        }
        self.guard(tokio::time::sleep(delay)).await?;
        self.checkpoint().await
    }
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}
