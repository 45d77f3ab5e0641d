//! Debounced write-back scheduling
//!
//! Every editor change re-arms a single timer. Only when the quiet window
//! passes without another change does the timer report its epoch to the
//! session's writer, so a burst of edits settles into one write.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Observable scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    /// No unflushed change
    Idle,
    /// A debounce timer is running
    Armed { epoch: u64 },
}

/// A running debounce timer
#[derive(Debug)]
struct PendingWrite {
    epoch: u64,
    timer: JoinHandle<()>,
}

/// Debounce scheduler with at most one pending write
#[derive(Debug)]
pub struct WriteBackScheduler {
    quiet_window: Duration,
    epoch: u64,
    pending: Option<PendingWrite>,
    settle_tx: mpsc::UnboundedSender<u64>,
    latest: Arc<AtomicU64>,
}

/// Receiving end of settled epochs
#[derive(Debug)]
pub struct SettleReceiver {
    rx: mpsc::UnboundedReceiver<u64>,
    latest: Arc<AtomicU64>,
}

impl WriteBackScheduler {
    /// Create a scheduler and the receiver its timers report to
    pub fn new(quiet_window: Duration) -> (Self, SettleReceiver) {
        let (settle_tx, rx) = mpsc::unbounded_channel();
        let latest = Arc::new(AtomicU64::new(0));

        let scheduler = Self {
            quiet_window,
            epoch: 0,
            pending: None,
            settle_tx,
            latest: latest.clone(),
        };
        (scheduler, SettleReceiver { rx, latest })
    }

    pub fn quiet_window(&self) -> Duration {
        self.quiet_window
    }

    /// Start or restart the debounce timer; returns the new epoch.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(&mut self) -> u64 {
        self.cancel();

        self.epoch += 1;
        let epoch = self.epoch;
        self.latest.store(epoch, Ordering::SeqCst);

        let settle_tx = self.settle_tx.clone();
        let quiet_window = self.quiet_window;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(quiet_window).await;
            tracing::debug!("Debounce epoch {} settled", epoch);
            // The receiver is gone once the session is torn down
            let _ = settle_tx.send(epoch);
        });

        self.pending = Some(PendingWrite { epoch, timer });
        epoch
    }

    /// Cancel an unfired timer; returns whether one was cancelled
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) if !pending.timer.is_finished() => {
                pending.timer.abort();
                tracing::debug!("Cancelled pending write for epoch {}", pending.epoch);
                true
            }
            _ => false,
        }
    }

    pub fn state(&self) -> SchedulerState {
        match &self.pending {
            Some(pending) if !pending.timer.is_finished() => SchedulerState::Armed {
                epoch: pending.epoch,
            },
            _ => SchedulerState::Idle,
        }
    }

    /// Epoch of the most recent arm
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl Drop for WriteBackScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl SettleReceiver {
    /// Wait for the next settled epoch.
    ///
    /// Epochs superseded by a later arm are skipped. Returns `None` once the
    /// scheduler is dropped and no timer is left.
    pub async fn next(&mut self) -> Option<u64> {
        loop {
            let epoch = self.rx.recv().await?;
            if self.is_latest(epoch) {
                return Some(epoch);
            }
            tracing::debug!("Skipping superseded epoch {}", epoch);
        }
    }

    /// Non-blocking variant of [`SettleReceiver::next`]
    pub fn try_next(&mut self) -> Option<u64> {
        while let Ok(epoch) = self.rx.try_recv() {
            if self.is_latest(epoch) {
                return Some(epoch);
            }
        }
        None
    }

    fn is_latest(&self, epoch: u64) -> bool {
        epoch == self.latest.load(Ordering::SeqCst)
    }
}
