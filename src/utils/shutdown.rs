//! Cooperative cancellation shared by every suspension point.

use std::future::Future;

use tokio::sync::watch;

use crate::error::{AppError, Result};

/// Receiving side of the cancellation signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Sending side, held by whoever decides to stop the run.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    /// Create a linked trigger/handle pair.
    pub fn new() -> (ShutdownTrigger, Shutdown) {
        let (tx, rx) = watch::channel(false);
        (ShutdownTrigger { tx }, Shutdown { rx })
    }

    /// A handle that is never cancelled.
    pub fn never() -> Self {
        let (trigger, shutdown) = Self::new();
        // Dropping the sender keeps the last value (false) forever.
        drop(trigger);
        shutdown
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is requested. Pends forever otherwise.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Run `fut` unless cancellation wins the race.
    pub async fn guard<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        tokio::select! {
            result = fut => result,
            _ = self.cancelled() => Err(AppError::Cancelled),
        }
    }
}

impl ShutdownTrigger {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}
