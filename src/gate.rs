//! Completion gates for cross-panel ordering.
//!
//! A [`ReadyGate`] is opened exactly once by the task that finishes a load
//! step; any number of [`ReadyWatch`] handles observe it. Dependent work
//! awaits the gate instead of polling completion flags.

use std::sync::Arc;

use tokio::sync::watch;

/// One-shot completion flag owned by the load step that populates a table.
#[derive(Debug, Clone)]
pub struct ReadyGate {
    tx: Arc<watch::Sender<bool>>,
}

/// Observer side of a [`ReadyGate`].
#[derive(Debug, Clone)]
pub struct ReadyWatch {
    rx: watch::Receiver<bool>,
}

impl ReadyGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> ReadyWatch {
        ReadyWatch {
            rx: self.tx.subscribe(),
        }
    }

    /// Marks the load step complete. Idempotent.
    pub fn open(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_open(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for ReadyGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadyWatch {
    pub fn is_open(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the gate opens. If every gate handle is dropped without
    /// opening (a failed load), the future stays pending forever: dependent
    /// panels remain in their loading state rather than running against a
    /// missing table.
    pub async fn ready(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                if *rx.borrow() {
                    return;
                }
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Barrier over several gates: resolves once every one of them is open.
pub async fn all_open(watches: &[ReadyWatch]) {
    for watch in watches {
        watch.ready().await;
    }
}
