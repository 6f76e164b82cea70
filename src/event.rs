use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::error::{Result, TreeError};

/// Events driving a watched tree.
#[derive(Debug)]
pub enum TreeEvent {
    /// Filesystem change batch detected by the watcher (host paths).
    FsChange(Vec<PathBuf>),
    /// Ctrl-C or an explicit stop request.
    Shutdown,
}

/// Funnels watcher batches and the shutdown signal into one channel so the
/// tree is only ever touched from the receiving task.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<TreeEvent>,
    tx: mpsc::UnboundedSender<TreeEvent>,
}

impl EventHandler {
    /// Create the handler and spawn the Ctrl-C listener.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown_tx = tx.clone();

        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(TreeEvent::Shutdown);
            }
        });

        Self { rx, tx }
    }

    /// Sender clone for producers such as the watcher.
    pub fn sender(&self) -> mpsc::UnboundedSender<TreeEvent> {
        self.tx.clone()
    }

    /// Receive the next event.
    pub async fn next(&mut self) -> Result<TreeEvent> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| TreeError::Watcher("Event channel closed".into()))
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}
