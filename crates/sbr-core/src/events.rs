//! Bridge events consumed by the presentation layer.

use crate::diff::Change;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::debug;

/// Semantic tag for a dispatched file effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Uploaded,
    Downloaded,
    LocalDeleted,
    RemoteDeleted,
}

/// Observable events emitted while the bridge runs.
#[derive(Debug)]
pub enum BridgeEvent {
    /// A sandbox peer connected.
    Connected,
    /// The sandbox peer disconnected.
    Disconnected,
    /// A non-fatal error was surfaced (failed effect, failed cycle).
    Error(String),
    /// A cycle's classified changes, before reconciliation.
    FileChanges {
        changes: Vec<Change>,
        is_initial: bool,
    },
    /// One file effect completed.
    FileAction { file: String, action: FileAction },
    /// The definition artifact was written.
    DefinitionsWritten { path: PathBuf },
}

/// Sender half of the bridge event channel.
///
/// A dropped receiver silently discards further events, so background
/// tasks never error out because the consumer went away first.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<BridgeEvent>,
}

/// Create a bridge event channel with the given capacity.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<BridgeEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender { tx }, rx)
}

impl EventSender {
    pub async fn send(&self, event: BridgeEvent) {
        if self.tx.send(event).await.is_err() {
            debug!("event receiver dropped; discarding event");
        }
    }
}
