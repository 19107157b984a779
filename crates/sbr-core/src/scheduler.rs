//! The periodic collect → diff → reconcile cycle.

use crate::config::BridgeConfig;
use crate::diff::{self, ChangeSource};
use crate::error::BridgeError;
use crate::events::{BridgeEvent, EventSender};
use crate::reconcile::reconcile;
use crate::service::RemoteFileService;
use crate::snapshot::{self, Snapshot, SyncFilter};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Drives the sync cycle and is the sole owner of historical snapshot
/// state.
///
/// A scheduler is created fresh for every peer connection, so its first
/// cycle is always the initial one and a reconnect can never diff against
/// stale pre-disconnect snapshots. All other engine components are pure
/// functions over their inputs.
pub struct SyncScheduler {
    service: Arc<dyn RemoteFileService>,
    config: BridgeConfig,
    container: String,
    filter: SyncFilter,
    events: EventSender,
    prev_local: Snapshot,
    prev_remote: Snapshot,
    initialized: bool,
}

impl SyncScheduler {
    pub fn new(
        service: Arc<dyn RemoteFileService>,
        config: BridgeConfig,
        container: impl Into<String>,
        events: EventSender,
    ) -> Self {
        let filter = SyncFilter::new(config.ignore.clone());
        Self {
            service,
            config,
            container: container.into(),
            filter,
            events,
            prev_local: Snapshot::new(),
            prev_remote: Snapshot::new(),
            initialized: false,
        }
    }

    /// Run cycles until cancelled: one immediately, then one per poll
    /// delay. Non-fatal cycle failures are logged and retried from the
    /// last known-good state on the next tick; fatal errors propagate.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), BridgeError> {
        info!(
            "sync loop started (poll delay {}ms)",
            self.config.poll_delay_ms
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.cycle().await {
                Ok(()) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(BridgeError::TransportUnavailable) => {
                    // Races with the disconnect notification; the loop is
                    // about to be cancelled.
                    debug!("cycle skipped: peer not connected");
                }
                Err(err) => {
                    warn!("sync cycle failed: {err}");
                    self.events.send(BridgeEvent::Error(err.to_string())).await;
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_delay()) => {}
            }
        }

        info!("sync loop stopped");
        Ok(())
    }

    /// Run exactly one collect → diff → reconcile cycle.
    ///
    /// A failed collection returns without touching stored snapshots. The
    /// stored snapshots are updated to what was *collected*, not to the
    /// post-reconciliation state: content actually observed is the
    /// authority for the next cycle's diff.
    pub async fn cycle(&mut self) -> Result<(), BridgeError> {
        let local = snapshot::collect_local(&self.config.base_dir, &self.filter).await?;
        let remote =
            snapshot::collect_remote(&*self.service, &self.container, &self.filter).await?;

        let is_initial = !self.initialized;
        let changes = if is_initial {
            diff::initial_changes(&local, &remote)
        } else {
            let mut changes = diff::suppress_converged(
                diff::incremental_changes(ChangeSource::Local, &self.prev_local, &local),
                &remote,
            );
            changes.extend(diff::suppress_converged(
                diff::incremental_changes(ChangeSource::Remote, &self.prev_remote, &remote),
                &local,
            ));
            changes
        };

        self.events
            .send(BridgeEvent::FileChanges {
                changes: changes.clone(),
                is_initial,
            })
            .await;

        reconcile(
            changes,
            is_initial,
            self.config.on_mismatch,
            &self.config.base_dir,
            Arc::clone(&self.service),
            &self.container,
            &self.events,
        )
        .await?;

        self.prev_local = local;
        self.prev_remote = remote;
        self.initialized = true;
        Ok(())
    }
}
