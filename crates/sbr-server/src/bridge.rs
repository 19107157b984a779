//! Wires the peer server, the definitions fetch, and the sync scheduler.

use crate::definitions::write_definitions;
use crate::server::{ControlEvent, PeerServer};
use sandbridge_core::events::{BridgeEvent, EventSender};
use sandbridge_core::{BridgeConfig, BridgeError, RemoteFileService, SyncScheduler};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// The sandbox's root container in the wire protocol.
const CONTAINER: &str = "home";

/// Top-level bridge: owns the connection lifecycle and starts or cancels
/// the per-connection sync loop.
pub struct Bridge {
    config: BridgeConfig,
    events: EventSender,
}

impl Bridge {
    pub fn new(config: BridgeConfig, events: EventSender) -> Self {
        Self { config, events }
    }

    /// Bind the peer server and run until `shutdown` fires or a fatal
    /// error occurs.
    ///
    /// Each connect spawns a fresh sync loop (so every reconnect begins
    /// with an initial cycle) and, unless disabled, the one-shot
    /// definitions fetch. Each disconnect cancels the loop; its snapshot
    /// history dies with it.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), BridgeError> {
        let (control_tx, mut control_rx) = mpsc::channel::<ControlEvent>(16);
        let server =
            PeerServer::bind(self.config.port, control_tx.clone(), shutdown.clone()).await?;
        let service: Arc<dyn RemoteFileService> = Arc::new(server);

        let mut sync_cancel: Option<CancellationToken> = None;

        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = control_rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            match event {
                ControlEvent::Connected => {
                    self.events.send(BridgeEvent::Connected).await;

                    if !self.config.skip_definitions() {
                        let service = Arc::clone(&service);
                        let def_file = self.config.def_file.clone();
                        let events = self.events.clone();
                        tokio::spawn(async move {
                            if let Err(e) =
                                write_definitions(&*service, &def_file, &events).await
                            {
                                events
                                    .send(BridgeEvent::Error(format!(
                                        "failed to write definitions: {e}"
                                    )))
                                    .await;
                            }
                        });
                    }

                    let cancel = CancellationToken::new();
                    sync_cancel = Some(cancel.clone());
                    let scheduler = SyncScheduler::new(
                        Arc::clone(&service),
                        self.config.clone(),
                        CONTAINER,
                        self.events.clone(),
                    );
                    let control_tx = control_tx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = scheduler.run(cancel).await {
                            let _ = control_tx.send(ControlEvent::Fatal(e)).await;
                        }
                    });
                }
                ControlEvent::Disconnected => {
                    if let Some(cancel) = sync_cancel.take() {
                        cancel.cancel();
                    }
                    self.events.send(BridgeEvent::Disconnected).await;
                }
                ControlEvent::Fatal(err) => {
                    info!("fatal bridge error: {err}");
                    if let Some(cancel) = sync_cancel.take() {
                        cancel.cancel();
                    }
                    return Err(err);
                }
            }
        }

        debug!("bridge shutting down");
        if let Some(cancel) = sync_cancel.take() {
            cancel.cancel();
        }
        Ok(())
    }
}
