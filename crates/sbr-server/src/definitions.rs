//! One-shot fetch of the sandbox's type-definition artifact.

use sandbridge_core::events::{BridgeEvent, EventSender};
use sandbridge_core::{BridgeError, RemoteFileService};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Fetch the definition artifact and write it to `def_file`, creating
/// parent directories as needed. Runs once per successful connect unless
/// disabled by configuration.
pub async fn write_definitions(
    service: &dyn RemoteFileService,
    def_file: &str,
    events: &EventSender,
) -> Result<(), BridgeError> {
    let text = service.fetch_definitions().await?;
    let path = Path::new(def_file);

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| BridgeError::LocalIo {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    tokio::fs::write(path, text)
        .await
        .map_err(|source| BridgeError::LocalIo {
            path: path.to_path_buf(),
            source,
        })?;

    debug!("definition artifact written to {}", path.display());
    let reported = match std::env::current_dir() {
        Ok(cwd) => relativize(path, &cwd),
        Err(_) => path.to_path_buf(),
    };
    events
        .send(BridgeEvent::DefinitionsWritten { path: reported })
        .await;
    Ok(())
}

/// Report the artifact path relative to the working directory when it lies
/// within it; paths elsewhere are reported as given.
fn relativize(path: &Path, cwd: &Path) -> PathBuf {
    path.strip_prefix(cwd)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}
