//! Turns classified changes into concrete transfer and delete effects.

use crate::config::MismatchPolicy;
use crate::diff::{Change, ChangeKind, ChangeSource};
use crate::error::BridgeError;
use crate::events::{BridgeEvent, EventSender, FileAction};
use crate::service::RemoteFileService;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Whether the initial-sync mismatch policy discards this change.
///
/// The initial diff emits an `Updated` change for *both* copies of a
/// mismatched path; the policy keeps only the authoritative side.
/// `Added` and `Deleted` changes are never filtered here.
fn policy_skips(change: &Change, policy: MismatchPolicy) -> bool {
    change.kind == ChangeKind::Updated
        && matches!(
            (policy, change.source),
            (MismatchPolicy::Upload, ChangeSource::Remote)
                | (MismatchPolicy::Download, ChangeSource::Local)
        )
}

/// Apply a batch of changes.
///
/// On the initial cycle under the `fail` policy, any `Updated` change
/// aborts with [`BridgeError::MismatchConflict`] before a single effect is
/// dispatched. Otherwise surviving changes run concurrently, one task per
/// change (at most one change per path survives the policy filter), and
/// individual failures are reported as events without blocking the rest of
/// the batch.
pub async fn reconcile(
    changes: Vec<Change>,
    is_initial: bool,
    policy: MismatchPolicy,
    base_dir: &Path,
    service: Arc<dyn RemoteFileService>,
    container: &str,
    events: &EventSender,
) -> Result<(), BridgeError> {
    if is_initial && policy == MismatchPolicy::Fail {
        let mut mismatched: Vec<String> = changes
            .iter()
            .filter(|c| c.kind == ChangeKind::Updated)
            .map(|c| c.file.clone())
            .collect();
        if !mismatched.is_empty() {
            // Both sides reported each mismatched path once.
            mismatched.sort();
            mismatched.dedup();
            return Err(BridgeError::MismatchConflict { files: mismatched });
        }
    }

    let mut tasks: JoinSet<Result<(String, FileAction), (String, BridgeError)>> = JoinSet::new();

    for change in changes {
        if is_initial && policy_skips(&change, policy) {
            debug!(
                "skipping non-authoritative {:?} copy of {}",
                change.source, change.file
            );
            continue;
        }
        let service = Arc::clone(&service);
        let base_dir = base_dir.to_path_buf();
        let container = container.to_string();
        tasks.spawn(async move { apply_change(change, &base_dir, &*service, &container).await });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok((file, action))) => {
                events.send(BridgeEvent::FileAction { file, action }).await;
            }
            Ok(Err((file, err))) => {
                warn!("failed to apply change for {file}: {err}");
                events.send(BridgeEvent::Error(format!("{file}: {err}"))).await;
            }
            Err(join_err) => {
                events
                    .send(BridgeEvent::Error(format!("sync task panicked: {join_err}")))
                    .await;
            }
        }
    }

    Ok(())
}

/// Dispatch one change to the side that did not originate it.
async fn apply_change(
    change: Change,
    base_dir: &Path,
    service: &dyn RemoteFileService,
    container: &str,
) -> Result<(String, FileAction), (String, BridgeError)> {
    let file = change.file;
    let content = change.content.unwrap_or_default();

    let result = match (change.kind, change.source) {
        (ChangeKind::Deleted, ChangeSource::Local) => service
            .delete_file(container, &file)
            .await
            .map(|()| FileAction::RemoteDeleted),
        (ChangeKind::Deleted, ChangeSource::Remote) => {
            let path = base_dir.join(&file);
            tokio::fs::remove_file(&path)
                .await
                .map(|()| FileAction::LocalDeleted)
                .map_err(|source| BridgeError::LocalIo { path, source })
        }
        (_, ChangeSource::Local) => service
            .write_file(container, &file, &content)
            .await
            .map(|()| FileAction::Uploaded),
        (_, ChangeSource::Remote) => write_local(base_dir, &file, &content)
            .await
            .map(|()| FileAction::Downloaded),
    };

    match result {
        Ok(action) => Ok((file, action)),
        Err(err) => Err((file, err)),
    }
}

/// Write a downloaded file, creating parent directories as needed.
async fn write_local(base_dir: &Path, file: &str, content: &str) -> Result<(), BridgeError> {
    let path: PathBuf = base_dir.join(file);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| BridgeError::LocalIo {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    tokio::fs::write(&path, content)
        .await
        .map_err(|source| BridgeError::LocalIo { path, source })
}
