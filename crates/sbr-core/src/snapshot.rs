//! Point-in-time snapshots of the local tree and the sandbox file set.

use crate::error::BridgeError;
use crate::service::RemoteFileService;
use std::collections::BTreeMap;
use std::path::Path;
use walkdir::WalkDir;

/// Full path → content mapping for one side, captured at one instant.
///
/// Keys are base-dir-relative, forward-slash-normalized paths. A snapshot
/// is immutable once produced and replaced wholesale each cycle.
pub type Snapshot = BTreeMap<String, String>;

/// Extensions that participate in synchronization: scripts, type
/// definitions, and plain text.
const SYNCED_EXTENSIONS: &[&str] = &["js", "ts", "txt"];

/// Decides which relative paths participate in synchronization.
///
/// The same filter is applied to both sides, so an ignored file can never
/// appear in a snapshot, a change list, or an effect.
#[derive(Debug, Clone)]
pub struct SyncFilter {
    ignore: Vec<String>,
}

impl SyncFilter {
    pub fn new(ignore: impl IntoIterator<Item = String>) -> Self {
        Self {
            ignore: ignore.into_iter().collect(),
        }
    }

    /// Whether `relative_path` is synchronized.
    ///
    /// Remote paths are peer-supplied, so absolute paths and `..`
    /// components are rejected here as well as ignore prefixes.
    pub fn is_synced(&self, relative_path: &str) -> bool {
        if relative_path.is_empty() || relative_path.starts_with('/') {
            return false;
        }
        if relative_path.split('/').any(|part| part == "..") {
            return false;
        }
        let recognized = Path::new(relative_path)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SYNCED_EXTENSIONS.contains(&ext));
        if !recognized {
            return false;
        }
        // Ignore prefixes are case-sensitive, matched against the
        // forward-slash-normalized relative path.
        !self
            .ignore
            .iter()
            .any(|prefix| relative_path.starts_with(prefix.as_str()))
    }
}

/// Collect a snapshot of the local directory tree.
///
/// The walk gathers matching paths, then contents are read through
/// `tokio::fs`. Fails on any unreadable path; a failed collection cancels
/// the cycle and must not update historical state, so errors propagate.
pub async fn collect_local(base_dir: &Path, filter: &SyncFilter) -> Result<Snapshot, BridgeError> {
    let mut paths = Vec::new();

    for entry in WalkDir::new(base_dir) {
        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| base_dir.to_path_buf());
            BridgeError::LocalIo {
                path,
                source: e.into(),
            }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(base_dir) else {
            continue;
        };
        let relative = normalize(relative);
        if !filter.is_synced(&relative) {
            continue;
        }
        paths.push((relative, entry.into_path()));
    }

    let mut files = Snapshot::new();
    for (relative, path) in paths {
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| BridgeError::LocalIo { path, source })?;
        files.insert(relative, content);
    }

    Ok(files)
}

/// Collect a snapshot of the sandbox file set through one RPC exchange,
/// filtered identically to the local side.
pub async fn collect_remote(
    service: &dyn RemoteFileService,
    container: &str,
    filter: &SyncFilter,
) -> Result<Snapshot, BridgeError> {
    let mut files = Snapshot::new();
    for file in service.list_all_files(container).await? {
        if filter.is_synced(&file.filename) {
            files.insert(file.filename, file.content);
        }
    }
    Ok(files)
}

/// Join path components with forward slashes regardless of platform.
fn normalize(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
