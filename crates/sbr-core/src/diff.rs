//! Change classification between snapshots.
//!
//! Two operating modes: the initial diff compares the two sides' first
//! snapshots directly (no prior history), the incremental diff compares one
//! side's current snapshot against its previous one. Both are pure
//! transforms; the scheduler owns all state.

use crate::snapshot::Snapshot;

/// Which side a change was observed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSource {
    Local,
    Remote,
}

/// The kind of transition observed between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Updated,
    Deleted,
}

/// A transition observed on one side between two snapshots, or (on the
/// initial cycle) a difference between the two sides' first snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub file: String,
    pub source: ChangeSource,
    pub kind: ChangeKind,
    /// Present for added/updated, absent for deleted.
    pub content: Option<String>,
}

/// Compute the initial diff between the two sides' first snapshots.
///
/// A path present in both with differing content yields *two* `Updated`
/// changes, one per side. The duplication is intentional: the reconciler's
/// mismatch policy decides which copy is authoritative, not the diff.
pub fn initial_changes(local: &Snapshot, remote: &Snapshot) -> Vec<Change> {
    let mut changes = Vec::new();

    for (file, content) in local {
        match remote.get(file) {
            None => changes.push(Change {
                file: file.clone(),
                source: ChangeSource::Local,
                kind: ChangeKind::Added,
                content: Some(content.clone()),
            }),
            Some(remote_content) if remote_content != content => changes.push(Change {
                file: file.clone(),
                source: ChangeSource::Local,
                kind: ChangeKind::Updated,
                content: Some(content.clone()),
            }),
            Some(_) => {}
        }
    }

    for (file, content) in remote {
        match local.get(file) {
            None => changes.push(Change {
                file: file.clone(),
                source: ChangeSource::Remote,
                kind: ChangeKind::Added,
                content: Some(content.clone()),
            }),
            Some(local_content) if local_content != content => changes.push(Change {
                file: file.clone(),
                source: ChangeSource::Remote,
                kind: ChangeKind::Updated,
                content: Some(content.clone()),
            }),
            Some(_) => {}
        }
    }

    changes
}

/// Compute one side's changes between its previous and current snapshots.
pub fn incremental_changes(
    source: ChangeSource,
    previous: &Snapshot,
    current: &Snapshot,
) -> Vec<Change> {
    let mut changes = Vec::new();

    for (file, content) in current {
        match previous.get(file) {
            None => changes.push(Change {
                file: file.clone(),
                source,
                kind: ChangeKind::Added,
                content: Some(content.clone()),
            }),
            Some(prev_content) if prev_content != content => changes.push(Change {
                file: file.clone(),
                source,
                kind: ChangeKind::Updated,
                content: Some(content.clone()),
            }),
            Some(_) => {}
        }
    }

    for file in previous.keys() {
        if !current.contains_key(file) {
            changes.push(Change {
                file: file.clone(),
                source,
                kind: ChangeKind::Deleted,
                content: None,
            });
        }
    }

    changes
}

/// Drop changes whose target content already equals the *other* side's
/// current value for that path.
///
/// This value-based skip applies only to incremental diffs. It prevents
/// re-propagating a change that has already converged: both sides edited
/// to the same content, or a transfer from a previous cycle already
/// landed. A deletion (`content` = None) is likewise suppressed when the
/// other side no longer has the file.
pub fn suppress_converged(changes: Vec<Change>, other: &Snapshot) -> Vec<Change> {
    changes
        .into_iter()
        .filter(|change| change.content.as_deref() != other.get(&change.file).map(String::as_str))
        .collect()
}
