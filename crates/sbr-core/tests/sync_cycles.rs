//! Cycle-level tests for the sync engine, driven deterministically through
//! `SyncScheduler::cycle()` with an in-memory sandbox and a temp directory.

use async_trait::async_trait;
use sandbridge_core::events::{self, BridgeEvent, FileAction};
use sandbridge_core::{
    BridgeConfig, BridgeError, MismatchPolicy, RemoteFile, RemoteFileService, SyncScheduler,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::mpsc;

/// In-memory stand-in for the sandbox peer.
#[derive(Default)]
struct FakeSandbox {
    files: Mutex<BTreeMap<String, String>>,
    /// Filenames whose writes are rejected, for failure-isolation tests.
    fail_writes: Mutex<BTreeSet<String>>,
}

impl FakeSandbox {
    fn set(&self, filename: &str, content: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(filename.to_string(), content.to_string());
    }

    fn get(&self, filename: &str) -> Option<String> {
        self.files.lock().unwrap().get(filename).cloned()
    }

    fn remove(&self, filename: &str) {
        self.files.lock().unwrap().remove(filename);
    }

    fn fail_writes_to(&self, filename: &str) {
        self.fail_writes
            .lock()
            .unwrap()
            .insert(filename.to_string());
    }
}

#[async_trait]
impl RemoteFileService for FakeSandbox {
    async fn list_files(&self, _container: &str) -> Result<Vec<String>, BridgeError> {
        Ok(self.files.lock().unwrap().keys().cloned().collect())
    }

    async fn read_file(&self, _container: &str, filename: &str) -> Result<String, BridgeError> {
        self.get(filename).ok_or_else(|| BridgeError::RemoteRejected {
            message: format!("no such file: {filename}"),
        })
    }

    async fn write_file(
        &self,
        _container: &str,
        filename: &str,
        content: &str,
    ) -> Result<(), BridgeError> {
        if self.fail_writes.lock().unwrap().contains(filename) {
            return Err(BridgeError::RemoteRejected {
                message: format!("write rejected: {filename}"),
            });
        }
        self.set(filename, content);
        Ok(())
    }

    async fn delete_file(&self, _container: &str, filename: &str) -> Result<(), BridgeError> {
        self.remove(filename);
        Ok(())
    }

    async fn list_all_files(&self, _container: &str) -> Result<Vec<RemoteFile>, BridgeError> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .iter()
            .map(|(filename, content)| RemoteFile {
                filename: filename.clone(),
                content: content.clone(),
            })
            .collect())
    }

    async fn fetch_definitions(&self) -> Result<String, BridgeError> {
        Ok("declare const sandbox: unknown;".to_string())
    }
}

struct Harness {
    dir: TempDir,
    sandbox: Arc<FakeSandbox>,
    scheduler: SyncScheduler,
    rx: mpsc::Receiver<BridgeEvent>,
}

impl Harness {
    fn new(policy: MismatchPolicy) -> Self {
        let dir = TempDir::new().unwrap();
        let sandbox = Arc::new(FakeSandbox::default());
        let (tx, rx) = events::channel(256);
        let config = BridgeConfig {
            base_dir: dir.path().to_path_buf(),
            on_mismatch: policy,
            ..Default::default()
        };
        let scheduler = SyncScheduler::new(
            Arc::clone(&sandbox) as Arc<dyn RemoteFileService>,
            config,
            "home",
            tx,
        );
        Self {
            dir,
            sandbox,
            scheduler,
            rx,
        }
    }

    /// Fresh scheduler over the same directory and sandbox, as the bridge
    /// creates after a reconnect.
    fn reconnect(&mut self, policy: MismatchPolicy) {
        let (tx, rx) = events::channel(256);
        let config = BridgeConfig {
            base_dir: self.dir.path().to_path_buf(),
            on_mismatch: policy,
            ..Default::default()
        };
        self.scheduler = SyncScheduler::new(
            Arc::clone(&self.sandbox) as Arc<dyn RemoteFileService>,
            config,
            "home",
            tx,
        );
        self.rx = rx;
    }

    fn write_local(&self, file: &str, content: &str) {
        let path = self.dir.path().join(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn read_local(&self, file: &str) -> Option<String> {
        fs::read_to_string(self.dir.path().join(file)).ok()
    }

    fn delete_local(&self, file: &str) {
        fs::remove_file(self.dir.path().join(file)).unwrap();
    }

    fn drain_events(&mut self) -> Vec<BridgeEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            out.push(event);
        }
        out
    }

    fn actions(events: &[BridgeEvent]) -> Vec<(String, FileAction)> {
        events
            .iter()
            .filter_map(|e| match e {
                BridgeEvent::FileAction { file, action } => Some((file.clone(), *action)),
                _ => None,
            })
            .collect()
    }
}

#[tokio::test]
async fn second_cycle_with_no_changes_is_empty() {
    let mut h = Harness::new(MismatchPolicy::Fail);
    h.write_local("a.js", "1");
    h.scheduler.cycle().await.unwrap();
    h.drain_events();

    h.scheduler.cycle().await.unwrap();
    let events = h.drain_events();
    let changes = events
        .iter()
        .find_map(|e| match e {
            BridgeEvent::FileChanges { changes, is_initial } => {
                assert!(!*is_initial);
                Some(changes.clone())
            }
            _ => None,
        })
        .expect("cycle emits a FileChanges event");
    assert!(changes.is_empty());
    assert!(Harness::actions(&events).is_empty());
}

#[tokio::test]
async fn upload_does_not_feed_back_as_download() {
    let mut h = Harness::new(MismatchPolicy::Fail);
    h.write_local("a.js", "1");
    h.scheduler.cycle().await.unwrap();
    assert_eq!(h.sandbox.get("a.js").as_deref(), Some("1"));
    h.drain_events();

    // The pushed file now appears remote-side as an addition relative to
    // the stored (pre-push) remote snapshot. Convergence suppression must
    // keep it from bouncing back as a download.
    h.scheduler.cycle().await.unwrap();
    let events = h.drain_events();
    assert!(Harness::actions(&events).is_empty());
    assert_eq!(h.read_local("a.js").as_deref(), Some("1"));
}

#[tokio::test]
async fn converged_edits_propagate_nothing() {
    let mut h = Harness::new(MismatchPolicy::Fail);
    h.write_local("a.js", "old");
    h.sandbox.set("a.js", "old");
    h.scheduler.cycle().await.unwrap();
    h.drain_events();

    // Both sides independently reach the same content.
    h.write_local("a.js", "X");
    h.sandbox.set("a.js", "X");
    h.scheduler.cycle().await.unwrap();

    let events = h.drain_events();
    assert!(Harness::actions(&events).is_empty());
    let changes = events
        .iter()
        .find_map(|e| match e {
            BridgeEvent::FileChanges { changes, .. } => Some(changes.clone()),
            _ => None,
        })
        .unwrap();
    assert!(changes.is_empty());
}

#[tokio::test]
async fn initial_mismatch_under_fail_applies_nothing() {
    let mut h = Harness::new(MismatchPolicy::Fail);
    h.write_local("a.js", "1");
    h.sandbox.set("a.js", "2");

    let err = h.scheduler.cycle().await.unwrap_err();
    match &err {
        BridgeError::MismatchConflict { files } => assert_eq!(files, &vec!["a.js".to_string()]),
        other => panic!("expected MismatchConflict, got {other:?}"),
    }
    assert!(err.is_fatal());

    // Zero effects on either side.
    assert_eq!(h.read_local("a.js").as_deref(), Some("1"));
    assert_eq!(h.sandbox.get("a.js").as_deref(), Some("2"));
    assert!(Harness::actions(&h.drain_events()).is_empty());
}

#[tokio::test]
async fn initial_mismatch_under_upload_pushes_local_copy() {
    let mut h = Harness::new(MismatchPolicy::Upload);
    h.write_local("a.js", "1");
    h.sandbox.set("a.js", "2");

    h.scheduler.cycle().await.unwrap();

    let actions = Harness::actions(&h.drain_events());
    assert_eq!(actions, vec![("a.js".to_string(), FileAction::Uploaded)]);
    assert_eq!(h.sandbox.get("a.js").as_deref(), Some("1"));
    assert_eq!(h.read_local("a.js").as_deref(), Some("1"));
}

#[tokio::test]
async fn initial_mismatch_under_download_overwrites_local_copy() {
    let mut h = Harness::new(MismatchPolicy::Download);
    h.write_local("a.js", "1");
    h.sandbox.set("a.js", "2");

    h.scheduler.cycle().await.unwrap();

    let actions = Harness::actions(&h.drain_events());
    assert_eq!(actions, vec![("a.js".to_string(), FileAction::Downloaded)]);
    assert_eq!(h.read_local("a.js").as_deref(), Some("2"));
    assert_eq!(h.sandbox.get("a.js").as_deref(), Some("2"));
}

#[tokio::test]
async fn reconnect_runs_a_fresh_initial_cycle() {
    let mut h = Harness::new(MismatchPolicy::Upload);
    h.write_local("a.js", "1");
    h.sandbox.set("a.js", "2");
    h.scheduler.cycle().await.unwrap();
    assert_eq!(h.sandbox.get("a.js").as_deref(), Some("1"));

    // The sandbox diverges again while "disconnected"; on reconnect the
    // scheduler has no history, so mismatch handling must re-run instead
    // of an incremental diff downloading the remote edit.
    h.sandbox.set("a.js", "2");
    h.reconnect(MismatchPolicy::Upload);
    h.scheduler.cycle().await.unwrap();

    let events = h.drain_events();
    let is_initial = events
        .iter()
        .find_map(|e| match e {
            BridgeEvent::FileChanges { is_initial, .. } => Some(*is_initial),
            _ => None,
        })
        .unwrap();
    assert!(is_initial);
    assert_eq!(
        Harness::actions(&events),
        vec![("a.js".to_string(), FileAction::Uploaded)]
    );
    assert_eq!(h.sandbox.get("a.js").as_deref(), Some("1"));
    assert_eq!(h.read_local("a.js").as_deref(), Some("1"));
}

#[tokio::test]
async fn added_then_deleted_round_trip() {
    let mut h = Harness::new(MismatchPolicy::Fail);
    h.scheduler.cycle().await.unwrap();
    h.drain_events();

    h.write_local("b.js", "fresh");
    h.scheduler.cycle().await.unwrap();
    assert_eq!(
        Harness::actions(&h.drain_events()),
        vec![("b.js".to_string(), FileAction::Uploaded)]
    );
    assert_eq!(h.sandbox.get("b.js").as_deref(), Some("fresh"));

    h.delete_local("b.js");
    h.scheduler.cycle().await.unwrap();
    assert_eq!(
        Harness::actions(&h.drain_events()),
        vec![("b.js".to_string(), FileAction::RemoteDeleted)]
    );
    assert_eq!(h.sandbox.get("b.js"), None);

    // No residual entry on either side.
    h.scheduler.cycle().await.unwrap();
    assert!(Harness::actions(&h.drain_events()).is_empty());
}

#[tokio::test]
async fn ignored_files_never_surface_anywhere() {
    let mut h = Harness::new(MismatchPolicy::Fail);
    h.write_local("tmp/scratch.js", "local scratch");
    h.sandbox.set("tmp/cache.js", "remote scratch");
    h.sandbox.set("note.txt", "hello");

    h.scheduler.cycle().await.unwrap();

    let events = h.drain_events();
    for event in &events {
        if let BridgeEvent::FileChanges { changes, .. } = event {
            assert!(changes.iter().all(|c| !c.file.starts_with("tmp/")));
        }
    }
    assert_eq!(
        Harness::actions(&events),
        vec![("note.txt".to_string(), FileAction::Downloaded)]
    );
    // Neither ignored file crossed over.
    assert!(h.read_local("tmp/cache.js").is_none());
    assert_eq!(h.sandbox.get("tmp/scratch.js"), None);
    // Both still exist untouched where they were.
    assert_eq!(h.read_local("tmp/scratch.js").as_deref(), Some("local scratch"));
    assert_eq!(h.sandbox.get("tmp/cache.js").as_deref(), Some("remote scratch"));
}

#[tokio::test]
async fn one_failed_effect_does_not_block_the_batch() {
    let mut h = Harness::new(MismatchPolicy::Fail);
    h.scheduler.cycle().await.unwrap();
    h.drain_events();

    h.sandbox.fail_writes_to("bad.js");
    h.write_local("bad.js", "x");
    h.write_local("good.js", "y");

    h.scheduler.cycle().await.unwrap();

    let events = h.drain_events();
    assert_eq!(
        Harness::actions(&events),
        vec![("good.js".to_string(), FileAction::Uploaded)]
    );
    let errors: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            BridgeEvent::Error(message) => Some(message.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("bad.js"));
    assert_eq!(h.sandbox.get("good.js").as_deref(), Some("y"));
    assert_eq!(h.sandbox.get("bad.js"), None);
}

#[tokio::test]
async fn remote_edit_and_delete_apply_locally() {
    let mut h = Harness::new(MismatchPolicy::Fail);
    h.write_local("a.js", "1");
    h.write_local("b.js", "2");
    h.sandbox.set("a.js", "1");
    h.sandbox.set("b.js", "2");
    h.scheduler.cycle().await.unwrap();
    h.drain_events();

    h.sandbox.set("a.js", "edited");
    h.sandbox.remove("b.js");
    h.scheduler.cycle().await.unwrap();

    let mut actions = Harness::actions(&h.drain_events());
    actions.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        actions,
        vec![
            ("a.js".to_string(), FileAction::Downloaded),
            ("b.js".to_string(), FileAction::LocalDeleted),
        ]
    );
    assert_eq!(h.read_local("a.js").as_deref(), Some("edited"));
    assert!(h.read_local("b.js").is_none());
}
