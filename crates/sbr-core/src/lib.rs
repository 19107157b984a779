//! Core synchronization engine for sandbridge.
//!
//! Keeps a local directory tree and the file set of a sandboxed peer
//! bidirectionally consistent. Both sides are snapshotted on a fixed
//! cadence, each snapshot is diffed against the previous cycle, and the
//! resulting changes are reconciled into uploads, downloads, and deletes.
//!
//! The engine never talks to the transport directly; it sees the peer only
//! through the [`RemoteFileService`] trait, which the server crate
//! implements over WebSocket JSON-RPC and tests implement in memory.

pub mod config;
pub mod diff;
pub mod error;
pub mod events;
pub mod logging;
pub mod reconcile;
pub mod scheduler;
pub mod service;
pub mod snapshot;

pub use config::{BridgeConfig, MismatchPolicy, CONFIG_FILE};
pub use diff::{Change, ChangeKind, ChangeSource};
pub use error::BridgeError;
pub use events::{BridgeEvent, EventSender, FileAction};
pub use scheduler::SyncScheduler;
pub use service::{RemoteFile, RemoteFileService};
pub use snapshot::{Snapshot, SyncFilter};
