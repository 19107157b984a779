//! Error types for the sync engine and the peer transport.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the sync engine and the peer transport.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// An RPC was attempted while no sandbox peer is connected.
    #[error("not connected to a sandbox peer")]
    TransportUnavailable,

    /// The peer returned an explicit error for a request.
    #[error("sandbox rejected request: {message}")]
    RemoteRejected { message: String },

    /// Filesystem read/write/delete failure.
    #[error("I/O error on {path}: {source}")]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The initial reconciliation under the `fail` policy found files that
    /// differ between the local directory and the sandbox.
    #[error("{}", mismatch_message(.files))]
    MismatchConflict { files: Vec<String> },

    /// A second sandbox connected while one is already active.
    #[error("a sandbox peer is already connected; multiple connections are not possible")]
    AlreadyConnected,

    /// The listener could not be bound.
    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be read, parsed, or written.
    #[error("configuration error: {0}")]
    Config(String),
}

impl BridgeError {
    /// Whether this error must terminate the run rather than the cycle.
    ///
    /// `MismatchConflict` represents a policy decision the engine cannot
    /// make on its own; `AlreadyConnected` is a protocol violation.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::MismatchConflict { .. } | BridgeError::AlreadyConnected
        )
    }
}

fn mismatch_message(files: &[String]) -> String {
    let mut msg = String::from(
        "on_mismatch is set to 'fail' and the following files differ between \
         the local directory and the sandbox:\n",
    );
    for file in files {
        msg.push_str("  ");
        msg.push_str(file);
        msg.push('\n');
    }
    msg.push_str(
        "To continue, either:\n\
           1. delete one copy of each file and let sandbridge transfer the other automatically\n\
           2. set on_mismatch to 'upload' to overwrite the sandbox copies\n\
           3. set on_mismatch to 'download' to overwrite the local copies",
    );
    msg
}
