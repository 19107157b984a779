//! Remote file service contract exposed by the sandbox peer.
//!
//! The sync engine depends only on this trait; the server crate implements
//! it over WebSocket JSON-RPC and tests implement it in memory.

use crate::error::BridgeError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single remote file with its full text content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub filename: String,
    pub content: String,
}

/// File operations the sandbox peer answers over its request/response
/// channel.
///
/// Every method can fail with [`BridgeError::TransportUnavailable`] (no
/// active peer connection) or [`BridgeError::RemoteRejected`] (the peer
/// returned an explicit error for the request).
#[async_trait]
pub trait RemoteFileService: Send + Sync {
    /// List the filenames present in `container`.
    async fn list_files(&self, container: &str) -> Result<Vec<String>, BridgeError>;

    /// Read the full text content of one remote file.
    async fn read_file(&self, container: &str, filename: &str) -> Result<String, BridgeError>;

    /// Create or overwrite one remote file.
    async fn write_file(
        &self,
        container: &str,
        filename: &str,
        content: &str,
    ) -> Result<(), BridgeError>;

    /// Delete one remote file.
    async fn delete_file(&self, container: &str, filename: &str) -> Result<(), BridgeError>;

    /// Fetch every file in `container` with its content in one exchange.
    async fn list_all_files(&self, container: &str) -> Result<Vec<RemoteFile>, BridgeError>;

    /// Fetch the sandbox's type-definition artifact.
    async fn fetch_definitions(&self) -> Result<String, BridgeError>;
}
