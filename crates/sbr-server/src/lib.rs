//! WebSocket JSON-RPC transport and bridge wiring for sandbridge.
//!
//! The sandbox connects to us as a WebSocket client and answers JSON-RPC
//! 2.0 requests for file operations. [`PeerServer`] owns that exchange and
//! implements the engine's `RemoteFileService` contract; [`Bridge`] drives
//! the sync scheduler off the connection lifecycle.

pub mod bridge;
pub mod definitions;
pub mod server;

pub use bridge::Bridge;
pub use server::{ControlEvent, PeerServer};
