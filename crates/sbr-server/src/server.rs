//! WebSocket JSON-RPC server for the sandbox peer.
//!
//! The bridge is the listening side: the sandbox connects to
//! `ws://127.0.0.1:<port>` as a WebSocket client and answers JSON-RPC 2.0
//! requests. Exactly one peer may be connected at a time; a second
//! connection attempt is a protocol violation and is reported as a fatal
//! control event rather than queued.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use sandbridge_core::{BridgeError, RemoteFile, RemoteFileService};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Connection lifecycle notifications consumed by the bridge run loop.
#[derive(Debug)]
pub enum ControlEvent {
    Connected,
    Disconnected,
    /// An error that must terminate the run (e.g. a second peer
    /// connection, or a mismatch conflict surfaced by the sync loop).
    Fatal(BridgeError),
}

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type PendingMap = HashMap<u64, oneshot::Sender<Result<Value, BridgeError>>>;

struct Inner {
    next_id: AtomicU64,
    conn: Mutex<Option<WsSink>>,
    pending: StdMutex<PendingMap>,
    control_tx: mpsc::Sender<ControlEvent>,
}

/// The listening endpoint for the sandbox peer.
///
/// Cheap to clone; all clones share the same connection slot and pending
/// request map.
#[derive(Clone)]
pub struct PeerServer {
    inner: Arc<Inner>,
    local_addr: SocketAddr,
}

impl PeerServer {
    /// Bind the listener and start accepting peer connections until
    /// `cancel` fires. Lifecycle transitions are reported on `control_tx`.
    pub async fn bind(
        port: u16,
        control_tx: mpsc::Sender<ControlEvent>,
        cancel: CancellationToken,
    ) -> Result<Self, BridgeError> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|source| BridgeError::Bind { port, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| BridgeError::Bind { port, source })?;

        info!("listening for sandbox peer on ws://{local_addr}");

        let inner = Arc::new(Inner {
            next_id: AtomicU64::new(0),
            conn: Mutex::new(None),
            pending: StdMutex::new(HashMap::new()),
            control_tx,
        });

        tokio::spawn(accept_loop(listener, Arc::clone(&inner), cancel));

        Ok(Self { inner, local_addr })
    }

    /// The bound address (useful when binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Issue one JSON-RPC request and await the correlated response.
    async fn call(&self, method: &str, params: Value) -> Result<Value, BridgeError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().unwrap().insert(id, tx);

        {
            let mut conn = self.inner.conn.lock().await;
            let Some(sink) = conn.as_mut() else {
                self.inner.pending.lock().unwrap().remove(&id);
                return Err(BridgeError::TransportUnavailable);
            };
            if let Err(e) = sink.send(Message::Text(request.to_string())).await {
                self.inner.pending.lock().unwrap().remove(&id);
                warn!("failed to send request to peer: {e}");
                return Err(BridgeError::TransportUnavailable);
            }
        }

        // A dropped sender means the peer disconnected with the request
        // still in flight.
        rx.await.map_err(|_| BridgeError::TransportUnavailable)?
    }

    async fn call_as<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, BridgeError> {
        let result = self.call(method, params).await?;
        serde_json::from_value(result).map_err(|e| BridgeError::RemoteRejected {
            message: format!("unexpected response shape for {method}: {e}"),
        })
    }
}

async fn accept_loop(listener: TcpListener, inner: Arc<Inner>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("peer accept loop cancelled");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let inner = Arc::clone(&inner);
                    tokio::spawn(async move {
                        handle_peer(stream, addr, inner).await;
                    });
                }
                Err(e) => {
                    error!("accept error: {e}");
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                }
            }
        }
    }
}

async fn handle_peer(stream: TcpStream, addr: SocketAddr, inner: Arc<Inner>) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed from {addr}: {e}");
            return;
        }
    };

    {
        let mut conn = inner.conn.lock().await;
        if conn.is_some() {
            warn!("rejecting second sandbox connection from {addr}");
            let _ = inner
                .control_tx
                .send(ControlEvent::Fatal(BridgeError::AlreadyConnected))
                .await;
            return;
        }
        let (sink, stream) = ws.split();
        *conn = Some(sink);
        tokio::spawn(read_loop(stream, Arc::clone(&inner)));
    }

    info!("sandbox peer connected from {addr}");
    let _ = inner.control_tx.send(ControlEvent::Connected).await;
}

async fn read_loop(mut stream: SplitStream<WebSocketStream<TcpStream>>, inner: Arc<Inner>) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => route_response(&inner, &text),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("peer socket error: {e}");
                break;
            }
        }
    }
    drop_connection(&inner).await;
}

/// Clear the connection slot, fail every in-flight request, and notify the
/// bridge. Stored snapshot history is the scheduler's to discard; from the
/// transport's perspective a disconnect simply invalidates all pending
/// exchanges.
async fn drop_connection(inner: &Arc<Inner>) {
    *inner.conn.lock().await = None;
    inner.pending.lock().unwrap().clear();
    info!("sandbox peer disconnected");
    let _ = inner.control_tx.send(ControlEvent::Disconnected).await;
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    id: u64,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    message: String,
}

fn route_response(inner: &Arc<Inner>, text: &str) {
    let response: RpcResponse = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!("malformed message from peer: {e}");
            return;
        }
    };

    let Some(tx) = inner.pending.lock().unwrap().remove(&response.id) else {
        debug!("response for unknown request id {}", response.id);
        return;
    };

    let result = match response.error {
        Some(err) => Err(BridgeError::RemoteRejected {
            message: err.message,
        }),
        None => Ok(response.result.unwrap_or(Value::Null)),
    };
    let _ = tx.send(result);
}

#[async_trait]
impl RemoteFileService for PeerServer {
    async fn list_files(&self, container: &str) -> Result<Vec<String>, BridgeError> {
        self.call_as("getFileNames", json!({ "server": container }))
            .await
    }

    async fn read_file(&self, container: &str, filename: &str) -> Result<String, BridgeError> {
        self.call_as("getFile", json!({ "server": container, "filename": filename }))
            .await
    }

    async fn write_file(
        &self,
        container: &str,
        filename: &str,
        content: &str,
    ) -> Result<(), BridgeError> {
        self.call(
            "pushFile",
            json!({ "server": container, "filename": filename, "content": content }),
        )
        .await?;
        Ok(())
    }

    async fn delete_file(&self, container: &str, filename: &str) -> Result<(), BridgeError> {
        self.call("deleteFile", json!({ "server": container, "filename": filename }))
            .await?;
        Ok(())
    }

    async fn list_all_files(&self, container: &str) -> Result<Vec<RemoteFile>, BridgeError> {
        self.call_as("getAllFiles", json!({ "server": container }))
            .await
    }

    async fn fetch_definitions(&self) -> Result<String, BridgeError> {
        self.call_as("getDefinitionFile", json!({})).await
    }
}
