use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

pub type ConnectionId = Uuid;

/// Owns the set of live connections, which is the broadcast membership of
/// the gateway. Cloning is cheap; all clones share the same set.
///
/// Outbound queues are unbounded: a stalled client accumulates frames in
/// its queue without limit and never slows the gateway or other
/// connections.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    connections: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<String>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                connections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Add a connection to the broadcast set. Returns its id and the
    /// receiving end of its outbound queue.
    pub async fn register(&self) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.connections.write().await.insert(conn_id, tx);
        (conn_id, rx)
    }

    /// Remove a connection from the broadcast set.
    pub async fn unregister(&self, conn_id: ConnectionId) {
        self.inner.connections.write().await.remove(&conn_id);
    }

    /// Number of currently open connections.
    pub async fn count(&self) -> usize {
        self.inner.connections.read().await.len()
    }

    /// Send a frame to one connection. A connection that has gone away is
    /// skipped, not an error.
    pub async fn send_to(&self, conn_id: ConnectionId, frame: &str) {
        let connections = self.inner.connections.read().await;
        if let Some(tx) = connections.get(&conn_id) {
            if tx.send(frame.to_owned()).is_err() {
                debug!("connection {} closed before send", conn_id);
            }
        }
    }

    /// Deliver a frame to every open connection. The recipient set is
    /// snapshotted first; a connection that closes mid-broadcast is
    /// skipped without affecting the rest of the batch.
    pub async fn broadcast_all(&self, frame: &str) {
        self.broadcast(None, frame).await;
    }

    /// Deliver a frame to every open connection except `skip`.
    pub async fn broadcast_except(&self, skip: ConnectionId, frame: &str) {
        self.broadcast(Some(skip), frame).await;
    }

    async fn broadcast(&self, skip: Option<ConnectionId>, frame: &str) {
        let recipients: Vec<(ConnectionId, mpsc::UnboundedSender<String>)> = {
            let connections = self.inner.connections.read().await;
            connections
                .iter()
                .filter(|(id, _)| Some(**id) != skip)
                .map(|(id, tx)| (*id, tx.clone()))
                .collect()
        };

        for (conn_id, tx) in recipients {
            if tx.send(frame.to_owned()).is_err() {
                debug!("connection {} closed mid-broadcast, skipping", conn_id);
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
