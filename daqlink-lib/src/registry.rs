use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::error::DaqError;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Identifies a shared connection: (device command address, local command address).
pub type ConnectionKey = (SocketAddr, SocketAddr);

/// Hands out shared connections so that several drivers addressing the same
/// chassis reuse one set of sockets.
///
/// Entries are held weakly: a connection lives as long as some caller holds it,
/// and closed or dropped entries are reopened on the next `acquire`.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnectionKey, Weak<Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the live connection for `config`'s key, opening one if needed.
    ///
    /// Fails with [`DaqError::ConfigMismatch`] when a live connection exists for the
    /// same key but was opened with different settings.
    pub async fn acquire(&self, config: ConnectionConfig) -> Result<Arc<Connection>, DaqError> {
        let key = connection_key(&config);
        let mut connections = self.connections.lock().await;

        if let Some(existing) = connections.get(&key).and_then(Weak::upgrade) {
            if !existing.is_closed() {
                if *existing.config() == config {
                    debug!(device = %key.0, local = %key.1, "Reusing shared connection");
                    return Ok(existing);
                }
                warn!(
                    device = %key.0,
                    local = %key.1,
                    "Connection already open with a different configuration"
                );
                return Err(DaqError::ConfigMismatch {
                    device: key.0,
                    local: key.1,
                });
            }
        }

        let connection = Arc::new(Connection::open(config).await?);
        connections.insert(key, Arc::downgrade(&connection));
        info!(device = %key.0, local = %key.1, "Registered connection");
        Ok(connection)
    }

    /// Forget the entry for `key`. Existing holders keep their connection.
    pub async fn release(&self, key: &ConnectionKey) -> bool {
        self.connections.lock().await.remove(key).is_some()
    }

    /// Number of open connections still referenced by a caller.
    pub async fn len(&self) -> usize {
        let mut connections = self.connections.lock().await;
        connections.retain(|_, weak| weak.upgrade().is_some_and(|c| !c.is_closed()));
        connections.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Registry key for `config`.
pub fn connection_key(config: &ConnectionConfig) -> ConnectionKey {
    (config.device_addr, config.command_bind_addr())
}
