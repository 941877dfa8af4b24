use dashmap::DashMap;

use super::connection::ConnectionHandle;

/// Tracks which identity is reachable through which live connection.
///
/// At most one handle per identity; the latest registration wins and the
/// previous handle is left open. Thread-safe via DashMap.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    clients: DashMap<String, ConnectionHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
        }
    }

    /// Bind `identity` to `handle`, replacing any earlier binding.
    pub fn register(&self, identity: &str, handle: &ConnectionHandle) {
        handle.bind_identity(identity);
        if let Some(previous) = self.clients.insert(identity.to_string(), handle.clone()) {
            if previous != *handle {
                tracing::debug!(
                    identity = %identity,
                    previous_conn = %previous.id(),
                    conn_id = %handle.id(),
                    "Identity re-registered on a new connection"
                );
            }
        }
    }

    /// Clone out the handle for `identity` so callers can send without
    /// holding a shard lock.
    pub fn lookup(&self, identity: &str) -> Option<ConnectionHandle> {
        self.clients.get(identity).map(|entry| entry.value().clone())
    }

    /// Remove every binding that still points at `handle`.
    ///
    /// Bindings that were superseded by a newer connection are left alone.
    /// Returns the identities actually removed.
    pub fn deregister(&self, handle: &ConnectionHandle) -> Vec<String> {
        handle
            .identities()
            .into_iter()
            .filter(|identity| {
                self.clients
                    .remove_if(identity, |_, current| current == handle)
                    .is_some()
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
