use std::sync::Arc;

use crate::config::ConnectionsConfig;
use crate::relay::RelayService;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Connection registry and channel logs
    pub relay: Arc<RelayService>,
    /// Per-connection queue and keepalive settings
    pub connections: ConnectionsConfig,
}

impl AppState {
    pub fn new(relay: Arc<RelayService>, connections: ConnectionsConfig) -> Self {
        Self { relay, connections }
    }
}
