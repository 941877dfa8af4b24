//! Read-only snapshot of registry and channel log sizes.

use serde::Serialize;

use crate::relay::RelayService;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub connected_clients: usize,
    pub direct_channels: usize,
    pub group_channels: usize,
}

pub fn snapshot(relay: &RelayService) -> HealthSnapshot {
    HealthSnapshot {
        status: "healthy",
        connected_clients: relay.registry.len(),
        direct_channels: relay.store.direct_channel_count(),
        group_channels: relay.store.group_channel_count(),
    }
}
