//! Background retention cleanup for channel logs.
//!
//! Spawns a tokio task that periodically drops messages older than the
//! configured maximum age, and removes channels left empty.

use std::sync::Arc;
use std::time::Duration;

use crate::relay::RelayService;

/// Run one purge pass against `relay`, removing messages older than
/// `max_age_secs` relative to `now_millis`. Returns the number removed.
pub fn purge_expired(relay: &RelayService, max_age_secs: u64, now_millis: i64) -> usize {
    let max_age_millis = i64::try_from(max_age_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
    relay
        .store
        .purge_older_than(now_millis.saturating_sub(max_age_millis))
}

/// Spawn the periodic purge. A `max_age_secs` of 0 disables expiry and no
/// task is started.
pub fn spawn_retention_cleanup(relay: Arc<RelayService>, max_age_secs: u64, interval_secs: u64) {
    if max_age_secs == 0 {
        tracing::info!("Channel log expiry disabled");
        return;
    }
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;

            let count = purge_expired(&relay, max_age_secs, chrono::Utc::now().timestamp_millis());
            if count > 0 {
                tracing::info!("Channel retention cleanup: purged {} expired messages", count);
            } else {
                tracing::debug!("Channel retention cleanup: no expired messages");
            }
        }
    });
}
