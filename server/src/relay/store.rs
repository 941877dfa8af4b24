//! In-memory channel logs for direct and group conversations.
//!
//! Logs are append-only from the router's point of view. Retention is
//! bounded two ways: a per-channel message cap (oldest dropped on overflow)
//! and an age cutoff applied by the background purge task.

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;

/// One entry in a direct channel log. Also the `chatMessage` payload of an
/// outbound `message` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessage {
    pub user_id: String,
    /// Relayed verbatim; any JSON value.
    pub content: Value,
    pub timestamp: i64,
}

/// One entry in a group log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMessage {
    pub sender_id: String,
    pub content: Value,
    pub timestamp: i64,
    pub is_file: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

trait Stamped {
    fn timestamp(&self) -> i64;
}

impl Stamped for DirectMessage {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

impl Stamped for GroupMessage {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

#[derive(Debug)]
struct Logs<T> {
    channels: DashMap<String, VecDeque<T>>,
}

impl<T: Stamped + Clone> Logs<T> {
    fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    fn append(&self, key: &str, message: T, cap: usize) {
        let mut log = self.channels.entry(key.to_string()).or_default();
        log.push_back(message);
        if cap > 0 {
            while log.len() > cap {
                log.pop_front();
            }
        }
    }

    fn history(&self, key: &str) -> Vec<T> {
        self.channels
            .get(key)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn purge_older_than(&self, cutoff_millis: i64) -> usize {
        let mut removed = 0;
        self.channels.retain(|_, log| {
            let before = log.len();
            log.retain(|m| m.timestamp() >= cutoff_millis);
            removed += before - log.len();
            !log.is_empty()
        });
        removed
    }

    fn len(&self) -> usize {
        self.channels.len()
    }
}

/// Direct and group channel logs.
#[derive(Debug)]
pub struct ChannelStore {
    direct: Logs<DirectMessage>,
    group: Logs<GroupMessage>,
    /// 0 means unlimited.
    max_messages_per_channel: usize,
}

impl ChannelStore {
    pub fn new(max_messages_per_channel: usize) -> Self {
        Self {
            direct: Logs::new(),
            group: Logs::new(),
            max_messages_per_channel,
        }
    }

    pub fn append_direct(&self, channel_id: &str, message: DirectMessage) {
        self.direct
            .append(channel_id, message, self.max_messages_per_channel);
    }

    pub fn append_group(&self, group_id: &str, message: GroupMessage) {
        self.group
            .append(group_id, message, self.max_messages_per_channel);
    }

    /// Retained messages of a direct channel, oldest first.
    pub fn direct_history(&self, channel_id: &str) -> Vec<DirectMessage> {
        self.direct.history(channel_id)
    }

    /// Retained messages of a group, oldest first.
    pub fn group_history(&self, group_id: &str) -> Vec<GroupMessage> {
        self.group.history(group_id)
    }

    /// Drop messages stamped before `cutoff_millis`, and any channel left
    /// empty. Returns the number of messages removed.
    pub fn purge_older_than(&self, cutoff_millis: i64) -> usize {
        self.direct.purge_older_than(cutoff_millis) + self.group.purge_older_than(cutoff_millis)
    }

    pub fn direct_channel_count(&self) -> usize {
        self.direct.len()
    }

    pub fn group_channel_count(&self) -> usize {
        self.group.len()
    }
}
