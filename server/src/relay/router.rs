//! Direct and group fan-out.
//!
//! Every routed message is appended to its log exactly once, then sent to
//! each resolved recipient whose connection is registered and open.
//! Handles are cloned out of the registry before sending, so no registry
//! shard lock is held while frames are queued.

use std::collections::HashSet;

use serde_json::Value;

use crate::relay::store::{ChannelStore, DirectMessage, GroupMessage};
use crate::ws::protocol::OutboundFrame;
use crate::ws::{ConnectionRegistry, SendError};

/// Separator between the two identities of a direct channel id.
pub const CHANNEL_DELIMITER: char = '_';

/// A direct message to route.
#[derive(Debug, Clone)]
pub struct DirectRequest {
    pub channel_id: String,
    pub sender_id: String,
    pub content: Value,
}

/// A group message to route. Membership is trusted from the sender.
#[derive(Debug, Clone, Default)]
pub struct GroupRequest {
    pub group_id: String,
    pub sender_id: String,
    pub content: Value,
    pub group_members: Vec<String>,
    pub is_file: bool,
    pub file_type: Option<String>,
    pub file_name: Option<String>,
    pub sender_name: Option<String>,
}

/// Outcome of one fan-out, for logging and tests. Never reported to clients.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Recipients whose connection accepted the frame.
    pub delivered: Vec<String>,
    /// Recipients that were absent, closed, or backed up.
    pub skipped: Vec<String>,
}

impl Delivery {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.skipped.len()
    }
}

/// Owns the connection registry and channel logs for one server process.
#[derive(Debug)]
pub struct RelayService {
    pub registry: ConnectionRegistry,
    pub store: ChannelStore,
}

impl RelayService {
    pub fn new(max_messages_per_channel: usize) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            store: ChannelStore::new(max_messages_per_channel),
        }
    }

    /// Route a direct message to every identity named in its channel id.
    ///
    /// The sender only sees its own message if it appears in the channel id.
    pub fn route_direct(&self, req: DirectRequest) -> Delivery {
        let recipients = direct_recipients(&req.channel_id);

        let chat_message = DirectMessage {
            user_id: req.sender_id,
            content: req.content,
            timestamp: now_millis(),
        };
        self.store
            .append_direct(&req.channel_id, chat_message.clone());

        let frame = OutboundFrame::Message {
            channel_id: req.channel_id.clone(),
            chat_message,
        };
        let delivery = self.fan_out(&frame, recipients);

        tracing::info!(
            channel_id = %req.channel_id,
            delivered = delivery.delivered.len(),
            attempted = delivery.attempted(),
            "Direct message routed"
        );
        delivery
    }

    /// Route a group message to the declared members plus the sender.
    pub fn route_group(&self, req: GroupRequest) -> Delivery {
        let members = group_recipients(&req.group_members, &req.sender_id);
        let timestamp = now_millis();

        self.store.append_group(
            &req.group_id,
            GroupMessage {
                sender_id: req.sender_id.clone(),
                content: req.content.clone(),
                timestamp,
                is_file: req.is_file,
                file_type: req.file_type.clone(),
                file_name: req.file_name.clone(),
            },
        );

        tracing::debug!(group_id = %req.group_id, members = ?members, "Group members resolved");

        let frame = OutboundFrame::GroupMessage {
            group_id: req.group_id.clone(),
            sender_id: req.sender_id,
            content: req.content,
            timestamp,
            is_file: req.is_file,
            file_type: req.file_type,
            file_name: req.file_name,
            sender_name: req.sender_name,
        };
        let delivery = self.fan_out(&frame, members);

        tracing::info!(
            group_id = %req.group_id,
            delivered = delivery.delivered.len(),
            attempted = delivery.attempted(),
            "Group message routed"
        );
        delivery
    }

    fn fan_out(&self, frame: &OutboundFrame, recipients: Vec<String>) -> Delivery {
        let mut delivery = Delivery::default();

        let text = match serde_json::to_string(frame) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode outbound frame");
                delivery.skipped = recipients;
                return delivery;
            }
        };

        for identity in recipients {
            let Some(handle) = self.registry.lookup(&identity) else {
                tracing::debug!(identity = %identity, "Recipient not connected");
                delivery.skipped.push(identity);
                continue;
            };
            if !handle.is_open() {
                tracing::debug!(identity = %identity, conn_id = %handle.id(), "Recipient connection closed");
                delivery.skipped.push(identity);
                continue;
            }
            match handle.send_text(text.clone()) {
                Ok(()) => delivery.delivered.push(identity),
                Err(SendError::QueueFull) => {
                    tracing::warn!(
                        identity = %identity,
                        conn_id = %handle.id(),
                        "Outbound queue full, dropping frame"
                    );
                    delivery.skipped.push(identity);
                }
                Err(SendError::Closed) => {
                    tracing::debug!(identity = %identity, conn_id = %handle.id(), "Recipient closed during send");
                    delivery.skipped.push(identity);
                }
            }
        }

        delivery
    }
}

/// Identities named by a direct channel id, deduplicated in order.
pub fn direct_recipients(channel_id: &str) -> Vec<String> {
    dedup(channel_id.split(CHANNEL_DELIMITER).map(str::to_string))
}

/// Declared members plus the sender, deduplicated in order.
pub fn group_recipients(members: &[String], sender_id: &str) -> Vec<String> {
    dedup(
        members
            .iter()
            .cloned()
            .chain(std::iter::once(sender_id.to_string())),
    )
}

fn dedup(ids: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
