//! JSON text-frame protocol.
//!
//! Inbound frames carry a `type` discriminator (`init`, `message`,
//! `group_message`); anything else is logged and ignored. Decode failures are
//! logged and never answered or escalated to closing the socket.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::relay::store::DirectMessage;
use crate::relay::{DirectRequest, GroupRequest, RelayService};
use crate::ws::ConnectionHandle;

/// Why an inbound frame could not be turned into an operation.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame could not be decoded: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("frame is missing required field `{0}`")]
    MissingField(&'static str),
}

/// Wire shape of every inbound frame before validation.
///
/// Payload fields are kept as raw JSON so a frame with an odd `content`,
/// `groupMembers` or `isFile` still routes instead of being rejected whole.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFrame {
    #[serde(rename = "type")]
    kind: Option<String>,
    user_id: Option<String>,
    sender_id: Option<String>,
    channel_id: Option<String>,
    #[serde(default)]
    content: Value,
    group_id: Option<String>,
    group_members: Option<Value>,
    is_file: Option<Value>,
    file_type: Option<String>,
    file_name: Option<String>,
    sender_name: Option<String>,
}

impl RawFrame {
    /// `senderId` takes precedence; an empty value falls back to `userId`.
    fn identity(&self) -> Option<String> {
        [&self.sender_id, &self.user_id]
            .into_iter()
            .flatten()
            .find(|id| !id.is_empty())
            .cloned()
    }

    /// String entries of `groupMembers`; anything else is skipped.
    fn members(&self) -> Vec<String> {
        let entries = match &self.group_members {
            None | Some(Value::Null) => return Vec::new(),
            Some(Value::Array(entries)) => entries,
            Some(other) => {
                tracing::warn!(group_members = %other, "groupMembers is not an array, ignoring");
                return Vec::new();
            }
        };
        entries
            .iter()
            .filter_map(|entry| match entry {
                Value::String(id) => Some(id.clone()),
                other => {
                    tracing::debug!(member = %other, "Skipping non-string group member");
                    None
                }
            })
            .collect()
    }

    /// Only a JSON `true` marks a file.
    fn is_file(&self) -> bool {
        matches!(self.is_file, Some(Value::Bool(true)))
    }
}

/// A validated inbound frame.
#[derive(Debug)]
pub enum InboundFrame {
    Init { identity: String },
    Direct(DirectRequest),
    Group(GroupRequest),
    Unknown(Option<String>),
}

/// Frames the server pushes to clients.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    #[serde(rename_all = "camelCase")]
    Message {
        channel_id: String,
        chat_message: DirectMessage,
    },
    #[serde(rename_all = "camelCase")]
    GroupMessage {
        group_id: String,
        sender_id: String,
        content: Value,
        timestamp: i64,
        is_file: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        file_type: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        file_name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        sender_name: Option<String>,
    },
}

/// Parse and validate one text frame.
pub fn decode_frame(text: &str) -> Result<InboundFrame, FrameError> {
    let raw: RawFrame = serde_json::from_str(text)?;

    match raw.kind.as_deref() {
        Some("init") => {
            let identity = raw.identity().ok_or(FrameError::MissingField("userId"))?;
            Ok(InboundFrame::Init { identity })
        }
        Some("message") => {
            let sender_id = raw.identity().ok_or(FrameError::MissingField("senderId"))?;
            let channel_id = raw.channel_id.ok_or(FrameError::MissingField("channelId"))?;
            Ok(InboundFrame::Direct(DirectRequest {
                channel_id,
                sender_id,
                content: raw.content,
            }))
        }
        Some("group_message") => {
            let sender_id = raw.identity().ok_or(FrameError::MissingField("senderId"))?;
            let group_members = raw.members();
            let is_file = raw.is_file();
            let group_id = raw.group_id.ok_or(FrameError::MissingField("groupId"))?;
            Ok(InboundFrame::Group(GroupRequest {
                group_id,
                sender_id,
                content: raw.content,
                group_members,
                is_file,
                file_type: raw.file_type,
                file_name: raw.file_name,
                sender_name: raw.sender_name,
            }))
        }
        _ => Ok(InboundFrame::Unknown(raw.kind.clone())),
    }
}

/// Handle an incoming text frame from `handle`.
pub fn handle_text_message(text: &str, handle: &ConnectionHandle, relay: &RelayService) {
    let frame = match decode_frame(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(
                conn_id = %handle.id(),
                error = %e,
                "Failed to process inbound frame"
            );
            return;
        }
    };

    match frame {
        InboundFrame::Init { identity } => {
            relay.registry.register(&identity, handle);
            tracing::info!(
                identity = %identity,
                conn_id = %handle.id(),
                total_clients = relay.registry.len(),
                "User connected"
            );
        }
        InboundFrame::Direct(req) => {
            relay.route_direct(req);
        }
        InboundFrame::Group(req) => {
            relay.route_group(req);
        }
        InboundFrame::Unknown(kind) => {
            tracing::warn!(
                conn_id = %handle.id(),
                kind = ?kind,
                "Unknown message type"
            );
        }
    }
}
