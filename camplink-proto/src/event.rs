//! Event types exchanged between portal clients and the relay.
//!
//! Every frame is a JSON object of the form `{"event": "<name>", "data": ...}`.
//! [`ClientEvent`] covers what clients emit, [`ServerEvent`] what the relay
//! emits. Payload fields other than the addressing id are not validated:
//! whatever a client sends is carried through as-is.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::room::{ConnectionId, TopicId};

// ---------------------------------------------------------------------------
// Client -> relay
// ---------------------------------------------------------------------------

/// Events a connected client sends to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Join `camp-{id}`.
    JoinCamp(TopicId),
    /// Leave `camp-{id}`.
    LeaveCamp(TopicId),
    /// Chat message for everyone else in a camp room.
    CampMessage(CampMessage),
    /// Join `session-{id}` and announce the arrival.
    JoinSession(TopicId),
    /// Leave `session-{id}` and announce the departure.
    LeaveSession(TopicId),
    /// Forward a control signal to the rest of a session.
    SessionControl(SessionControl),
    /// Announce that the sender started sharing its screen.
    StartScreenShare(TopicId),
    /// Announce that the sender stopped sharing its screen.
    StopScreenShare(TopicId),
    /// Push a notification into a user's room.
    SendNotification(NotificationRequest),
    /// Join `user-{id}` to receive targeted notifications.
    JoinUserRoom(TopicId),
}

impl ClientEvent {
    /// Wire name of the event, for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::JoinCamp(_) => "join-camp",
            Self::LeaveCamp(_) => "leave-camp",
            Self::CampMessage(_) => "camp-message",
            Self::JoinSession(_) => "join-session",
            Self::LeaveSession(_) => "leave-session",
            Self::SessionControl(_) => "session-control",
            Self::StartScreenShare(_) => "start-screen-share",
            Self::StopScreenShare(_) => "stop-screen-share",
            Self::SendNotification(_) => "send-notification",
            Self::JoinUserRoom(_) => "join-user-room",
        }
    }
}

/// Payload of `camp-message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampMessage {
    /// Camp whose room receives the message.
    pub camp_id: TopicId,
    /// Message body, forwarded as `content`.
    #[serde(default)]
    pub message: Value,
    /// Author details as the client reports them. Anything that is not an
    /// object reads as an empty author.
    #[serde(default, deserialize_with = "lenient_user")]
    pub user: CampUser,
}

/// Author of a camp message.
///
/// Every field is kept as raw JSON so a loosely typed author never blocks
/// the message from being relayed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampUser {
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub id: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub first_name: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub last_name: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub role: Value,
}

impl CampUser {
    /// Display name: first and last name joined by a space.
    ///
    /// A missing half is left out rather than rendered as a placeholder.
    /// Non-string parts are rendered as their JSON text.
    #[must_use]
    pub fn display_name(&self) -> String {
        match (name_part(&self.first_name), name_part(&self.last_name)) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(only), None) | (None, Some(only)) => only,
            (None, None) => String::new(),
        }
    }
}

fn name_part(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn lenient_user<'de, D>(deserializer: D) -> Result<CampUser, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Relay -> client
// ---------------------------------------------------------------------------

/// Events the relay sends to connected clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// First frame on every connection: the identifier the relay assigned.
    Connected(ConnectedNotice),
    /// A camp chat message from another member.
    NewMessage(ChatMessage),
    /// Another connection joined the session.
    UserJoined(PresenceNotice),
    /// Another connection left the session.
    UserLeft(PresenceNotice),
    /// A session control signal from another member.
    SessionUpdate(SessionUpdate),
    /// Another member started sharing its screen.
    ScreenShareStarted(ScreenShareNotice),
    /// Another member stopped sharing its screen.
    ScreenShareStopped(ScreenShareNotice),
    /// A notification addressed to this user's room.
    Notification(Value),
}

impl ServerEvent {
    /// Wire name of the event, for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::NewMessage(_) => "new-message",
            Self::UserJoined(_) => "user-joined",
            Self::UserLeft(_) => "user-left",
            Self::SessionUpdate(_) => "session-update",
            Self::ScreenShareStarted(_) => "screen-share-started",
            Self::ScreenShareStopped(_) => "screen-share-stopped",
            Self::Notification(_) => "notification",
        }
    }
}

/// Payload of `connected`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedNotice {
    pub socket_id: ConnectionId,
}

/// Payload of `new-message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Relay-assigned message id.
    pub id: String,
    pub content: Value,
    pub sender: MessageSender,
    /// ISO-8601 time the relay built the message.
    pub timestamp: String,
}

/// Sender block of a [`ChatMessage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSender {
    pub id: Value,
    pub name: String,
    pub role: Value,
}

impl ChatMessage {
    /// Builds the relayed message for a `camp-message`, stamping a fresh id
    /// and the current time.
    #[must_use]
    pub fn from_camp_message(msg: CampMessage) -> Self {
        let name = msg.user.display_name();
        Self {
            id: message_id(),
            content: msg.message,
            sender: MessageSender {
                id: msg.user.id,
                name,
                role: msg.user.role,
            },
            timestamp: timestamp_now(),
        }
    }
}

/// Payload of `user-joined` and `user-left`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceNotice {
    pub socket_id: ConnectionId,
    pub timestamp: String,
}

impl PresenceNotice {
    /// Notice about `socket_id`, stamped now.
    #[must_use]
    pub fn now(socket_id: ConnectionId) -> Self {
        Self {
            socket_id,
            timestamp: timestamp_now(),
        }
    }
}

/// Payload of `session-update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub action: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    pub timestamp: String,
}

impl From<SessionControl> for SessionUpdate {
    fn from(control: SessionControl) -> Self {
        Self {
            action: control.action,
            payload: control.payload,
            timestamp: timestamp_now(),
        }
    }
}

/// Payload of `screen-share-started` and `screen-share-stopped`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenShareNotice {
    /// The sharing connection.
    pub user_id: ConnectionId,
    pub timestamp: String,
}

impl ScreenShareNotice {
    /// Notice about `user_id`, stamped now.
    #[must_use]
    pub fn now(user_id: ConnectionId) -> Self {
        Self {
            user_id,
            timestamp: timestamp_now(),
        }
    }
}

/// Current UTC time as ISO-8601 with millisecond precision
/// (`2026-10-18T12:00:00.000Z`).
#[must_use]
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Fresh message id. Time-ordered and unique across concurrent senders.
#[must_use]
pub fn message_id() -> String {
    Uuid::now_v7().to_string()
}
