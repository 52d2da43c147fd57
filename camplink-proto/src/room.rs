//! Room addressing for the CampLink relay.
//!
//! Every room lives in one of three namespaces and is named
//! `<prefix>-<id>` (`camp-42`, `session-7`, `user-99`). Clients only ever
//! send the bare id; the relay derives the room name, so the same id in the
//! same namespace always resolves to the same room.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier for one live connection to the relay.
///
/// Sent to clients as `socketId` (and `userId` in screen-share notices).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Allocates a fresh connection identifier (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The bare id a client supplies for a camp, session or user.
///
/// Accepts either a JSON string or a JSON number on the wire; numbers keep
/// their JSON text, so `42` and `"42"` address the same room. Integral
/// floats drop the fraction (`42.0` is `42`). Booleans, null, objects and
/// arrays are rejected. Always serialized back as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawTopicId", into = "String")]
pub struct TopicId(String);

impl TopicId {
    /// Wraps an id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TopicId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<TopicId> for String {
    fn from(id: TopicId) -> Self {
        id.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTopicId {
    Text(String),
    Number(serde_json::Number),
}

impl From<RawTopicId> for TopicId {
    fn from(raw: RawTopicId) -> Self {
        match raw {
            RawTopicId::Text(s) => Self(s),
            RawTopicId::Number(n) => Self(number_text(&n)),
        }
    }
}

/// Largest float whose integer value is exact.
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

/// Integral floats render without a fraction, so `42.0` names the same room
/// as `42`.
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn number_text(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if !n.is_i64() && !n.is_u64() && f.fract() == 0.0 && f.abs() < MAX_EXACT_FLOAT => {
            (f as i64).to_string()
        }
        _ => n.to_string(),
    }
}

/// The namespace a room belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Per-camp chat rooms.
    Camp,
    /// Per-session rooms for presence, control and screen-share signals.
    Session,
    /// Per-user rooms for targeted notifications.
    User,
}

impl Namespace {
    /// The room-name prefix for this namespace.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Camp => "camp",
            Self::Session => "session",
            Self::User => "user",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A fully qualified room name: namespace plus id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomName {
    namespace: Namespace,
    id: TopicId,
}

impl RoomName {
    /// Builds the room name for `id` in `namespace`.
    #[must_use]
    pub const fn new(namespace: Namespace, id: TopicId) -> Self {
        Self { namespace, id }
    }

    /// `camp-{id}`
    #[must_use]
    pub fn camp(id: &TopicId) -> Self {
        Self::new(Namespace::Camp, id.clone())
    }

    /// `session-{id}`
    #[must_use]
    pub fn session(id: &TopicId) -> Self {
        Self::new(Namespace::Session, id.clone())
    }

    /// `user-{id}`
    #[must_use]
    pub fn user(id: &TopicId) -> Self {
        Self::new(Namespace::User, id.clone())
    }

    /// The namespace this room belongs to.
    #[must_use]
    pub const fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// The bare id within the namespace.
    #[must_use]
    pub const fn id(&self) -> &TopicId {
        &self.id
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.namespace.prefix(), self.id)
    }
}
