use std::fmt;

use serde::{Deserialize, Serialize};

/// Platform maximum number of messages returned by one page fetch.
pub const MAX_MESSAGE_LIST_LENGTH: u16 = 50;

/// Timeline event type carrying the time a message was sent.
pub const SENT_TIME_EVENT_TYPE: &str = "mitter.mtet.SentTime";

/// Clamp a requested page size against the platform maximum.
///
/// The result is always in `1..=MAX_MESSAGE_LIST_LENGTH`.
pub fn clamp_page_limit(requested: u16) -> u16 {
    requested.max(1).min(MAX_MESSAGE_LIST_LENGTH)
}

/// Timestamped event attached to a message or channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    /// Event type, for example `mitter.mtet.SentTime`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event time in milliseconds since Unix epoch.
    pub event_time_ms: u64,
    /// Identifier of the entity the event is about.
    pub subject: String,
}

/// Timeline event bound to a specific message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageTimelineEvent {
    pub message_id: String,
    pub timeline_event: TimelineEvent,
}

/// Free-form metadata attached to an entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityMetadata {
    #[serde(default)]
    pub metadata: Vec<serde_json::Value>,
}

/// A message as accepted by the send endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message identifier. Absent on messages not yet sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Sender entity identifier.
    pub sender_id: String,
    /// Payload type, for example `mitter.mt.Text`.
    #[serde(rename = "messageType", default = "default_message_type")]
    pub payload_type: String,
    /// Display text.
    pub text_payload: String,
    #[serde(default)]
    pub timeline_events: Vec<TimelineEvent>,
    #[serde(default)]
    pub entity_metadata: EntityMetadata,
}

fn default_message_type() -> String {
    "Standard".to_owned()
}

impl Message {
    /// Build an unsent standard text message.
    pub fn text(sender_id: impl Into<String>, text_payload: impl Into<String>) -> Self {
        Self {
            message_id: None,
            sender_id: sender_id.into(),
            payload_type: default_message_type(),
            text_payload: text_payload.into(),
            timeline_events: Vec::new(),
            entity_metadata: EntityMetadata::default(),
        }
    }
}

/// A fetched message together with the channel it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelReferencingMessage {
    pub channel_id: String,
    pub message_id: String,
    pub sender_id: String,
    #[serde(rename = "messageType", default = "default_message_type")]
    pub payload_type: String,
    pub text_payload: String,
    #[serde(default)]
    pub timeline_events: Vec<TimelineEvent>,
    #[serde(default)]
    pub entity_metadata: EntityMetadata,
}

impl ChannelReferencingMessage {
    /// Send time from the `SentTime` timeline event, or 0 when absent.
    pub fn sent_time_ms(&self) -> u64 {
        self.timeline_events
            .iter()
            .find(|event| event.event_type == SENT_TIME_EVENT_TYPE)
            .map(|event| event.event_time_ms)
            .unwrap_or(0)
    }

    /// Key of this message in the canonical oldest-to-newest order.
    pub fn order_key(&self) -> OrderKey {
        OrderKey {
            sent_time_ms: self.sent_time_ms(),
            message_id: self.message_id.clone(),
        }
    }

    /// Cursor anchored at this message.
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.message_id.clone())
    }
}

/// Canonical ordering key: send time first, identifier as tie-break.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderKey {
    pub sent_time_ms: u64,
    pub message_id: String,
}

/// Opaque pagination token anchored to a message identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self(message_id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Walk direction over a channel history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Towards older messages (`before` cursor, newest-first pages).
    Backward,
    /// Towards newer messages (`after` cursor, oldest-first pages).
    Forward,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Backward => "backward",
            Self::Forward => "forward",
        }
    }
}

/// Parameters of one page fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub channel_id: String,
    pub direction: Direction,
    pub before: Option<Cursor>,
    pub after: Option<Cursor>,
    pub limit: u16,
}

impl PageRequest {
    /// Build a request walking `direction` from `cursor`.
    pub fn new(
        channel_id: impl Into<String>,
        direction: Direction,
        cursor: Option<Cursor>,
        limit: u16,
    ) -> Self {
        let (before, after) = match direction {
            Direction::Backward => (cursor, None),
            Direction::Forward => (None, cursor),
        };
        Self {
            channel_id: channel_id.into(),
            direction,
            before,
            after,
            limit: clamp_page_limit(limit),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

/// Rule sets the platform ships for common channel shapes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StandardRuleSet {
    #[serde(rename = "io.mitter.ruleset.chats.DirectMessage")]
    DirectMessage,
    #[serde(rename = "io.mitter.ruleset.chats.GroupChat")]
    GroupChat,
    #[serde(rename = "io.mitter.ruleset.chats.SystemChannel")]
    SystemChannel,
    #[serde(rename = "io.mitter.ruleset.chats.SingleParticipantChannel")]
    SingleParticipantChannel,
}

impl StandardRuleSet {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DirectMessage => "io.mitter.ruleset.chats.DirectMessage",
            Self::GroupChat => "io.mitter.ruleset.chats.GroupChat",
            Self::SystemChannel => "io.mitter.ruleset.chats.SystemChannel",
            Self::SingleParticipantChannel => "io.mitter.ruleset.chats.SingleParticipantChannel",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ParticipationStatus {
    #[default]
    Active,
    ReadOnly,
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelParticipation {
    pub participant_id: String,
    #[serde(default)]
    pub participation_status: ParticipationStatus,
    pub channel_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EntityProfileAttribute {
    pub key: String,
    pub content_type: String,
    pub content_encoding: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EntityIdentifier {
    pub identifier: String,
}

/// Key/value profile attached to a channel or user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EntityProfile {
    pub entity_id: EntityIdentifier,
    #[serde(default)]
    pub attributes: Vec<EntityProfileAttribute>,
}

impl EntityProfile {
    /// Value of the first attribute with `key`.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.key == key)
            .map(|attr| attr.value.as_str())
    }
}

/// Channel aggregate as returned by the channels endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    #[serde(default)]
    pub channel_id: Option<String>,
    pub default_rule_set: String,
    #[serde(default)]
    pub participation: Vec<ChannelParticipation>,
    pub entity_profile: EntityProfile,
    #[serde(default)]
    pub timeline_events: Vec<TimelineEvent>,
    #[serde(default)]
    pub system_channel: bool,
    #[serde(default)]
    pub entity_metadata: EntityMetadata,
}
