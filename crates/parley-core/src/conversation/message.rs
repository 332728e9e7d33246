//! Conversation message types.

use super::key::ConversationKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of a message.
///
/// Mirrors [`ConversationKind`], with `System` doubling as the sub-kind for
/// engine-authored notices appended to any conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Local,
    DirectMessage,
    Group,
    ObjectMessage,
    System,
}

impl From<ConversationKind> for MessageKind {
    fn from(kind: ConversationKind) -> Self {
        match kind {
            ConversationKind::Local => Self::Local,
            ConversationKind::DirectMessage => Self::DirectMessage,
            ConversationKind::Group => Self::Group,
            ConversationKind::ObjectMessage => Self::ObjectMessage,
            ConversationKind::System => Self::System,
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Agent (or object) id of the sender.
    pub sender_id: Uuid,
    /// Display name of the sender at receipt time.
    pub sender_name: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub kind: MessageKind,
    /// True when the local user authored the message.
    pub from_self: bool,
    /// Group key for group messages.
    #[serde(default)]
    pub group_id: Option<Uuid>,
}

impl Message {
    /// Builds an engine-authored notice.
    pub fn system_notice(body: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            sender_id: Uuid::nil(),
            sender_name: String::new(),
            body: body.into(),
            timestamp,
            kind: MessageKind::System,
            from_self: false,
            group_id: None,
        }
    }

    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            sender_id: self.sender_id,
            body: self.body.clone(),
            kind: self.kind,
            timestamp: self.timestamp,
        }
    }

    /// Compares against a dedup key without allocating.
    pub fn matches_dedup_key(&self, key: &DedupKey) -> bool {
        self.sender_id == key.sender_id
            && self.kind == key.kind
            && self.timestamp == key.timestamp
            && self.body == key.body
    }
}

/// The identity used to detect duplicate deliveries.
///
/// Two messages are duplicates only if all four fields match exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub sender_id: Uuid,
    pub body: String,
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
}
