//! Conversation identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString};
use uuid::Uuid;

/// The kind of chat context a conversation represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConversationKind {
    /// Spatial chat heard around the local avatar.
    Local,
    /// Two-party instant messages.
    DirectMessage,
    /// Group chat sessions.
    Group,
    /// Messages sent by in-world objects.
    ObjectMessage,
    /// Grid/system notices.
    System,
}

/// Identity of a conversation: its kind together with the key for that kind.
///
/// Direct messages are keyed by the peer's agent id and groups by the group
/// key. Local, object and system conversations are singletons, so their key is
/// implied by the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum ConversationKey {
    Local,
    DirectMessage(Uuid),
    Group(Uuid),
    ObjectMessage,
    System,
}

impl ConversationKey {
    pub fn kind(&self) -> ConversationKind {
        match self {
            Self::Local => ConversationKind::Local,
            Self::DirectMessage(_) => ConversationKind::DirectMessage,
            Self::Group(_) => ConversationKind::Group,
            Self::ObjectMessage => ConversationKind::ObjectMessage,
            Self::System => ConversationKind::System,
        }
    }

    /// Group key for group conversations.
    pub fn group_id(&self) -> Option<Uuid> {
        match self {
            Self::Group(id) => Some(*id),
            _ => None,
        }
    }

    /// Peer agent id for direct-message conversations.
    pub fn peer_id(&self) -> Option<Uuid> {
        match self {
            Self::DirectMessage(id) => Some(*id),
            _ => None,
        }
    }

    /// Whether the local user can send into this conversation.
    pub fn accepts_outbound(&self) -> bool {
        matches!(self, Self::Local | Self::DirectMessage(_) | Self::Group(_))
    }

    /// Default display name used until something better is known.
    pub fn default_display_name(&self) -> &'static str {
        match self {
            Self::Local => "Local Chat",
            Self::DirectMessage(_) => "Direct Message",
            Self::Group(_) => "Group Chat",
            Self::ObjectMessage => "Object Messages",
            Self::System => "System",
        }
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirectMessage(id) | Self::Group(id) => write!(f, "{}:{}", self.kind(), id),
            _ => write!(f, "{}", self.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_key_kind_and_display() {
        let id = Uuid::new_v4();
        let key = ConversationKey::Group(id);
        assert_eq!(key.kind(), ConversationKind::Group);
        assert_eq!(key.group_id(), Some(id));
        assert_eq!(key.to_string(), format!("group:{}", id));
        assert_eq!(ConversationKey::Local.to_string(), "local");
    }

    #[test]
    fn test_kind_parses_from_snake_case() {
        assert_eq!(
            ConversationKind::from_str("direct_message").unwrap(),
            ConversationKind::DirectMessage
        );
        assert!(ConversationKind::from_str("guild").is_err());
    }

    #[test]
    fn test_only_chat_contexts_accept_outbound() {
        assert!(ConversationKey::Local.accepts_outbound());
        assert!(ConversationKey::DirectMessage(Uuid::new_v4()).accepts_outbound());
        assert!(!ConversationKey::ObjectMessage.accepts_outbound());
        assert!(!ConversationKey::System.accepts_outbound());
    }
}
