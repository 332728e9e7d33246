//! Classified inbound events.
//!
//! These are what the router consumes once a [`RawEvent`](super::RawEvent)
//! has been validated: every required field is present and timestamps are
//! filled in from the receipt time when the gateway omitted them.

use super::raw::ChatSource;
use crate::conversation::Position;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A classified gateway event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum InboundEvent {
    Chat(ChatEvent),
    Typing(TypingEvent),
    DirectMessage(DirectMessageEvent),
    GroupMessage(GroupMessageEvent),
    SessionResolved(SessionResolvedEvent),
    NameResolved(NameResolvedEvent),
    Roster(RosterEvent),
    Connection(ConnectionEvent),
}

impl InboundEvent {
    pub fn family(&self) -> &'static str {
        match self {
            Self::Chat(_) => "chat",
            Self::Typing(_) => "typing",
            Self::DirectMessage(_) => "direct_message",
            Self::GroupMessage(_) => "group_message",
            Self::SessionResolved(_) => "session_resolved",
            Self::NameResolved(_) => "name_resolved",
            Self::Roster(_) => "roster",
            Self::Connection(_) => "connection",
        }
    }
}

/// Local-area chat.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatEvent {
    pub source_id: Uuid,
    pub source_name: String,
    pub source: ChatSource,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

/// Where a remote typist is typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypingScope {
    Local,
    /// Typing to us in a direct message.
    Direct,
    Group { group_id: Uuid },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypingEvent {
    pub scope: TypingScope,
    pub agent_id: Uuid,
    pub name: String,
    /// `true` for start, `false` for stop.
    pub typing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectMessageEvent {
    pub from_id: Uuid,
    pub from_name: String,
    pub body: String,
    /// Sent by an in-world object rather than an avatar.
    pub from_object: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMessageEvent {
    pub group_id: Uuid,
    pub session_id: Option<Uuid>,
    pub group_im: bool,
    pub from_id: Uuid,
    pub from_name: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

impl GroupMessageEvent {
    /// The transport session this message belongs to.
    ///
    /// With `group_im` set the session is carried separately and may be
    /// absent; without it the group key doubles as the session id. The flag
    /// decides which convention applies, even when both fields are present.
    pub fn effective_session_id(&self) -> Option<Uuid> {
        if self.group_im {
            self.session_id
        } else {
            Some(self.group_id)
        }
    }
}

/// Outcome of joining (or being invited into) a group session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionResolvedEvent {
    pub group_id: Uuid,
    pub session_id: Option<Uuid>,
    pub session_name: Option<String>,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvatarName {
    pub agent_id: Uuid,
    pub legacy_name: Option<String>,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupName {
    pub group_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvatarProperties {
    pub agent_id: Uuid,
    pub profile_image: Option<Uuid>,
    pub online: Option<bool>,
}

/// Answers to identity lookups.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NameResolvedEvent {
    Names {
        avatars: Vec<AvatarName>,
        groups: Vec<GroupName>,
    },
    Properties(AvatarProperties),
    Failed {
        agent_ids: Vec<Uuid>,
        group_ids: Vec<Uuid>,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberInfo {
    pub agent_id: Uuid,
    pub name: Option<String>,
    pub moderator: bool,
    pub online: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyAvatar {
    pub agent_id: Uuid,
    pub name: Option<String>,
    pub position: Position,
}

/// Membership and proximity updates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RosterEvent {
    /// Full membership snapshot for a group session.
    Members {
        group_id: Uuid,
        members: Vec<MemberInfo>,
    },
    MemberAdded {
        group_id: Uuid,
        member: MemberInfo,
    },
    MemberRemoved {
        group_id: Uuid,
        agent_id: Uuid,
    },
    Proximity {
        self_position: Position,
        avatars: Vec<NearbyAvatar>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
    LoggedOut,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group_message(group_im: bool, session_id: Option<Uuid>) -> GroupMessageEvent {
        GroupMessageEvent {
            group_id: Uuid::new_v4(),
            session_id,
            group_im,
            from_id: Uuid::new_v4(),
            from_name: "Ada".to_string(),
            body: "hello".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_session_id_is_group_key_without_group_im_flag() {
        let event = group_message(false, Some(Uuid::new_v4()));
        assert_eq!(event.effective_session_id(), Some(event.group_id));
    }

    #[test]
    fn test_session_id_is_carried_with_group_im_flag() {
        let session = Uuid::new_v4();
        let event = group_message(true, Some(session));
        assert_eq!(event.effective_session_id(), Some(session));

        let event = group_message(true, None);
        assert_eq!(event.effective_session_id(), None);
    }
}
