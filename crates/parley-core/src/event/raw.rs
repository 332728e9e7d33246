//! Raw events as delivered by the gateway collaborator.
//!
//! Fields the router needs are `Option`s on purpose: a payload that decodes
//! but lacks required data is rejected during classification, where it can be
//! logged with context, instead of failing at decode time.

use crate::conversation::Position;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who produced a piece of local chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatSource {
    Agent,
    Object,
    System,
}

/// Where a typing signal applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawTypingScope {
    Local,
    /// Direct message with the typist.
    Direct,
    Group { group_id: Uuid },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAvatarName {
    pub agent_id: Option<Uuid>,
    #[serde(default)]
    pub legacy_name: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawGroupName {
    pub group_id: Option<Uuid>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMember {
    pub agent_id: Option<Uuid>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub moderator: bool,
    #[serde(default = "default_online")]
    pub online: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNearbyAvatar {
    pub agent_id: Option<Uuid>,
    #[serde(default)]
    pub name: Option<String>,
    pub position: Option<Position>,
}

fn default_online() -> bool {
    true
}

/// One event from the gateway, tagged by subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawEvent {
    /// Chat heard in the region (agents, objects, system).
    ChatFromSource {
        source_id: Option<Uuid>,
        #[serde(default)]
        source_name: Option<String>,
        #[serde(default)]
        source: Option<ChatSource>,
        message: Option<String>,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
    StartTyping {
        scope: Option<RawTypingScope>,
        agent_id: Option<Uuid>,
        #[serde(default)]
        name: Option<String>,
    },
    StopTyping {
        scope: Option<RawTypingScope>,
        agent_id: Option<Uuid>,
        #[serde(default)]
        name: Option<String>,
    },
    DirectMessage {
        from_id: Option<Uuid>,
        #[serde(default)]
        from_name: Option<String>,
        message: Option<String>,
        #[serde(default)]
        from_object: bool,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
    GroupMessage {
        group_id: Option<Uuid>,
        /// Transport session, carried separately only when `group_im` is set.
        #[serde(default)]
        session_id: Option<Uuid>,
        #[serde(default)]
        group_im: bool,
        from_id: Option<Uuid>,
        #[serde(default)]
        from_name: Option<String>,
        message: Option<String>,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
    GroupSessionStart {
        group_id: Option<Uuid>,
        #[serde(default)]
        session_id: Option<Uuid>,
        #[serde(default)]
        session_name: Option<String>,
        #[serde(default = "default_success")]
        success: bool,
    },
    NameResolved {
        #[serde(default)]
        avatars: Vec<RawAvatarName>,
        #[serde(default)]
        groups: Vec<RawGroupName>,
    },
    /// The gateway gave up on a lookup it was asked for.
    NameResolutionFailed {
        #[serde(default)]
        agent_ids: Vec<Uuid>,
        #[serde(default)]
        group_ids: Vec<Uuid>,
        #[serde(default)]
        reason: Option<String>,
    },
    AvatarProperties {
        agent_id: Option<Uuid>,
        #[serde(default)]
        profile_image: Option<Uuid>,
        #[serde(default)]
        online: Option<bool>,
    },
    GroupMembers {
        group_id: Option<Uuid>,
        members: Option<Vec<RawMember>>,
    },
    GroupMemberAdded {
        group_id: Option<Uuid>,
        agent_id: Option<Uuid>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        moderator: bool,
    },
    GroupMemberRemoved {
        group_id: Option<Uuid>,
        agent_id: Option<Uuid>,
    },
    Proximity {
        self_position: Option<Position>,
        #[serde(default)]
        avatars: Vec<RawNearbyAvatar>,
    },
    SimConnected,
    SimDisconnected,
    LoggedOut,
    #[serde(other)]
    Unknown,
}

fn default_success() -> bool {
    true
}

impl RawEvent {
    /// Subscription name, for logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ChatFromSource { .. } => "chat_from_source",
            Self::StartTyping { .. } => "start_typing",
            Self::StopTyping { .. } => "stop_typing",
            Self::DirectMessage { .. } => "direct_message",
            Self::GroupMessage { .. } => "group_message",
            Self::GroupSessionStart { .. } => "group_session_start",
            Self::NameResolved { .. } => "name_resolved",
            Self::NameResolutionFailed { .. } => "name_resolution_failed",
            Self::AvatarProperties { .. } => "avatar_properties",
            Self::GroupMembers { .. } => "group_members",
            Self::GroupMemberAdded { .. } => "group_member_added",
            Self::GroupMemberRemoved { .. } => "group_member_removed",
            Self::Proximity { .. } => "proximity",
            Self::SimConnected => "sim_connected",
            Self::SimDisconnected => "sim_disconnected",
            Self::LoggedOut => "logged_out",
            Self::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_type_decodes_to_unknown() {
        let event: RawEvent = serde_json::from_str(r#"{"type":"teleport_offer"}"#).unwrap();
        assert_eq!(event, RawEvent::Unknown);
    }

    #[test]
    fn test_group_message_defaults() {
        let group_id = Uuid::new_v4();
        let json = format!(
            r#"{{"type":"group_message","group_id":"{}","from_id":"{}","message":"hi"}}"#,
            group_id,
            Uuid::new_v4()
        );
        let event: RawEvent = serde_json::from_str(&json).unwrap();
        match event {
            RawEvent::GroupMessage {
                group_id: gid,
                group_im,
                session_id,
                ..
            } => {
                assert_eq!(gid, Some(group_id));
                assert!(!group_im);
                assert!(session_id.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_typing_scope_is_tagged() {
        let json = r#"{"type":"start_typing","scope":{"kind":"local"},"agent_id":null}"#;
        let event: RawEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.type_name(), "start_typing");
    }
}
