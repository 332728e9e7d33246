//! Event ingestion gate.
//!
//! The only way gateway traffic enters the router. Raw events are validated
//! and classified on the caller's thread, then queued for the router worker;
//! nothing here touches conversation state.

use crate::router::work::{WorkItem, WorkSender};
use chrono::{DateTime, Utc};
use parley_core::event::{
    AvatarName, AvatarProperties, ChatEvent, ChatSource, ConnectionEvent, DirectMessageEvent,
    GroupMessageEvent, GroupName, InboundEvent, MemberInfo, NameResolvedEvent, NearbyAvatar,
    RawEvent, RawTypingScope, RosterEvent, SessionResolvedEvent, TypingEvent, TypingScope,
};
use parley_core::{ParleyError, Result};
use uuid::Uuid;

fn required<T>(value: Option<T>, event_type: &str, field: &str) -> Result<T> {
    value.ok_or_else(|| ParleyError::malformed(event_type, format!("missing {}", field)))
}

fn required_text(value: Option<String>, event_type: &str, field: &str) -> Result<String> {
    match value {
        Some(text) if !text.trim().is_empty() => Ok(text),
        Some(_) => Err(ParleyError::malformed(event_type, format!("empty {}", field))),
        None => Err(ParleyError::malformed(event_type, format!("missing {}", field))),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

/// Validates a raw event and maps it onto its event family.
///
/// Missing timestamps are filled with `received_at`. Entries inside list
/// payloads that lack an id are skipped rather than failing the whole event.
pub fn classify(raw: RawEvent, received_at: DateTime<Utc>) -> Result<InboundEvent> {
    let event_type = raw.type_name();
    let event = match raw {
        RawEvent::ChatFromSource {
            source_id,
            source_name,
            source,
            message,
            timestamp,
        } => {
            let source = source.unwrap_or(ChatSource::Agent);
            let source_id = match (source_id, source) {
                (Some(id), _) => id,
                (None, ChatSource::System) => Uuid::nil(),
                (None, _) => return Err(ParleyError::malformed(event_type, "missing source_id")),
            };
            InboundEvent::Chat(ChatEvent {
                source_id,
                source_name: source_name.unwrap_or_default(),
                source,
                body: required_text(message, event_type, "message")?,
                timestamp: timestamp.unwrap_or(received_at),
            })
        }
        RawEvent::StartTyping {
            scope,
            agent_id,
            name,
        }
        | RawEvent::StopTyping {
            scope,
            agent_id,
            name,
        } => {
            let scope = match required(scope, event_type, "scope")? {
                RawTypingScope::Local => TypingScope::Local,
                RawTypingScope::Direct => TypingScope::Direct,
                RawTypingScope::Group { group_id } => TypingScope::Group { group_id },
            };
            InboundEvent::Typing(TypingEvent {
                scope,
                agent_id: required(agent_id, event_type, "agent_id")?,
                name: name.unwrap_or_default(),
                typing: event_type == "start_typing",
            })
        }
        RawEvent::DirectMessage {
            from_id,
            from_name,
            message,
            from_object,
            timestamp,
        } => InboundEvent::DirectMessage(DirectMessageEvent {
            from_id: required(from_id, event_type, "from_id")?,
            from_name: from_name.unwrap_or_default(),
            body: required_text(message, event_type, "message")?,
            from_object,
            timestamp: timestamp.unwrap_or(received_at),
        }),
        RawEvent::GroupMessage {
            group_id,
            session_id,
            group_im,
            from_id,
            from_name,
            message,
            timestamp,
        } => InboundEvent::GroupMessage(GroupMessageEvent {
            group_id: required(group_id, event_type, "group_id")?,
            session_id,
            group_im,
            from_id: required(from_id, event_type, "from_id")?,
            from_name: from_name.unwrap_or_default(),
            body: required_text(message, event_type, "message")?,
            timestamp: timestamp.unwrap_or(received_at),
        }),
        RawEvent::GroupSessionStart {
            group_id,
            session_id,
            session_name,
            success,
        } => InboundEvent::SessionResolved(SessionResolvedEvent {
            group_id: required(group_id, event_type, "group_id")?,
            session_id,
            session_name: non_empty(session_name),
            success,
        }),
        RawEvent::NameResolved { avatars, groups } => {
            let avatars: Vec<_> = avatars
                .into_iter()
                .filter_map(|avatar| {
                    let agent_id = avatar.agent_id?;
                    let legacy_name = non_empty(avatar.legacy_name);
                    let display_name =
                        non_empty(avatar.display_name).or_else(|| legacy_name.clone())?;
                    Some(AvatarName {
                        agent_id,
                        legacy_name,
                        display_name,
                    })
                })
                .collect();
            let groups: Vec<_> = groups
                .into_iter()
                .filter_map(|group| {
                    Some(GroupName {
                        group_id: group.group_id?,
                        name: non_empty(group.name)?,
                    })
                })
                .collect();
            if avatars.is_empty() && groups.is_empty() {
                return Err(ParleyError::malformed(event_type, "no usable names"));
            }
            InboundEvent::NameResolved(NameResolvedEvent::Names { avatars, groups })
        }
        RawEvent::NameResolutionFailed {
            agent_ids,
            group_ids,
            reason,
        } => {
            if agent_ids.is_empty() && group_ids.is_empty() {
                return Err(ParleyError::malformed(event_type, "no lookup keys"));
            }
            InboundEvent::NameResolved(NameResolvedEvent::Failed {
                agent_ids,
                group_ids,
                reason: non_empty(reason).unwrap_or_else(|| "lookup failed".to_string()),
            })
        }
        RawEvent::AvatarProperties {
            agent_id,
            profile_image,
            online,
        } => InboundEvent::NameResolved(NameResolvedEvent::Properties(AvatarProperties {
            agent_id: required(agent_id, event_type, "agent_id")?,
            profile_image,
            online,
        })),
        RawEvent::GroupMembers { group_id, members } => {
            let group_id = required(group_id, event_type, "group_id")?;
            let members = required(members, event_type, "members")?
                .into_iter()
                .filter_map(|member| {
                    Some(MemberInfo {
                        agent_id: member.agent_id?,
                        name: non_empty(member.name),
                        moderator: member.moderator,
                        online: member.online,
                    })
                })
                .collect();
            InboundEvent::Roster(RosterEvent::Members { group_id, members })
        }
        RawEvent::GroupMemberAdded {
            group_id,
            agent_id,
            name,
            moderator,
        } => InboundEvent::Roster(RosterEvent::MemberAdded {
            group_id: required(group_id, event_type, "group_id")?,
            member: MemberInfo {
                agent_id: required(agent_id, event_type, "agent_id")?,
                name: non_empty(name),
                moderator,
                online: true,
            },
        }),
        RawEvent::GroupMemberRemoved { group_id, agent_id } => {
            InboundEvent::Roster(RosterEvent::MemberRemoved {
                group_id: required(group_id, event_type, "group_id")?,
                agent_id: required(agent_id, event_type, "agent_id")?,
            })
        }
        RawEvent::Proximity {
            self_position,
            avatars,
        } => InboundEvent::Roster(RosterEvent::Proximity {
            self_position: required(self_position, event_type, "self_position")?,
            avatars: avatars
                .into_iter()
                .filter_map(|avatar| {
                    Some(NearbyAvatar {
                        agent_id: avatar.agent_id?,
                        name: non_empty(avatar.name),
                        position: avatar.position?,
                    })
                })
                .collect(),
        }),
        RawEvent::SimConnected => InboundEvent::Connection(ConnectionEvent::Connected),
        RawEvent::SimDisconnected => InboundEvent::Connection(ConnectionEvent::Disconnected),
        RawEvent::LoggedOut => InboundEvent::Connection(ConnectionEvent::LoggedOut),
        RawEvent::Unknown => {
            return Err(ParleyError::malformed(event_type, "unrecognized event type"));
        }
    };
    Ok(event)
}

/// Thread-safe entry point for gateway events.
///
/// Cheap to clone; every clone feeds the same router worker.
#[derive(Clone)]
pub struct IngestionGate {
    tx: WorkSender,
}

impl IngestionGate {
    pub(crate) fn new(tx: WorkSender) -> Self {
        Self { tx }
    }

    /// Classifies and queues one event. Never blocks.
    ///
    /// Malformed events are logged and dropped; the error is returned for
    /// callers that want to count them, and no state is touched.
    pub fn ingest(&self, raw: RawEvent) -> Result<()> {
        let received_at = Utc::now();
        let event = classify(raw, received_at).inspect_err(|e| {
            tracing::warn!("[IngestionGate] Dropped event: {}", e);
        })?;
        tracing::trace!("[IngestionGate] Queued {} event", event.family());
        self.tx
            .send(WorkItem::Inbound { event, received_at })
            .map_err(|_| ParleyError::internal("router is not running"))
    }

    /// Decodes a JSON-encoded raw event and ingests it.
    pub fn ingest_json(&self, json: &str) -> Result<()> {
        let raw: RawEvent = serde_json::from_str(json).map_err(|e| {
            tracing::warn!("[IngestionGate] Dropped undecodable event: {}", e);
            ParleyError::malformed("json", e.to_string())
        })?;
        self.ingest(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::conversation::Position;
    use parley_core::event::{RawAvatarName, RawNearbyAvatar};
    use tokio::sync::mpsc;

    #[test]
    fn test_missing_required_field_is_malformed() {
        let raw = RawEvent::DirectMessage {
            from_id: None,
            from_name: Some("Ada".to_string()),
            message: Some("hi".to_string()),
            from_object: false,
            timestamp: None,
        };
        let err = classify(raw, Utc::now()).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_empty_body_is_malformed() {
        let raw = RawEvent::GroupMessage {
            group_id: Some(Uuid::new_v4()),
            session_id: None,
            group_im: false,
            from_id: Some(Uuid::new_v4()),
            from_name: None,
            message: Some("   ".to_string()),
            timestamp: None,
        };
        assert!(classify(raw, Utc::now()).unwrap_err().is_malformed());
    }

    #[test]
    fn test_unknown_is_malformed() {
        assert!(classify(RawEvent::Unknown, Utc::now()).unwrap_err().is_malformed());
    }

    #[test]
    fn test_missing_timestamp_uses_receipt_time() {
        let received_at = Utc::now();
        let raw = RawEvent::ChatFromSource {
            source_id: Some(Uuid::new_v4()),
            source_name: Some("Ada".to_string()),
            source: None,
            message: Some("hello".to_string()),
            timestamp: None,
        };
        match classify(raw, received_at).unwrap() {
            InboundEvent::Chat(chat) => {
                assert_eq!(chat.timestamp, received_at);
                assert_eq!(chat.source, ChatSource::Agent);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_stop_typing_classifies_as_not_typing() {
        let raw = RawEvent::StopTyping {
            scope: Some(RawTypingScope::Local),
            agent_id: Some(Uuid::new_v4()),
            name: Some("Ada".to_string()),
        };
        match classify(raw, Utc::now()).unwrap() {
            InboundEvent::Typing(typing) => assert!(!typing.typing),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_name_entries_without_ids_are_skipped() {
        let agent = Uuid::new_v4();
        let raw = RawEvent::NameResolved {
            avatars: vec![
                RawAvatarName {
                    agent_id: None,
                    legacy_name: None,
                    display_name: Some("Nobody".to_string()),
                },
                RawAvatarName {
                    agent_id: Some(agent),
                    legacy_name: Some("ada.lovelace".to_string()),
                    display_name: None,
                },
            ],
            groups: Vec::new(),
        };
        match classify(raw, Utc::now()).unwrap() {
            InboundEvent::NameResolved(NameResolvedEvent::Names { avatars, .. }) => {
                assert_eq!(avatars.len(), 1);
                assert_eq!(avatars[0].display_name, "ada.lovelace");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_proximity_requires_self_position() {
        let raw = RawEvent::Proximity {
            self_position: None,
            avatars: vec![RawNearbyAvatar {
                agent_id: Some(Uuid::new_v4()),
                name: None,
                position: Some(Position::default()),
            }],
        };
        assert!(classify(raw, Utc::now()).is_err());
    }

    #[test]
    fn test_gate_queues_valid_and_drops_malformed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let gate = IngestionGate::new(tx);

        assert!(gate.ingest_json("{not json").unwrap_err().is_malformed());
        assert!(gate.ingest_json(r#"{"type":"teleport_offer"}"#).is_err());
        assert!(rx.try_recv().is_err());

        gate.ingest_json(r#"{"type":"sim_connected"}"#).unwrap();
        match rx.try_recv() {
            Ok(WorkItem::Inbound { event, .. }) => {
                assert_eq!(event, InboundEvent::Connection(ConnectionEvent::Connected));
            }
            _ => panic!("expected an inbound work item"),
        }
    }
}
