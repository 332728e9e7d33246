//! Participant rosters.
//!
//! Group rosters are rebuilt from membership snapshots, direct-message
//! rosters are fixed at two entries, and the local roster follows proximity
//! updates. Resolved names and profile data are cached for the whole login
//! session so a refreshed roster does not lose enrichment or re-request it.

use parley_core::conversation::{Conversation, Participant, Position};
use parley_core::event::{AvatarName, AvatarProperties, MemberInfo, NearbyAvatar};
use parley_core::gateway::SessionIdentity;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
struct CachedName {
    legacy_name: Option<String>,
    display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CachedProfile {
    profile_image: Option<Uuid>,
    online: Option<bool>,
}

/// Follow-up lookups needed after a roster change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterRefresh {
    pub needs_names: Vec<Uuid>,
    pub needs_properties: Vec<Uuid>,
    pub changed: bool,
}

#[derive(Debug, Default)]
pub struct RosterManager {
    names: HashMap<Uuid, CachedName>,
    profiles: HashMap<Uuid, CachedProfile>,
}

impl RosterManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn display_name(&self, agent_id: Uuid) -> Option<&str> {
        self.names.get(&agent_id).map(|n| n.display_name.as_str())
    }

    pub fn record_name(&mut self, name: &AvatarName) {
        self.names.insert(
            name.agent_id,
            CachedName {
                legacy_name: name.legacy_name.clone(),
                display_name: name.display_name.clone(),
            },
        );
    }

    pub fn record_properties(&mut self, properties: &AvatarProperties) {
        self.profiles.insert(
            properties.agent_id,
            CachedProfile {
                profile_image: properties.profile_image,
                online: properties.online,
            },
        );
    }

    fn build(&self, agent_id: Uuid, legacy_name: &str) -> Participant {
        let mut participant = Participant::pending(agent_id, legacy_name);
        self.apply_cached(&mut participant);
        participant
    }

    fn apply_cached(&self, participant: &mut Participant) {
        if let Some(name) = self.names.get(&participant.agent_id) {
            participant.enrich(name.legacy_name.as_deref(), &name.display_name);
        }
        if let Some(profile) = self.profiles.get(&participant.agent_id) {
            participant.profile_image = profile.profile_image;
            if let Some(online) = profile.online {
                participant.online = online;
            }
        }
    }

    fn follow_ups<'a>(&self, participants: impl Iterator<Item = &'a Participant>) -> RosterRefresh {
        let mut refresh = RosterRefresh::default();
        for participant in participants {
            if !participant.enriched {
                refresh.needs_names.push(participant.agent_id);
            }
            if !self.profiles.contains_key(&participant.agent_id) {
                refresh.needs_properties.push(participant.agent_id);
            }
        }
        refresh
    }

    /// Replaces a group roster with a membership snapshot.
    pub fn apply_group_snapshot(
        &self,
        conversation: &mut Conversation,
        members: &[MemberInfo],
    ) -> RosterRefresh {
        let mut seen = HashSet::new();
        let roster: Vec<Participant> = members
            .iter()
            .filter(|member| seen.insert(member.agent_id))
            .map(|member| {
                let mut participant = self.build(member.agent_id, member.name.as_deref().unwrap_or(""));
                participant.moderator = member.moderator;
                participant.online = member.online;
                participant
            })
            .collect();

        let mut refresh = self.follow_ups(roster.iter());
        refresh.changed = conversation.roster != roster;
        conversation.roster = roster;
        refresh
    }

    /// Inserts one group member. Returns `None` if already present.
    pub fn add_group_member(
        &self,
        conversation: &mut Conversation,
        member: &MemberInfo,
    ) -> Option<RosterRefresh> {
        if conversation.participant(member.agent_id).is_some() {
            return None;
        }
        let mut participant = self.build(member.agent_id, member.name.as_deref().unwrap_or(""));
        participant.moderator = member.moderator;
        participant.online = member.online;
        let mut refresh = self.follow_ups(std::iter::once(&participant));
        refresh.changed = true;
        conversation.roster.push(participant);
        Some(refresh)
    }

    pub fn remove_group_member(
        &self,
        conversation: &mut Conversation,
        agent_id: Uuid,
    ) -> Option<Participant> {
        let index = conversation
            .roster
            .iter()
            .position(|p| p.agent_id == agent_id)?;
        Some(conversation.roster.remove(index))
    }

    /// Creates the two-party roster once. Returns the lookups for the peer.
    pub fn ensure_direct_roster(
        &self,
        conversation: &mut Conversation,
        identity: &SessionIdentity,
        peer_id: Uuid,
        peer_name_hint: &str,
    ) -> RosterRefresh {
        if !conversation.roster.is_empty() {
            return RosterRefresh::default();
        }
        let me = Participant::resolved(identity.agent_id, &identity.name, &identity.name);
        let peer = self.build(peer_id, peer_name_hint);
        let mut refresh = self.follow_ups(std::iter::once(&peer));
        refresh.changed = true;
        conversation.roster = vec![me, peer];
        refresh
    }

    /// Recomputes the local roster from a proximity update.
    ///
    /// Self is excluded; departed avatars are removed; distances are
    /// recomputed from `self_position`.
    pub fn apply_proximity(
        &self,
        conversation: &mut Conversation,
        self_id: Uuid,
        self_position: Position,
        avatars: &[NearbyAvatar],
    ) -> RosterRefresh {
        let mut roster = Vec::with_capacity(avatars.len());
        let mut seen = HashSet::new();
        for avatar in avatars {
            if avatar.agent_id == self_id || !seen.insert(avatar.agent_id) {
                continue;
            }
            let mut participant = match conversation.participant(avatar.agent_id) {
                Some(existing) => existing.clone(),
                None => self.build(avatar.agent_id, avatar.name.as_deref().unwrap_or("")),
            };
            participant.distance = self_position.distance_to(&avatar.position);
            roster.push(participant);
        }

        let mut refresh = self.follow_ups(roster.iter());
        refresh.needs_properties.clear();
        refresh.changed = conversation.roster != roster;
        conversation.roster = roster;
        refresh
    }

    /// Patches every roster entry for `name.agent_id` in place.
    pub fn enrich(&self, conversation: &mut Conversation, name: &AvatarName) -> bool {
        let mut changed = false;
        for participant in conversation
            .roster
            .iter_mut()
            .filter(|p| p.agent_id == name.agent_id)
        {
            participant.enrich(name.legacy_name.as_deref(), &name.display_name);
            changed = true;
        }
        changed
    }

    pub fn apply_properties(
        &self,
        conversation: &mut Conversation,
        properties: &AvatarProperties,
    ) -> bool {
        let Some(participant) = conversation.participant_mut(properties.agent_id) else {
            return false;
        };
        participant.profile_image = properties.profile_image;
        if let Some(online) = properties.online {
            participant.online = online;
        }
        true
    }

    pub fn clear(&mut self) {
        self.names.clear();
        self.profiles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parley_core::conversation::{ConversationKey, PLACEHOLDER_NAME};

    fn member(agent_id: Uuid, name: &str) -> MemberInfo {
        MemberInfo {
            agent_id,
            name: Some(name.to_string()),
            moderator: false,
            online: true,
        }
    }

    fn resolved(agent_id: Uuid, display: &str) -> AvatarName {
        AvatarName {
            agent_id,
            legacy_name: None,
            display_name: display.to_string(),
        }
    }

    #[test]
    fn test_snapshot_replaces_roster_and_skips_enriched_members() {
        let mut manager = RosterManager::new();
        let mut conv = Conversation::new(ConversationKey::Group(Uuid::new_v4()), "G", Utc::now());
        let (ada, bob, cara) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let refresh =
            manager.apply_group_snapshot(&mut conv, &[member(ada, "ada.l"), member(bob, "bob.b")]);
        assert_eq!(refresh.needs_names, vec![ada, bob]);
        assert!(refresh.changed);

        manager.record_name(&resolved(ada, "Ada"));
        manager.enrich(&mut conv, &resolved(ada, "Ada"));

        let refresh =
            manager.apply_group_snapshot(&mut conv, &[member(ada, "ada.l"), member(cara, "cara.c")]);
        assert_eq!(refresh.needs_names, vec![cara]);
        let names: Vec<_> = conv.roster.iter().map(|p| p.display_name.as_str()).collect();
        assert_eq!(names, ["Ada", "cara.c"]);
        assert!(conv.participant(bob).is_none());
    }

    #[test]
    fn test_properties_requested_only_once_cached() {
        let mut manager = RosterManager::new();
        let mut conv = Conversation::new(ConversationKey::Group(Uuid::new_v4()), "G", Utc::now());
        let ada = Uuid::new_v4();
        let refresh = manager.apply_group_snapshot(&mut conv, &[member(ada, "ada.l")]);
        assert_eq!(refresh.needs_properties, vec![ada]);

        let properties = AvatarProperties {
            agent_id: ada,
            profile_image: Some(Uuid::new_v4()),
            online: Some(false),
        };
        manager.record_properties(&properties);
        let refresh = manager.apply_group_snapshot(&mut conv, &[member(ada, "ada.l")]);
        assert!(refresh.needs_properties.is_empty());
        assert_eq!(conv.roster[0].profile_image, properties.profile_image);
        assert!(!conv.roster[0].online);
    }

    #[test]
    fn test_direct_roster_created_once_with_placeholder() {
        let manager = RosterManager::new();
        let me = SessionIdentity::new(Uuid::new_v4(), "Me Resident");
        let peer = Uuid::new_v4();
        let mut conv = Conversation::new(ConversationKey::DirectMessage(peer), "", Utc::now());

        let refresh = manager.ensure_direct_roster(&mut conv, &me, peer, "");
        assert_eq!(refresh.needs_names, vec![peer]);
        assert_eq!(conv.roster.len(), 2);
        assert_eq!(conv.participant(peer).unwrap().display_name, PLACEHOLDER_NAME);

        let refresh = manager.ensure_direct_roster(&mut conv, &me, peer, "Peer");
        assert!(!refresh.changed);
        assert_eq!(conv.roster.len(), 2);

        manager.enrich(&mut conv, &resolved(peer, "Peer"));
        assert_eq!(conv.participant(peer).unwrap().display_name, "Peer");
    }

    #[test]
    fn test_proximity_excludes_self_and_tracks_distance() {
        let manager = RosterManager::new();
        let me = Uuid::new_v4();
        let (near, far) = (Uuid::new_v4(), Uuid::new_v4());
        let mut conv = Conversation::new(ConversationKey::Local, "", Utc::now());
        let origin = Position::new(10.0, 10.0, 20.0);
        let avatar = |agent_id, x, y, z| NearbyAvatar {
            agent_id,
            name: Some("n".to_string()),
            position: Position::new(x, y, z),
        };

        manager.apply_proximity(
            &mut conv,
            me,
            origin,
            &[
                avatar(me, 10.0, 10.0, 20.0),
                avatar(near, 13.0, 14.0, 20.0),
                avatar(far, 10.0, 10.0, 50.0),
            ],
        );
        assert_eq!(conv.roster.len(), 2);
        assert!(conv.participant(me).is_none());
        assert!((conv.participant(near).unwrap().distance - 5.0).abs() < 1e-4);
        assert!((conv.participant(far).unwrap().distance - 30.0).abs() < 1e-4);

        manager.apply_proximity(&mut conv, me, origin, &[avatar(near, 10.0, 11.0, 20.0)]);
        assert_eq!(conv.roster.len(), 1);
        assert!((conv.participant(near).unwrap().distance - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_add_and_remove_group_member() {
        let manager = RosterManager::new();
        let mut conv = Conversation::new(ConversationKey::Group(Uuid::new_v4()), "G", Utc::now());
        let ada = Uuid::new_v4();
        assert!(manager.add_group_member(&mut conv, &member(ada, "ada.l")).is_some());
        assert!(manager.add_group_member(&mut conv, &member(ada, "ada.l")).is_none());
        assert_eq!(manager.remove_group_member(&mut conv, ada).unwrap().agent_id, ada);
        assert!(conv.roster.is_empty());
    }
}
