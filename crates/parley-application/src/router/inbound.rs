//! Inbound event handling on the worker.

use super::state::RouterState;
use crate::group_resolver::{Admission, Resolution};
use crate::lookups::{Continuation, LookupKey, LookupOutcome};
use crate::roster::RosterRefresh;
use crate::typing;
use chrono::{DateTime, Utc};
use parley_core::conversation::{ConversationKey, Message, MessageKind, PLACEHOLDER_NAME};
use parley_core::event::{
    AvatarName, AvatarProperties, ChatEvent, ChatSource, ConnectionEvent, DirectMessageEvent,
    GroupMessageEvent, InboundEvent, MemberInfo, NameResolvedEvent, RosterEvent,
    SessionResolvedEvent, TypingEvent, TypingScope,
};
use uuid::Uuid;

impl RouterState {
    pub(super) fn on_inbound(&mut self, event: InboundEvent, received_at: DateTime<Utc>) {
        tracing::trace!("[Router] Processing {} event", event.family());
        match event {
            InboundEvent::Chat(chat) => self.on_chat(chat),
            InboundEvent::Typing(typing) => self.on_typing(typing),
            InboundEvent::DirectMessage(message) => self.on_direct_message(message),
            InboundEvent::GroupMessage(message) => self.on_group_message(message, received_at),
            InboundEvent::SessionResolved(session) => self.on_session_resolved(session),
            InboundEvent::NameResolved(names) => self.on_name_resolved(names),
            InboundEvent::Roster(roster) => self.on_roster(roster),
            InboundEvent::Connection(ConnectionEvent::Connected) => self.on_connected(),
            InboundEvent::Connection(ConnectionEvent::Disconnected) => {
                self.teardown("disconnected")
            }
            InboundEvent::Connection(ConnectionEvent::LoggedOut) => self.reset_session(),
        }
    }

    // ---- messages ----

    fn on_chat(&mut self, chat: ChatEvent) {
        let (key, kind, sender_name) = match chat.source {
            ChatSource::System => (
                ConversationKey::System,
                MessageKind::System,
                fallback_name(&chat.source_name, "System"),
            ),
            ChatSource::Object => (
                ConversationKey::Local,
                MessageKind::Local,
                fallback_name(&chat.source_name, "Object"),
            ),
            ChatSource::Agent => (
                ConversationKey::Local,
                MessageKind::Local,
                self.sender_name(chat.source_id, &chat.source_name),
            ),
        };
        let from_self = chat.source == ChatSource::Agent && chat.source_id == self.identity.agent_id;

        self.ensure_conversation(key, "");
        self.append(
            key,
            Message {
                sender_id: chat.source_id,
                sender_name,
                body: chat.body,
                timestamp: chat.timestamp,
                kind,
                from_self,
                group_id: None,
            },
        );
    }

    fn on_direct_message(&mut self, message: DirectMessageEvent) {
        let from_self = message.from_id == self.identity.agent_id;
        if message.from_object {
            let key = ConversationKey::ObjectMessage;
            self.ensure_conversation(key, "");
            self.append(
                key,
                Message {
                    sender_id: message.from_id,
                    sender_name: fallback_name(&message.from_name, "Object"),
                    body: message.body,
                    timestamp: message.timestamp,
                    kind: MessageKind::ObjectMessage,
                    from_self: false,
                    group_id: None,
                },
            );
            return;
        }

        let key = ConversationKey::DirectMessage(message.from_id);
        let sender_name = self.sender_name(message.from_id, &message.from_name);
        self.open_direct(message.from_id, &message.from_name);
        self.append(
            key,
            Message {
                sender_id: message.from_id,
                sender_name,
                body: message.body,
                timestamp: message.timestamp,
                kind: MessageKind::DirectMessage,
                from_self,
                group_id: None,
            },
        );
    }

    /// Opens (or returns) the direct-message conversation with `peer`.
    ///
    /// A new conversation gets its two-party roster, and the peer's name is
    /// looked up unless cached; the conversation is renamed when it arrives.
    pub(super) fn open_direct(&mut self, peer: Uuid, name_hint: &str) -> Uuid {
        let key = ConversationKey::DirectMessage(peer);
        let display_hint = self
            .roster
            .display_name(peer)
            .map(str::to_string)
            .unwrap_or_else(|| name_hint.to_string());
        let id = self.ensure_conversation(key, &display_hint);

        let refresh = self
            .registry
            .update(&key, |c| {
                self.roster
                    .ensure_direct_roster(c, &self.identity, peer, name_hint)
            })
            .unwrap_or_default();
        if refresh.changed {
            self.emit_roster_changed(&key);
        }

        let rename: Continuation<RouterState> =
            Box::new(move |state: &mut RouterState, outcome: &LookupOutcome| {
                if let LookupOutcome::AvatarName(name) = outcome {
                    if state.registry.set_display_name(&key, &name.display_name) {
                        state.emit_updated(&key);
                    }
                }
            });
        let mut requests: Vec<(LookupKey, Option<Continuation<RouterState>>)> = Vec::new();
        if refresh.needs_names.contains(&peer) {
            requests.push((LookupKey::AvatarName(peer), Some(rename)));
        }
        requests.extend(
            refresh
                .needs_properties
                .iter()
                .map(|agent_id| (LookupKey::AvatarProperties(*agent_id), None)),
        );
        self.issue_lookups(requests);
        id
    }

    fn on_group_message(&mut self, message: GroupMessageEvent, received_at: DateTime<Utc>) {
        let group_id = message.group_id;
        match self.resolver.admit(message.clone(), received_at) {
            Admission::Deliver { .. } => self.deliver_group_message(message),
            Admission::Queued { issue_request } => {
                tracing::debug!(
                    "[Router] Queued message for unresolved group {} ({} waiting)",
                    group_id,
                    self.resolver.pending_len(group_id)
                );
                if issue_request {
                    self.request_group_name(group_id);
                }
            }
        }
    }

    /// Sends the name lookup for a group the resolver has marked in flight.
    fn request_group_name(&mut self, group_id: Uuid) {
        let on_failure: Continuation<RouterState> =
            Box::new(move |state: &mut RouterState, outcome: &LookupOutcome| {
                if let Some(reason) = outcome.failure_reason() {
                    state.resolver.fail(group_id, reason);
                }
            });
        self.issue_lookups([(LookupKey::GroupName(group_id), Some(on_failure))]);
    }

    fn deliver_group_message(&mut self, message: GroupMessageEvent) {
        let group_id = message.group_id;
        let key = ConversationKey::Group(group_id);
        if !self.registry.contains(&key) {
            let name = self
                .resolver
                .resolved_name(group_id)
                .unwrap_or_default()
                .to_string();
            self.join_group(group_id, &name);
        }

        if let Some(session_id) = message.effective_session_id() {
            let unset = self
                .registry
                .get(&key)
                .is_some_and(|c| c.session_id.is_none());
            if unset && self.registry.set_session_id(&key, session_id) {
                self.emit_updated(&key);
            }
        }

        let sender_name = self.sender_name(message.from_id, &message.from_name);
        self.append(
            key,
            Message {
                sender_id: message.from_id,
                sender_name,
                body: message.body,
                timestamp: message.timestamp,
                kind: MessageKind::Group,
                from_self: message.from_id == self.identity.agent_id,
                group_id: Some(group_id),
            },
        );
    }

    /// Creates a group conversation and starts its roster refresh.
    fn join_group(&mut self, group_id: Uuid, name: &str) {
        self.ensure_conversation(ConversationKey::Group(group_id), name);
        self.arm_roster_timer(group_id);
        self.request_group_members(group_id);
    }

    /// Applies a resolved group name and replays its queue in order.
    fn apply_group_resolution(&mut self, resolution: Resolution) {
        let Resolution {
            group_id,
            name,
            session_id,
            drained,
        } = resolution;
        let key = ConversationKey::Group(group_id);

        if self.registry.contains(&key) {
            if self.registry.set_display_name(&key, &name) {
                self.emit_updated(&key);
            }
        } else {
            self.join_group(group_id, &name);
        }
        if let Some(session_id) = session_id {
            if self.registry.set_session_id(&key, session_id) {
                self.emit_updated(&key);
            }
        }

        for pending in drained {
            self.deliver_group_message(pending.event);
        }
    }

    fn on_session_resolved(&mut self, session: SessionResolvedEvent) {
        let group_id = session.group_id;
        let lookup = LookupKey::GroupName(group_id);

        if !session.success {
            let outcome = LookupOutcome::Failed("session start rejected".to_string());
            let continuations = self.lookups.complete(&lookup);
            if continuations.is_empty() {
                self.resolver.fail(group_id, "session start rejected");
            } else {
                self.run_continuations(continuations, &outcome);
            }
            return;
        }

        let key = ConversationKey::Group(group_id);
        let name = session
            .session_name
            .clone()
            .or_else(|| self.resolver.resolved_name(group_id).map(str::to_string))
            .or_else(|| self.registry.get(&key).map(|c| c.display_name.clone()));

        match name {
            Some(name) => {
                let continuations = self.lookups.complete(&lookup);
                let resolution = self.resolver.resolve(group_id, name.clone(), session.session_id);
                let session_id = resolution.session_id;
                self.apply_group_resolution(resolution);
                self.run_continuations(
                    continuations,
                    &LookupOutcome::GroupName { name, session_id },
                );
            }
            None => {
                if let Some(session_id) = session.session_id {
                    self.resolver.note_session(group_id, session_id);
                }
                if self.resolver.begin(group_id) {
                    self.request_group_name(group_id);
                }
            }
        }
    }

    // ---- identity answers ----

    fn on_name_resolved(&mut self, names: NameResolvedEvent) {
        match names {
            NameResolvedEvent::Names { avatars, groups } => {
                for avatar in avatars {
                    self.on_avatar_name(avatar);
                }
                for group in groups {
                    let group_id = group.group_id;
                    let known = self.registry.contains(&ConversationKey::Group(group_id))
                        || self.resolver.pending_len(group_id) > 0
                        || self.lookups.is_pending(&LookupKey::GroupName(group_id));
                    if !known {
                        tracing::debug!("[Router] Ignoring name for unknown group {}", group_id);
                        continue;
                    }
                    let continuations = self.lookups.complete(&LookupKey::GroupName(group_id));
                    let resolution = self.resolver.resolve(group_id, group.name.clone(), None);
                    let session_id = resolution.session_id;
                    self.apply_group_resolution(resolution);
                    self.run_continuations(
                        continuations,
                        &LookupOutcome::GroupName {
                            name: group.name,
                            session_id,
                        },
                    );
                }
            }
            NameResolvedEvent::Properties(properties) => self.on_avatar_properties(properties),
            NameResolvedEvent::Failed {
                agent_ids,
                group_ids,
                reason,
            } => {
                let outcome = LookupOutcome::Failed(reason.clone());
                for agent_id in agent_ids {
                    let continuations = self.lookups.complete(&LookupKey::AvatarName(agent_id));
                    tracing::warn!("[Router] Name lookup for avatar {} failed: {}", agent_id, reason);
                    self.run_continuations(continuations, &outcome);
                }
                for group_id in group_ids {
                    let continuations = self.lookups.complete(&LookupKey::GroupName(group_id));
                    if continuations.is_empty() {
                        self.resolver.fail(group_id, &reason);
                    } else {
                        self.run_continuations(continuations, &outcome);
                    }
                }
            }
        }
    }

    fn on_avatar_name(&mut self, avatar: AvatarName) {
        self.roster.record_name(&avatar);
        for key in self.conversations_with(avatar.agent_id) {
            let changed = self
                .registry
                .update(&key, |c| self.roster.enrich(c, &avatar))
                .unwrap_or(false);
            if changed {
                self.emit_roster_changed(&key);
            }
        }
        let continuations = self.lookups.complete(&LookupKey::AvatarName(avatar.agent_id));
        self.run_continuations(continuations, &LookupOutcome::AvatarName(avatar));
    }

    fn on_avatar_properties(&mut self, properties: AvatarProperties) {
        self.roster.record_properties(&properties);
        for key in self.conversations_with(properties.agent_id) {
            let changed = self
                .registry
                .update(&key, |c| self.roster.apply_properties(c, &properties))
                .unwrap_or(false);
            if changed {
                self.emit_roster_changed(&key);
            }
        }
        let continuations = self
            .lookups
            .complete(&LookupKey::AvatarProperties(properties.agent_id));
        self.run_continuations(continuations, &LookupOutcome::AvatarProperties(properties));
    }

    /// Conversations whose roster lists `agent_id`.
    fn conversations_with(&self, agent_id: Uuid) -> Vec<ConversationKey> {
        self.registry
            .snapshot()
            .iter()
            .filter(|c| c.participant(agent_id).is_some())
            .map(|c| c.key)
            .collect()
    }

    // ---- rosters ----

    fn on_roster(&mut self, event: RosterEvent) {
        match event {
            RosterEvent::Members { group_id, members } => {
                let key = ConversationKey::Group(group_id);
                let Some(refresh) = self
                    .registry
                    .update(&key, |c| self.roster.apply_group_snapshot(c, &members))
                else {
                    tracing::debug!("[Router] Ignoring members of unjoined group {}", group_id);
                    return;
                };
                tracing::debug!(
                    "[Router] Group {} roster refreshed: {} member(s), {} name(s) to resolve",
                    group_id,
                    members.len(),
                    refresh.needs_names.len()
                );
                self.after_roster_change(&key, refresh);
            }
            RosterEvent::MemberAdded { group_id, member } => self.on_member_added(group_id, member),
            RosterEvent::MemberRemoved { group_id, agent_id } => {
                let key = ConversationKey::Group(group_id);
                let populated = self.registry.get(&key).is_some_and(|c| !c.roster.is_empty());
                let removed = self
                    .registry
                    .update(&key, |c| self.roster.remove_group_member(c, agent_id))
                    .flatten();
                if let Some(participant) = removed {
                    self.emit_roster_changed(&key);
                    if populated {
                        let notice = format!("{} left the session", participant.display_name);
                        self.append(key, Message::system_notice(notice, Utc::now()));
                    }
                    self.request_group_members(group_id);
                }
            }
            RosterEvent::Proximity {
                self_position,
                avatars,
            } => {
                let key = ConversationKey::Local;
                self.ensure_conversation(key, "");
                let self_id = self.identity.agent_id;
                let refresh = self
                    .registry
                    .update(&key, |c| {
                        self.roster.apply_proximity(c, self_id, self_position, &avatars)
                    })
                    .unwrap_or_default();
                self.after_roster_change(&key, refresh);
            }
        }
    }

    fn on_member_added(&mut self, group_id: Uuid, member: MemberInfo) {
        let key = ConversationKey::Group(group_id);
        let populated = self.registry.get(&key).is_some_and(|c| !c.roster.is_empty());
        let Some(refresh) = self
            .registry
            .update(&key, |c| self.roster.add_group_member(c, &member))
            .flatten()
        else {
            return;
        };
        if populated {
            let name = self.sender_name(member.agent_id, member.name.as_deref().unwrap_or(""));
            if name != PLACEHOLDER_NAME {
                let notice = format!("{} joined the session", name);
                self.append(key, Message::system_notice(notice, Utc::now()));
            }
        }
        self.after_roster_change(&key, refresh);
        self.request_group_members(group_id);
    }

    fn after_roster_change(&mut self, key: &ConversationKey, refresh: RosterRefresh) {
        if refresh.changed {
            self.emit_roster_changed(key);
        }
        let names = refresh
            .needs_names
            .into_iter()
            .map(|agent_id| (LookupKey::AvatarName(agent_id), None));
        let properties = refresh
            .needs_properties
            .into_iter()
            .map(|agent_id| (LookupKey::AvatarProperties(agent_id), None));
        self.issue_lookups(names.chain(properties));
    }

    // ---- typing ----

    fn on_typing(&mut self, event: TypingEvent) {
        if event.agent_id == self.identity.agent_id {
            return;
        }
        let key = match event.scope {
            TypingScope::Local => ConversationKey::Local,
            TypingScope::Direct => ConversationKey::DirectMessage(event.agent_id),
            TypingScope::Group { group_id } => ConversationKey::Group(group_id),
        };
        if !self.registry.contains(&key) {
            tracing::trace!("[Router] Typing for unknown conversation {}", key);
            return;
        }

        let agent_id = event.agent_id;
        if event.typing {
            let name = if event.name.trim().is_empty() {
                self.sender_name(agent_id, "")
            } else {
                event.name
            };
            let changed = self
                .registry
                .update(&key, |c| typing::start_remote(c, agent_id, &name))
                .unwrap_or(false);
            if let Some(expiry) = self.config.remote_typing_expiry() {
                let generation = self.typing.arm_remote(key, agent_id);
                self.arm_remote_typing_timer(key, agent_id, generation, expiry);
            }
            if changed {
                self.emit_typing_changed(&key);
            }
        } else {
            self.typing.disarm_remote(key, agent_id);
            let changed = self
                .registry
                .update(&key, |c| typing::stop_remote(c, agent_id))
                .unwrap_or(false);
            if changed {
                self.emit_typing_changed(&key);
            }
        }
    }

    pub(super) fn on_remote_typing_expired(
        &mut self,
        key: ConversationKey,
        agent_id: Uuid,
        generation: u64,
    ) {
        if !self.typing.expire_remote(key, agent_id, generation) {
            return;
        }
        let changed = self
            .registry
            .update(&key, |c| typing::stop_remote(c, agent_id))
            .unwrap_or(false);
        if changed {
            tracing::debug!("[Router] Typing indicator for {} in {} expired", agent_id, key);
            self.emit_typing_changed(&key);
        }
    }
}

fn fallback_name(given: &str, fallback: &str) -> String {
    if given.trim().is_empty() {
        fallback.to_string()
    } else {
        given.to_string()
    }
}

