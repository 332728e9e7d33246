//! UI commands on the worker.

use super::state::RouterState;
use super::work::{Command, SendCompletion, WorkItem, post};
use crate::events::RouterEvent;
use chrono::Utc;
use parley_core::conversation::{ConversationKey, Message};
use parley_core::gateway::{SendOutcome, TypingTarget};
use parley_core::{ParleyError, Result};
use std::sync::Arc;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Where an accepted send goes.
#[derive(Debug, Clone, Copy)]
enum Destination {
    Local { channel: i32 },
    Direct { agent_id: Uuid },
    Group { session_id: Uuid },
}

impl RouterState {
    pub(super) fn on_command(&mut self, command: Command) {
        match command {
            Command::Select { id, reply } => {
                let had_unread = self.has_unread(id);
                let selected = self.registry.set_active(id);
                if selected {
                    self.emit(RouterEvent::ActiveChanged { id });
                    if had_unread {
                        self.emit(RouterEvent::UnreadChanged {
                            id,
                            unread_count: 0,
                        });
                    }
                }
                self.respond(reply, selected);
            }
            Command::MarkRead { id, reply } => {
                let had_unread = self.has_unread(id);
                let found = self.registry.mark_read(id);
                if had_unread {
                    self.emit(RouterEvent::UnreadChanged {
                        id,
                        unread_count: 0,
                    });
                }
                self.respond(reply, found);
            }
            Command::Send { id, text, reply } => self.send_message(id, text, reply),
            Command::OpenDirectMessage {
                agent_id,
                name_hint,
                reply,
            } => {
                let id = self.open_direct(agent_id, name_hint.as_deref().unwrap_or(""));
                self.respond(reply, id);
            }
            Command::StartTyping { id, reply } => {
                let started = self.start_outbound_typing(id);
                self.respond(reply, started);
            }
            Command::StopTyping { id, reply } => {
                let stopped = self
                    .registry
                    .key_for_id(id)
                    .is_some_and(|key| self.stop_outbound_typing(key));
                self.respond(reply, stopped);
            }
            Command::ResetSession { reply } => {
                self.reset_session();
                self.respond(reply, ());
            }
        }
    }

    fn has_unread(&self, id: Uuid) -> bool {
        self.registry
            .get_by_id(id)
            .is_some_and(|c| c.unread_count > 0 || c.has_unread)
    }

    // ---- sending ----

    /// Validates a send and hands it to the gateway.
    ///
    /// Rejections are answered immediately. Accepted sends are answered
    /// once the gateway returns, after the local echo has been appended.
    fn send_message(&mut self, id: Uuid, text: String, reply: oneshot::Sender<SendOutcome>) {
        let Some(key) = self.registry.key_for_id(id) else {
            self.respond(reply, SendOutcome::UnknownConversation);
            return;
        };
        if text.trim().is_empty() {
            self.respond(reply, SendOutcome::Empty);
            return;
        }
        if !key.accepts_outbound() {
            self.respond(reply, SendOutcome::Unsupported);
            return;
        }
        if !self.gateway.is_connected() {
            tracing::debug!("[Router] Send to {} rejected: not connected", key);
            self.reject_send(key, SendOutcome::NotConnected, reply);
            return;
        }

        let destination = match key {
            ConversationKey::Local => Destination::Local {
                channel: self.config.local_chat_channel,
            },
            ConversationKey::DirectMessage(agent_id) => Destination::Direct { agent_id },
            ConversationKey::Group(_) => {
                match self.registry.get(&key).and_then(|c| c.session_id) {
                    Some(session_id) => Destination::Group { session_id },
                    None => {
                        self.reject_send(key, SendOutcome::NoSession, reply);
                        return;
                    }
                }
            }
            ConversationKey::ObjectMessage | ConversationKey::System => {
                self.respond(reply, SendOutcome::Unsupported);
                return;
            }
        };

        self.stop_outbound_typing(key);

        let gateway = Arc::clone(&self.gateway);
        let token = self.session_token.clone();
        let tx = self.work_tx.clone();
        let sent_at = Utc::now();
        tokio::spawn(async move {
            let call = async {
                match destination {
                    Destination::Local { channel } => gateway.send_local_chat(&text, channel).await,
                    Destination::Direct { agent_id } => {
                        gateway.send_direct_message(agent_id, &text).await
                    }
                    Destination::Group { session_id } => {
                        gateway.send_group_message(session_id, &text).await
                    }
                }
            };
            let result: Result<()> = tokio::select! {
                _ = token.cancelled() => Err(ParleyError::NotConnected),
                result = call => result,
            };
            post(
                &tx,
                WorkItem::SendFinished(SendCompletion {
                    key,
                    text,
                    sent_at,
                    result,
                    reply,
                }),
            );
        });
    }

    fn reject_send(
        &mut self,
        key: ConversationKey,
        outcome: SendOutcome,
        reply: oneshot::Sender<SendOutcome>,
    ) {
        self.set_status(&key, outcome.status_text());
        self.respond(reply, outcome);
    }

    pub(super) fn on_send_finished(&mut self, completion: SendCompletion) {
        let SendCompletion {
            key,
            text,
            sent_at,
            result,
            reply,
        } = completion;

        let outcome = match result {
            Ok(()) => {
                // Local chat comes back from the simulator; other kinds are echoed here.
                if matches!(key, ConversationKey::DirectMessage(_) | ConversationKey::Group(_)) {
                    let echo = Message {
                        sender_id: self.identity.agent_id,
                        sender_name: self.identity.name.clone(),
                        body: text,
                        timestamp: sent_at,
                        kind: key.kind().into(),
                        from_self: true,
                        group_id: key.group_id(),
                    };
                    self.append(key, echo);
                }
                SendOutcome::Sent
            }
            Err(e) if e.is_not_connected() => SendOutcome::NotConnected,
            Err(e) => {
                tracing::warn!("[Router] Send to {} failed: {}", key, e);
                SendOutcome::Failed(e.to_string())
            }
        };
        self.set_status(&key, outcome.status_text());
        self.respond(reply, outcome);
    }

    // ---- outbound typing ----

    fn typing_target(&self, key: ConversationKey) -> Option<TypingTarget> {
        match key {
            ConversationKey::Local => Some(TypingTarget::Local),
            ConversationKey::DirectMessage(agent_id) => {
                Some(TypingTarget::DirectMessage { agent_id })
            }
            ConversationKey::Group(_) => self
                .registry
                .get(&key)
                .and_then(|c| c.session_id)
                .map(|session_id| TypingTarget::Group { session_id }),
            ConversationKey::ObjectMessage | ConversationKey::System => None,
        }
    }

    fn send_typing(&self, target: TypingTarget, typing: bool) {
        if !self.gateway.is_connected() {
            return;
        }
        let gateway = Arc::clone(&self.gateway);
        self.spawn_gateway_call("send_typing", async move {
            gateway.send_typing(target, typing).await
        });
    }

    /// Starts (or extends) the local user's typing signal.
    fn start_outbound_typing(&mut self, id: Uuid) -> bool {
        let Some(key) = self.registry.key_for_id(id) else {
            return false;
        };
        let Some(target) = self.typing_target(key) else {
            return false;
        };
        if !self.gateway.is_connected() {
            return false;
        }
        let start = self.typing.start_outbound(key);
        if start.send_start {
            self.send_typing(target, true);
        }
        self.arm_outbound_typing_timer(key, start.generation);
        true
    }

    /// Stops the local user's typing signal. Returns whether it was active.
    pub(super) fn stop_outbound_typing(&mut self, key: ConversationKey) -> bool {
        if !self.typing.stop_outbound(&key) {
            return false;
        }
        if let Some(target) = self.typing_target(key) {
            self.send_typing(target, false);
        }
        true
    }

    pub(super) fn on_outbound_typing_expired(&mut self, key: ConversationKey, generation: u64) {
        if !self.typing.expire_outbound(&key, generation) {
            return;
        }
        tracing::debug!("[Router] Outbound typing in {} timed out", key);
        if let Some(target) = self.typing_target(key) {
            self.send_typing(target, false);
        }
    }
}
