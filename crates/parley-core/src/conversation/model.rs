//! Conversation aggregate.

use super::key::{ConversationKey, ConversationKind};
use super::message::{DedupKey, Message};
use super::participant::{Participant, Typist};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

/// One chat context: its messages, roster and read/typing status.
///
/// A conversation is identified by its [`ConversationKey`]; `id` is a stable
/// handle for the UI. Mutation goes through the registry in the application
/// crate, which hands readers `Arc` snapshots, so the methods here assume a
/// single writer.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: Uuid,
    pub key: ConversationKey,
    pub display_name: String,
    /// Transport session for group chat. Once set it is never cleared.
    pub session_id: Option<Uuid>,
    /// Append-only, in arrival order.
    pub messages: Vec<Message>,
    /// Remote typists, in the order they started.
    pub typing: Vec<Typist>,
    pub roster: Vec<Participant>,
    pub unread_count: u32,
    pub has_unread: bool,
    pub is_active: bool,
    pub last_activity: DateTime<Utc>,
    /// Text shown in the conversation list: the typing line while anyone is
    /// typing, otherwise the last message body.
    pub preview: String,
    pub last_message_preview: String,
    /// Transient, user-visible status such as a failed send.
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    dedup_index: HashSet<DedupKey>,
}

impl Conversation {
    pub fn new(key: ConversationKey, display_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        let display_name = display_name.into();
        let display_name = if display_name.trim().is_empty() {
            key.default_display_name().to_string()
        } else {
            display_name
        };
        Self {
            id: Uuid::new_v4(),
            key,
            display_name,
            session_id: None,
            messages: Vec::new(),
            typing: Vec::new(),
            roster: Vec::new(),
            unread_count: 0,
            has_unread: false,
            is_active: false,
            last_activity: now,
            preview: String::new(),
            last_message_preview: String::new(),
            status: None,
            created_at: now,
            dedup_index: HashSet::new(),
        }
    }

    pub fn kind(&self) -> ConversationKind {
        self.key.kind()
    }

    /// Indexed duplicate check.
    pub fn contains_dedup_key(&self, key: &DedupKey) -> bool {
        self.dedup_index.contains(key)
    }

    /// Appends a message and updates activity, preview and unread state.
    ///
    /// Does not check for duplicates; callers run the dedup filter first.
    /// Returns the index of the appended message.
    pub fn push_message(&mut self, message: Message) -> usize {
        if message.timestamp > self.last_activity {
            self.last_activity = message.timestamp;
        }
        self.last_message_preview = message.body.clone();
        if self.typing.is_empty() {
            self.preview = message.body.clone();
        }
        if !self.is_active && !message.from_self {
            self.unread_count = self.unread_count.saturating_add(1);
            self.has_unread = true;
        }
        self.dedup_index.insert(message.dedup_key());
        self.messages.push(message);
        self.messages.len() - 1
    }

    /// Sets the session id. Returns whether anything changed.
    pub fn set_session_id(&mut self, session_id: Uuid) -> bool {
        if self.session_id == Some(session_id) {
            return false;
        }
        self.session_id = Some(session_id);
        true
    }

    pub fn activate(&mut self) {
        self.is_active = true;
        self.mark_read();
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    pub fn mark_read(&mut self) {
        self.unread_count = 0;
        self.has_unread = false;
    }

    pub fn typing_names(&self) -> Vec<String> {
        self.typing.iter().map(|t| t.name.clone()).collect()
    }

    /// Shows `typing_line` as the preview, or the last message body if `None`.
    pub fn set_typing_preview(&mut self, typing_line: Option<String>) {
        self.preview = typing_line.unwrap_or_else(|| self.last_message_preview.clone());
    }

    pub fn participant(&self, agent_id: Uuid) -> Option<&Participant> {
        self.roster.iter().find(|p| p.agent_id == agent_id)
    }

    pub fn participant_mut(&mut self, agent_id: Uuid) -> Option<&mut Participant> {
        self.roster.iter_mut().find(|p| p.agent_id == agent_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::MessageKind;

    fn message(body: &str, from_self: bool) -> Message {
        Message {
            sender_id: Uuid::new_v4(),
            sender_name: "Someone".to_string(),
            body: body.to_string(),
            timestamp: Utc::now(),
            kind: MessageKind::Local,
            from_self,
            group_id: None,
        }
    }

    #[test]
    fn test_empty_display_name_uses_kind_default() {
        let conv = Conversation::new(ConversationKey::Local, "  ", Utc::now());
        assert_eq!(conv.display_name, "Local Chat");
    }

    #[test]
    fn test_push_message_tracks_unread_only_for_inactive_remote() {
        let mut conv = Conversation::new(ConversationKey::Local, "Local", Utc::now());
        conv.push_message(message("hi", false));
        conv.push_message(message("me", true));
        assert_eq!(conv.unread_count, 1);
        assert!(conv.has_unread);
        assert_eq!(conv.preview, "me");

        conv.activate();
        conv.push_message(message("again", false));
        assert_eq!(conv.unread_count, 0);
        assert!(!conv.has_unread);
    }

    #[test]
    fn test_push_message_indexes_dedup_key() {
        let mut conv = Conversation::new(ConversationKey::System, "", Utc::now());
        let msg = message("notice", false);
        let key = msg.dedup_key();
        assert!(!conv.contains_dedup_key(&key));
        conv.push_message(msg);
        assert!(conv.contains_dedup_key(&key));
    }

    #[test]
    fn test_preview_keeps_typing_line_until_cleared() {
        let mut conv = Conversation::new(ConversationKey::Local, "", Utc::now());
        conv.typing.push(Typist {
            agent_id: Uuid::new_v4(),
            name: "Alice".to_string(),
        });
        conv.set_typing_preview(Some("Alice is typing…".to_string()));
        conv.push_message(message("hello", false));
        assert_eq!(conv.preview, "Alice is typing…");

        conv.typing.clear();
        conv.set_typing_preview(None);
        assert_eq!(conv.preview, "hello");
    }
}
