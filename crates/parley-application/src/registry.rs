//! Conversation registry.
//!
//! Owns every [`Conversation`] of the login session. Aggregates are held as
//! `Arc<Conversation>` and mutated copy-on-write, so a snapshot handed to a
//! reader never changes underneath it. The registry itself is not
//! synchronized; the router worker is its only writer.

use crate::dedup::DedupFilter;
use chrono::{DateTime, Utc};
use parley_core::conversation::{Conversation, ConversationKey, Message};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Immutable view of all conversations, in creation order.
pub type ConversationSnapshot = Arc<[Arc<Conversation>]>;

/// Result of [`ConversationRegistry::append_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Stored at this index.
    Appended { index: usize },
    /// An identical message is already stored; nothing changed.
    Duplicate,
    /// No conversation for the key.
    Missing,
}

impl AppendOutcome {
    pub fn is_appended(&self) -> bool {
        matches!(self, Self::Appended { .. })
    }
}

pub struct ConversationRegistry {
    conversations: Vec<Arc<Conversation>>,
    by_key: HashMap<ConversationKey, usize>,
    by_id: HashMap<Uuid, usize>,
    dedup: DedupFilter,
}

impl ConversationRegistry {
    pub fn new(dedup: DedupFilter) -> Self {
        Self {
            conversations: Vec::new(),
            by_key: HashMap::new(),
            by_id: HashMap::new(),
            dedup,
        }
    }

    /// Returns the conversation for `key`, creating it if needed.
    ///
    /// The hint is only used on creation. Returns the conversation id and
    /// whether it was created by this call.
    pub fn get_or_create(
        &mut self,
        key: ConversationKey,
        display_name_hint: &str,
        now: DateTime<Utc>,
    ) -> (Uuid, bool) {
        if let Some(&index) = self.by_key.get(&key) {
            return (self.conversations[index].id, false);
        }

        let conversation = Conversation::new(key, display_name_hint, now);
        let id = conversation.id;
        let index = self.conversations.len();
        self.conversations.push(Arc::new(conversation));
        self.by_key.insert(key, index);
        self.by_id.insert(id, index);
        tracing::debug!("[ConversationRegistry] Created conversation: key={}, id={}", key, id);
        (id, true)
    }

    pub fn get(&self, key: &ConversationKey) -> Option<&Arc<Conversation>> {
        self.by_key.get(key).map(|&index| &self.conversations[index])
    }

    pub fn get_by_id(&self, id: Uuid) -> Option<&Arc<Conversation>> {
        self.by_id.get(&id).map(|&index| &self.conversations[index])
    }

    pub fn key_for_id(&self, id: Uuid) -> Option<ConversationKey> {
        self.get_by_id(id).map(|conversation| conversation.key)
    }

    pub fn contains(&self, key: &ConversationKey) -> bool {
        self.by_key.contains_key(key)
    }

    /// Mutates one conversation in place (copy-on-write if a snapshot
    /// still shares it).
    pub fn update<R>(
        &mut self,
        key: &ConversationKey,
        f: impl FnOnce(&mut Conversation) -> R,
    ) -> Option<R> {
        let index = *self.by_key.get(key)?;
        Some(f(Arc::make_mut(&mut self.conversations[index])))
    }

    /// Appends `message` unless it is a duplicate.
    pub fn append_message(&mut self, key: &ConversationKey, message: Message) -> AppendOutcome {
        let Some(&index) = self.by_key.get(key) else {
            return AppendOutcome::Missing;
        };
        if self.dedup.is_duplicate(&self.conversations[index], &message) {
            tracing::trace!(
                "[ConversationRegistry] Dropped duplicate message: key={}, sender={}",
                key,
                message.sender_id
            );
            return AppendOutcome::Duplicate;
        }
        let index = Arc::make_mut(&mut self.conversations[index]).push_message(message);
        AppendOutcome::Appended { index }
    }

    /// Makes `id` the only active conversation and marks it read.
    ///
    /// Returns `false` if no such conversation exists.
    pub fn set_active(&mut self, id: Uuid) -> bool {
        let Some(&target) = self.by_id.get(&id) else {
            return false;
        };
        for (index, conversation) in self.conversations.iter_mut().enumerate() {
            if index == target {
                Arc::make_mut(conversation).activate();
            } else if conversation.is_active {
                Arc::make_mut(conversation).deactivate();
            }
        }
        true
    }

    /// Clears the unread state of `id`. Returns `false` if it does not exist.
    pub fn mark_read(&mut self, id: Uuid) -> bool {
        let Some(&index) = self.by_id.get(&id) else {
            return false;
        };
        let conversation = &mut self.conversations[index];
        if conversation.unread_count != 0 || conversation.has_unread {
            Arc::make_mut(conversation).mark_read();
        }
        true
    }

    /// Sets the session id. An existing id is replaced, never cleared.
    pub fn set_session_id(&mut self, key: &ConversationKey, session_id: Uuid) -> bool {
        let changed = self
            .get(key)
            .is_some_and(|c| c.session_id != Some(session_id));
        if changed {
            self.update(key, |c| c.set_session_id(session_id));
        }
        changed
    }

    pub fn set_display_name(&mut self, key: &ConversationKey, name: &str) -> bool {
        let name = name.trim();
        let changed = !name.is_empty() && self.get(key).is_some_and(|c| c.display_name != name);
        if changed {
            self.update(key, |c| c.display_name = name.to_string());
        }
        changed
    }

    pub fn set_status(&mut self, key: &ConversationKey, status: Option<String>) -> bool {
        let changed = self.get(key).is_some_and(|c| c.status != status);
        if changed {
            self.update(key, |c| c.status = status);
        }
        changed
    }

    pub fn keys(&self) -> impl Iterator<Item = ConversationKey> + '_ {
        self.conversations.iter().map(|conversation| conversation.key)
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        self.conversations.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    pub fn clear(&mut self) {
        self.conversations.clear();
        self.by_key.clear();
        self.by_id.clear();
    }
}

impl Default for ConversationRegistry {
    fn default() -> Self {
        Self::new(DedupFilter::default())
    }
}
