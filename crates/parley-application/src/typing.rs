//! Typing indicators.
//!
//! Remote typists live on the conversation itself (`Conversation::typing`)
//! and drive its preview line. Outbound typing, the local user's own signal,
//! is tracked here with a generation per conversation so a stale timer can
//! tell it has been superseded.

use parley_core::conversation::{Conversation, ConversationKey, Typist};
use std::collections::HashMap;
use uuid::Uuid;

/// Composes the preview line for the current typists.
pub fn compose_typing_line(names: &[String]) -> Option<String> {
    match names {
        [] => None,
        [one] => Some(format!("{} is typing…", one)),
        [first, second] => Some(format!("{} and {} are typing…", first, second)),
        [first, rest @ ..] => Some(format!("{} and {} others are typing…", first, rest.len())),
    }
}

/// Adds a remote typist, or renames one already listed.
///
/// Returns whether the conversation changed.
pub fn start_remote(conversation: &mut Conversation, agent_id: Uuid, name: &str) -> bool {
    match conversation.typing.iter_mut().find(|t| t.agent_id == agent_id) {
        Some(typist) if typist.name == name => return false,
        Some(typist) => typist.name = name.to_string(),
        None => conversation.typing.push(Typist {
            agent_id,
            name: name.to_string(),
        }),
    }
    refresh_preview(conversation);
    true
}

/// Removes a remote typist. Returns `false` if they were not listed.
pub fn stop_remote(conversation: &mut Conversation, agent_id: Uuid) -> bool {
    let before = conversation.typing.len();
    conversation.typing.retain(|t| t.agent_id != agent_id);
    if conversation.typing.len() == before {
        return false;
    }
    refresh_preview(conversation);
    true
}

fn refresh_preview(conversation: &mut Conversation) {
    let line = compose_typing_line(&conversation.typing_names());
    conversation.set_typing_preview(line);
}

pub fn clear_remote(conversation: &mut Conversation) -> bool {
    if conversation.typing.is_empty() {
        return false;
    }
    conversation.typing.clear();
    conversation.set_typing_preview(None);
    true
}

/// Result of [`TypingTracker::start_outbound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboundStart {
    /// Generation the timeout timer must present to expire this start.
    pub generation: u64,
    /// Whether the gateway needs a start signal (we were not typing yet).
    pub send_start: bool,
}

/// Timer bookkeeping for outbound typing and optional remote expiry.
#[derive(Debug, Default)]
pub struct TypingTracker {
    outbound: HashMap<ConversationKey, u64>,
    remote: HashMap<(ConversationKey, Uuid), u64>,
    next_generation: u64,
}

impl TypingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Starts or re-arms outbound typing.
    pub fn start_outbound(&mut self, key: ConversationKey) -> OutboundStart {
        let generation = self.next();
        let send_start = self.outbound.insert(key, generation).is_none();
        OutboundStart {
            generation,
            send_start,
        }
    }

    /// Stops outbound typing. Returns whether a stop must be sent.
    pub fn stop_outbound(&mut self, key: &ConversationKey) -> bool {
        self.outbound.remove(key).is_some()
    }

    /// Timer expiry. Only the latest start may expire; returns whether a
    /// stop must be sent.
    pub fn expire_outbound(&mut self, key: &ConversationKey, generation: u64) -> bool {
        if self.outbound.get(key) == Some(&generation) {
            self.outbound.remove(key);
            true
        } else {
            false
        }
    }

    /// Arms remote expiry for one typist, superseding earlier timers.
    pub fn arm_remote(&mut self, key: ConversationKey, agent_id: Uuid) -> u64 {
        let generation = self.next();
        self.remote.insert((key, agent_id), generation);
        generation
    }

    pub fn disarm_remote(&mut self, key: ConversationKey, agent_id: Uuid) {
        self.remote.remove(&(key, agent_id));
    }

    /// Whether a remote expiry timer is still current.
    pub fn expire_remote(&mut self, key: ConversationKey, agent_id: Uuid, generation: u64) -> bool {
        let entry = (key, agent_id);
        if self.remote.get(&entry) == Some(&generation) {
            self.remote.remove(&entry);
            true
        } else {
            false
        }
    }

    /// Forgets all timers. Returns the conversations that were typing
    /// outbound.
    pub fn clear(&mut self) -> Vec<ConversationKey> {
        self.remote.clear();
        self.outbound.drain().map(|(key, _)| key).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parley_core::conversation::{Message, MessageKind};
    use uuid::Uuid;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_compose_typing_line() {
        assert_eq!(compose_typing_line(&[]), None);
        assert_eq!(
            compose_typing_line(&names(&["Alice"])).as_deref(),
            Some("Alice is typing…")
        );
        assert_eq!(
            compose_typing_line(&names(&["Alice", "Bob"])).as_deref(),
            Some("Alice and Bob are typing…")
        );
        assert_eq!(
            compose_typing_line(&names(&["Alice", "Bob", "Cara"])).as_deref(),
            Some("Alice and 2 others are typing…")
        );
    }

    #[test]
    fn test_emptying_typists_restores_last_message_preview() {
        let mut conv = Conversation::new(ConversationKey::Local, "", Utc::now());
        conv.push_message(Message {
            sender_id: Uuid::new_v4(),
            sender_name: "Dan".to_string(),
            body: "see you".to_string(),
            timestamp: Utc::now(),
            kind: MessageKind::Local,
            from_self: false,
            group_id: None,
        });
        let alice = Uuid::from_u128(1);
        let bob = Uuid::from_u128(2);

        assert!(start_remote(&mut conv, alice, "Alice"));
        assert!(!start_remote(&mut conv, alice, "Alice"));
        assert!(start_remote(&mut conv, bob, "Bob"));
        assert_eq!(conv.preview, "Alice and Bob are typing…");

        assert!(stop_remote(&mut conv, alice));
        assert_eq!(conv.preview, "Bob is typing…");
        assert!(stop_remote(&mut conv, bob));
        assert_eq!(conv.preview, "see you");
        assert!(!stop_remote(&mut conv, bob));
    }

    #[test]
    fn test_restart_with_new_name_renames_typist() {
        let mut conv = Conversation::new(ConversationKey::Local, "", Utc::now());
        let ann = Uuid::from_u128(3);

        assert!(start_remote(&mut conv, ann, "ann.resident"));
        assert!(start_remote(&mut conv, ann, "Ann"));
        assert_eq!(conv.typing.len(), 1);
        assert_eq!(conv.preview, "Ann is typing…");

        assert!(stop_remote(&mut conv, ann));
        assert!(conv.typing.is_empty());
    }

    #[test]
    fn test_outbound_generations() {
        let mut tracker = TypingTracker::new();
        let key = ConversationKey::Local;
        let first = tracker.start_outbound(key);
        assert!(first.send_start);
        let second = tracker.start_outbound(key);
        assert!(!second.send_start);

        assert!(!tracker.expire_outbound(&key, first.generation));
        assert!(tracker.expire_outbound(&key, second.generation));
        assert!(!tracker.stop_outbound(&key));
    }

    #[test]
    fn test_remote_expiry_superseded_by_new_start() {
        let mut tracker = TypingTracker::new();
        let key = ConversationKey::Local;
        let alice = Uuid::from_u128(1);
        let old = tracker.arm_remote(key, alice);
        let new = tracker.arm_remote(key, alice);
        assert!(!tracker.expire_remote(key, alice, old));
        assert!(tracker.expire_remote(key, alice, new));
    }
}
