//! Duplicate message detection.

use parley_core::conversation::{Conversation, Message};

/// Rejects messages already stored in a conversation.
///
/// Small conversations are scanned newest-first; larger ones use the dedup
/// index the conversation maintains on append.
#[derive(Debug, Clone, Copy)]
pub struct DedupFilter {
    linear_scan_limit: usize,
}

impl DedupFilter {
    pub fn new(linear_scan_limit: usize) -> Self {
        Self { linear_scan_limit }
    }

    /// Whether `message` matches a stored message on sender, body, kind and
    /// timestamp. Never mutates the conversation.
    pub fn is_duplicate(&self, conversation: &Conversation, message: &Message) -> bool {
        if conversation.messages.len() < self.linear_scan_limit {
            conversation.messages.iter().rev().any(|stored| {
                stored.sender_id == message.sender_id
                    && stored.kind == message.kind
                    && stored.timestamp == message.timestamp
                    && stored.body == message.body
            })
        } else {
            conversation.contains_dedup_key(&message.dedup_key())
        }
    }
}

impl Default for DedupFilter {
    fn default() -> Self {
        Self::new(32)
    }
}
