//! Conversation domain module.
//!
//! # Module Structure
//!
//! - `key`: conversation identity (`ConversationKind`, `ConversationKey`)
//! - `message`: message types and the dedup key
//! - `participant`: roster entries, typists and positions
//! - `model`: the `Conversation` aggregate

mod key;
mod message;
mod model;
mod participant;

pub use key::{ConversationKey, ConversationKind};
pub use message::{DedupKey, Message, MessageKind};
pub use model::Conversation;
pub use participant::{PLACEHOLDER_NAME, Participant, Position, Typist};
