//! Conversation routing engine for Parley.
//!
//! Turns the gateway's event stream into a registry of conversations (local
//! chat, direct messages, group sessions, object and system messages) that a
//! UI can render, and routes the user's outbound actions back to the gateway.
//!
//! # Module Structure
//!
//! - `gate` - Validation and classification of raw gateway events
//! - `dedup` - Duplicate message detection
//! - `registry` - Conversation storage and snapshots
//! - `group_resolver` - Group identity resolution with ordered replay
//! - `lookups` - Pending identity lookups and their continuations
//! - `roster` - Participant rosters and the name/profile cache
//! - `typing` - Remote and outbound typing indicators
//! - `events` - Change notifications for UI adapters
//! - `router` - The single-writer worker and its public handle

pub mod dedup;
pub mod events;
pub mod gate;
pub mod group_resolver;
pub mod lookups;
pub mod registry;
pub mod roster;
pub mod router;
pub mod typing;

pub use events::{EventBus, EventReceiver, RouterEvent};
pub use gate::{IngestionGate, classify};
pub use registry::{AppendOutcome, ConversationRegistry, ConversationSnapshot};
pub use router::{Router, RouterHandle};
