//! Domain model for the Parley conversation router.
//!
//! Conversations, messages, participants, the gateway events that feed them
//! and the `Gateway` port the router talks back through.

pub mod config;
pub mod conversation;
pub mod error;
pub mod event;
pub mod gateway;

// Re-export common error type
pub use error::{ParleyError, Result};
