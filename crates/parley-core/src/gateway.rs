//! Gateway port.
//!
//! The gateway owns the wire protocol to the virtual world. The router only
//! needs the outbound operations below; inbound traffic reaches it as
//! [`RawEvent`](crate::event::RawEvent)s pushed through the ingestion gate.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The local user for the current login session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub agent_id: Uuid,
    pub name: String,
}

impl SessionIdentity {
    pub fn new(agent_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            agent_id,
            name: name.into(),
        }
    }
}

/// Destination of an outbound typing signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypingTarget {
    Local,
    DirectMessage { agent_id: Uuid },
    Group { session_id: Uuid },
}

/// Result of a send request, as reported to the UI.
///
/// Sends never fail with an error across the UI boundary; every outcome is a
/// value the UI can show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum SendOutcome {
    Sent,
    /// The gateway reported itself disconnected; nothing was sent.
    NotConnected,
    UnknownConversation,
    /// Group conversation whose session id is not known yet.
    NoSession,
    /// The conversation kind does not accept outbound messages.
    Unsupported,
    /// Blank message text.
    Empty,
    Failed(String),
}

impl SendOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }

    /// Status line to attach to the conversation, if any.
    pub fn status_text(&self) -> Option<String> {
        match self {
            Self::Sent | Self::Empty | Self::UnknownConversation => None,
            Self::NotConnected => Some("Not connected".to_string()),
            Self::NoSession => Some("Group session not ready".to_string()),
            Self::Unsupported => Some("Cannot send to this conversation".to_string()),
            Self::Failed(reason) => Some(format!("Send failed: {}", reason)),
        }
    }
}

/// Outbound operations of the virtual-world messaging gateway.
///
/// Implementations must not block: lookups are fire-and-forget and their
/// answers come back as inbound events. The router applies its own timeout to
/// every lookup.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Whether the gateway currently has a live simulator connection.
    fn is_connected(&self) -> bool;

    async fn send_local_chat(&self, text: &str, channel: i32) -> Result<()>;

    async fn send_direct_message(&self, target: Uuid, text: &str) -> Result<()>;

    async fn send_group_message(&self, session_id: Uuid, text: &str) -> Result<()>;

    async fn send_typing(&self, target: TypingTarget, typing: bool) -> Result<()>;

    /// Asks for a group's name. Answered by a `name_resolved` event.
    async fn request_group_name(&self, group_id: Uuid) -> Result<()>;

    /// Asks for avatar display names. Answered by `name_resolved` events.
    async fn request_avatar_names(&self, agent_ids: &[Uuid]) -> Result<()>;

    /// Answered by an `avatar_properties` event.
    async fn request_avatar_properties(&self, agent_id: Uuid) -> Result<()>;

    /// Answered by a `group_members` snapshot.
    async fn request_group_members(&self, group_id: Uuid) -> Result<()>;
}
