//! A gateway that talks to nothing.
//!
//! Outbound calls are logged and succeed. Lookups are never answered, so the
//! replayed script has to carry the `name_resolved` events itself.

use async_trait::async_trait;
use parley_core::Result;
use parley_core::gateway::{Gateway, TypingTarget};
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

pub struct LoopbackGateway {
    connected: AtomicBool,
}

impl LoopbackGateway {
    pub fn new(connected: bool) -> Self {
        Self {
            connected: AtomicBool::new(connected),
        }
    }
}

#[async_trait]
impl Gateway for LoopbackGateway {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    async fn send_local_chat(&self, text: &str, channel: i32) -> Result<()> {
        tracing::info!("[Loopback] local chat on channel {}: {}", channel, text);
        Ok(())
    }

    async fn send_direct_message(&self, target: Uuid, text: &str) -> Result<()> {
        tracing::info!("[Loopback] direct message to {}: {}", target, text);
        Ok(())
    }

    async fn send_group_message(&self, session_id: Uuid, text: &str) -> Result<()> {
        tracing::info!("[Loopback] group message to session {}: {}", session_id, text);
        Ok(())
    }

    async fn send_typing(&self, target: TypingTarget, typing: bool) -> Result<()> {
        tracing::debug!("[Loopback] typing={} for {:?}", typing, target);
        Ok(())
    }

    async fn request_group_name(&self, group_id: Uuid) -> Result<()> {
        tracing::debug!("[Loopback] group name requested: {}", group_id);
        Ok(())
    }

    async fn request_avatar_names(&self, agent_ids: &[Uuid]) -> Result<()> {
        tracing::debug!("[Loopback] {} avatar name(s) requested", agent_ids.len());
        Ok(())
    }

    async fn request_avatar_properties(&self, agent_id: Uuid) -> Result<()> {
        tracing::debug!("[Loopback] avatar properties requested: {}", agent_id);
        Ok(())
    }

    async fn request_group_members(&self, group_id: Uuid) -> Result<()> {
        tracing::debug!("[Loopback] group members requested: {}", group_id);
        Ok(())
    }
}
