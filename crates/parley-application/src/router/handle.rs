//! Cloneable handle to a running router.

use super::work::{Command, WorkItem, WorkSender};
use crate::events::{EventBus, EventReceiver};
use crate::gate::IngestionGate;
use crate::registry::ConversationSnapshot;
use parley_core::Result;
use parley_core::conversation::{Conversation, ConversationKey};
use parley_core::event::RawEvent;
use parley_core::gateway::SendOutcome;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use uuid::Uuid;

/// Entry point for gateway adapters and the UI.
///
/// Reads come from the latest published snapshot and never wait on the
/// worker. Commands are queued behind any pending events; if the router has
/// stopped they resolve to a neutral answer instead of an error.
#[derive(Clone)]
pub struct RouterHandle {
    tx: WorkSender,
    gate: IngestionGate,
    bus: EventBus,
    snapshots: watch::Receiver<ConversationSnapshot>,
}

impl RouterHandle {
    pub(super) fn new(
        tx: WorkSender,
        bus: EventBus,
        snapshots: watch::Receiver<ConversationSnapshot>,
    ) -> Self {
        Self {
            gate: IngestionGate::new(tx.clone()),
            tx,
            bus,
            snapshots,
        }
    }

    /// A gate for handing to the gateway adapter.
    pub fn gate(&self) -> IngestionGate {
        self.gate.clone()
    }

    pub fn ingest(&self, raw: RawEvent) -> Result<()> {
        self.gate.ingest(raw)
    }

    pub fn ingest_json(&self, json: &str) -> Result<()> {
        self.gate.ingest_json(json)
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.bus.subscribe()
    }

    pub fn watch_conversations(&self) -> watch::Receiver<ConversationSnapshot> {
        self.snapshots.clone()
    }

    /// All conversations, in creation order.
    pub fn conversations(&self) -> ConversationSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn conversation(&self, id: Uuid) -> Option<Arc<Conversation>> {
        self.snapshots.borrow().iter().find(|c| c.id == id).cloned()
    }

    pub fn conversation_by_key(&self, key: &ConversationKey) -> Option<Arc<Conversation>> {
        self.snapshots.borrow().iter().find(|c| c.key == *key).cloned()
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Option<T> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(WorkItem::Command(command(reply))).ok()?;
        rx.await.ok()
    }

    /// Makes `id` the active conversation. Returns `false` if unknown.
    pub async fn select_conversation(&self, id: Uuid) -> bool {
        self.request(|reply| Command::Select { id, reply })
            .await
            .unwrap_or(false)
    }

    pub async fn send_message(&self, id: Uuid, text: impl Into<String>) -> SendOutcome {
        let text = text.into();
        self.request(|reply| Command::Send { id, text, reply })
            .await
            .unwrap_or_else(|| SendOutcome::Failed("router stopped".to_string()))
    }

    pub async fn mark_read(&self, id: Uuid) -> bool {
        self.request(|reply| Command::MarkRead { id, reply })
            .await
            .unwrap_or(false)
    }

    /// Opens a direct-message conversation, creating it if needed.
    pub async fn open_direct_message(&self, agent_id: Uuid, name_hint: Option<&str>) -> Option<Uuid> {
        let name_hint = name_hint.map(str::to_string);
        self.request(|reply| Command::OpenDirectMessage {
            agent_id,
            name_hint,
            reply,
        })
        .await
    }

    pub async fn start_typing(&self, id: Uuid) -> bool {
        self.request(|reply| Command::StartTyping { id, reply })
            .await
            .unwrap_or(false)
    }

    pub async fn stop_typing(&self, id: Uuid) -> bool {
        self.request(|reply| Command::StopTyping { id, reply })
            .await
            .unwrap_or(false)
    }

    /// Drops all conversations and cancels everything in flight.
    pub async fn reset_session(&self) {
        self.request(|reply| Command::ResetSession { reply }).await;
    }

    /// Waits until everything queued so far has been processed.
    pub async fn flush(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(WorkItem::Flush(reply)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Stops the worker. Later calls on any clone become no-ops.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(WorkItem::Shutdown(reply)).is_ok() {
            let _ = rx.await;
        }
    }
}
