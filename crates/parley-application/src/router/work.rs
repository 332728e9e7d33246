//! Work items consumed by the router worker.

use crate::lookups::LookupKey;
use chrono::{DateTime, Utc};
use parley_core::{ParleyError, Result};
use parley_core::conversation::ConversationKey;
use parley_core::event::InboundEvent;
use parley_core::gateway::SendOutcome;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

pub(crate) type WorkSender = mpsc::UnboundedSender<WorkItem>;
pub(crate) type WeakWorkSender = mpsc::WeakUnboundedSender<WorkItem>;

/// Everything that mutates router state arrives as one of these, in order.
pub(crate) enum WorkItem {
    Inbound {
        event: InboundEvent,
        received_at: DateTime<Utc>,
    },
    Command(Command),
    /// The gateway rejected a lookup request.
    LookupFailed {
        lookups: Vec<(LookupKey, u64)>,
        error: ParleyError,
    },
    /// No answer within the lookup timeout.
    LookupExpired { lookups: Vec<(LookupKey, u64)> },
    RosterTick { group_id: Uuid },
    OutboundTypingExpired {
        key: ConversationKey,
        generation: u64,
    },
    RemoteTypingExpired {
        key: ConversationKey,
        agent_id: Uuid,
        generation: u64,
    },
    SendFinished(SendCompletion),
    /// Barrier: answered once everything queued before it is processed.
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// UI commands. Each carries the channel its answer goes back on.
pub(crate) enum Command {
    Select {
        id: Uuid,
        reply: oneshot::Sender<bool>,
    },
    MarkRead {
        id: Uuid,
        reply: oneshot::Sender<bool>,
    },
    Send {
        id: Uuid,
        text: String,
        reply: oneshot::Sender<SendOutcome>,
    },
    OpenDirectMessage {
        agent_id: Uuid,
        name_hint: Option<String>,
        reply: oneshot::Sender<Uuid>,
    },
    StartTyping {
        id: Uuid,
        reply: oneshot::Sender<bool>,
    },
    StopTyping {
        id: Uuid,
        reply: oneshot::Sender<bool>,
    },
    ResetSession {
        reply: oneshot::Sender<()>,
    },
}

/// A gateway send that has returned.
pub(crate) struct SendCompletion {
    pub key: ConversationKey,
    pub text: String,
    pub sent_at: DateTime<Utc>,
    pub result: Result<()>,
    pub reply: oneshot::Sender<SendOutcome>,
}

/// Posts from a spawned task. Returns `false` once the worker is gone.
pub(crate) fn post(tx: &WeakWorkSender, item: WorkItem) -> bool {
    match tx.upgrade() {
        Some(tx) => tx.send(item).is_ok(),
        None => false,
    }
}
