//! The conversation router.
//!
//! A single worker task owns all conversation state. Gateway events (through
//! the [`IngestionGate`](crate::gate::IngestionGate)), UI commands, timer
//! expiries and lookup completions are all queued onto one channel and
//! applied in arrival order. After each item the worker publishes a fresh
//! snapshot and then broadcasts the change events that describe it.
//!
//! # Module Structure
//!
//! - `work` - Work items and the channel types that carry them
//! - `state` - Router state, publishing and session lifecycle
//! - `inbound` - Handling of classified gateway events
//! - `commands` - UI commands and outbound sends
//! - `timers` - Spawned lookups, timeouts and periodic refresh
//! - `handle` - [`RouterHandle`], the public entry point

mod commands;
mod handle;
mod inbound;
mod state;
mod timers;
pub(crate) mod work;

pub use handle::RouterHandle;

use parley_core::config::RouterConfig;
use parley_core::gateway::{Gateway, SessionIdentity};
use state::RouterState;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use work::WorkItem;

use crate::events::EventBus;
use crate::registry::ConversationSnapshot;

/// Starts conversation routers.
pub struct Router;

impl Router {
    /// Spawns the worker for one logged-in session and returns its handle.
    ///
    /// Must be called from within a Tokio runtime. The worker stops on
    /// [`RouterHandle::shutdown`] or once every handle and gate is dropped.
    pub fn spawn(
        identity: SessionIdentity,
        config: RouterConfig,
        gateway: Arc<dyn Gateway>,
    ) -> RouterHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let bus = EventBus::new(config.event_channel_capacity);
        let empty: ConversationSnapshot = Arc::from(Vec::new());
        let (snapshot_tx, snapshot_rx) = watch::channel(empty);

        tracing::info!(
            "[Router] Starting for {} ({})",
            identity.name,
            identity.agent_id
        );
        let state = RouterState::new(
            identity,
            config,
            gateway,
            bus.clone(),
            snapshot_tx,
            tx.downgrade(),
        );
        tokio::spawn(run(state, rx));

        RouterHandle::new(tx, bus, snapshot_rx)
    }
}

async fn run(mut state: RouterState, mut rx: mpsc::UnboundedReceiver<WorkItem>) {
    while let Some(item) = rx.recv().await {
        if let ControlFlow::Break(()) = state.handle(item) {
            break;
        }
    }
    state.session_token.cancel();
    tracing::info!("[Router] Worker stopped");
}

#[cfg(test)]
#[path = "router_test.rs"]
mod tests;
