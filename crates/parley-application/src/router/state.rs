//! Router state owned by the worker task.

use super::work::{WeakWorkSender, WorkItem};
use crate::dedup::DedupFilter;
use crate::events::{EventBus, RouterEvent};
use crate::group_resolver::GroupIdentityResolver;
use crate::lookups::{Continuation, LookupKey, LookupOutcome, PendingLookups};
use crate::registry::{AppendOutcome, ConversationRegistry, ConversationSnapshot};
use crate::roster::RosterManager;
use crate::typing::{self, TypingTracker};
use chrono::Utc;
use parley_core::config::RouterConfig;
use parley_core::conversation::{ConversationKey, Message, PLACEHOLDER_NAME};
use parley_core::gateway::{Gateway, SessionIdentity};
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// All mutable router state. Only the worker task touches it.
pub(crate) struct RouterState {
    pub(super) identity: SessionIdentity,
    pub(super) config: RouterConfig,
    pub(super) gateway: Arc<dyn Gateway>,
    pub(super) registry: ConversationRegistry,
    pub(super) resolver: GroupIdentityResolver,
    pub(super) typing: TypingTracker,
    pub(super) roster: RosterManager,
    pub(super) lookups: PendingLookups<RouterState>,
    pub(super) work_tx: WeakWorkSender,
    /// Parent of every timer and request task of the current connection.
    pub(super) session_token: CancellationToken,
    pub(super) roster_timers: HashMap<Uuid, CancellationToken>,
    bus: EventBus,
    snapshots: watch::Sender<ConversationSnapshot>,
    /// Events held back until the snapshot they describe is published.
    outbox: Vec<RouterEvent>,
    dirty: bool,
}

impl RouterState {
    pub(super) fn new(
        identity: SessionIdentity,
        config: RouterConfig,
        gateway: Arc<dyn Gateway>,
        bus: EventBus,
        snapshots: watch::Sender<ConversationSnapshot>,
        work_tx: WeakWorkSender,
    ) -> Self {
        Self {
            registry: ConversationRegistry::new(DedupFilter::new(config.dedup_linear_scan_limit)),
            resolver: GroupIdentityResolver::new(config.pending_group_queue_cap),
            typing: TypingTracker::new(),
            roster: RosterManager::new(),
            lookups: PendingLookups::new(),
            session_token: CancellationToken::new(),
            roster_timers: HashMap::new(),
            outbox: Vec::new(),
            dirty: false,
            identity,
            config,
            gateway,
            work_tx,
            bus,
            snapshots,
        }
    }

    /// Processes one work item, then publishes what it changed.
    pub(super) fn handle(&mut self, item: WorkItem) -> ControlFlow<()> {
        let flow = match item {
            WorkItem::Inbound { event, received_at } => {
                self.on_inbound(event, received_at);
                ControlFlow::Continue(())
            }
            WorkItem::Command(command) => {
                self.on_command(command);
                ControlFlow::Continue(())
            }
            WorkItem::LookupFailed { lookups, error } => {
                let reason = error.to_string();
                for (key, generation) in lookups {
                    self.expire_lookup(key, generation, LookupOutcome::Failed(reason.clone()));
                }
                ControlFlow::Continue(())
            }
            WorkItem::LookupExpired { lookups } => {
                for (key, generation) in lookups {
                    self.expire_lookup(key, generation, LookupOutcome::TimedOut);
                }
                ControlFlow::Continue(())
            }
            WorkItem::RosterTick { group_id } => {
                self.on_roster_tick(group_id);
                ControlFlow::Continue(())
            }
            WorkItem::OutboundTypingExpired { key, generation } => {
                self.on_outbound_typing_expired(key, generation);
                ControlFlow::Continue(())
            }
            WorkItem::RemoteTypingExpired {
                key,
                agent_id,
                generation,
            } => {
                self.on_remote_typing_expired(key, agent_id, generation);
                ControlFlow::Continue(())
            }
            WorkItem::SendFinished(completion) => {
                self.on_send_finished(completion);
                ControlFlow::Continue(())
            }
            WorkItem::Flush(reply) => {
                self.respond(reply, ());
                ControlFlow::Continue(())
            }
            WorkItem::Shutdown(reply) => {
                self.teardown("shutdown");
                self.publish();
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        };
        self.publish();
        flow
    }

    // ---- change notification ----

    pub(super) fn emit(&mut self, event: RouterEvent) {
        self.dirty = true;
        self.outbox.push(event);
    }

    fn publish(&mut self) {
        if self.dirty {
            self.snapshots.send_replace(self.registry.snapshot());
            self.dirty = false;
        }
        for event in self.outbox.drain(..) {
            self.bus.publish(event);
        }
    }

    /// Answers a caller once the changes it caused are visible.
    pub(super) fn respond<T>(&mut self, reply: oneshot::Sender<T>, value: T) {
        self.publish();
        let _ = reply.send(value);
    }

    pub(super) fn conversation_id(&self, key: &ConversationKey) -> Option<Uuid> {
        self.registry.get(key).map(|conversation| conversation.id)
    }

    pub(super) fn emit_updated(&mut self, key: &ConversationKey) {
        if let Some(id) = self.conversation_id(key) {
            self.emit(RouterEvent::ConversationUpdated { id });
        }
    }

    pub(super) fn emit_roster_changed(&mut self, key: &ConversationKey) {
        if let Some(id) = self.conversation_id(key) {
            self.emit(RouterEvent::RosterChanged { id });
        }
    }

    pub(super) fn emit_typing_changed(&mut self, key: &ConversationKey) {
        if let Some(conversation) = self.registry.get(key) {
            let event = RouterEvent::TypingChanged {
                id: conversation.id,
                typing: conversation.typing_names(),
            };
            self.emit(event);
        }
    }

    // ---- registry helpers ----

    /// Returns the conversation id for `key`, creating the conversation
    /// with `name_hint` if it does not exist yet.
    pub(super) fn ensure_conversation(&mut self, key: ConversationKey, name_hint: &str) -> Uuid {
        let (id, created) = self.registry.get_or_create(key, name_hint, Utc::now());
        if created {
            self.emit(RouterEvent::ConversationCreated { id, key });
        }
        id
    }

    /// Appends through the dedup filter and reports the change.
    pub(super) fn append(&mut self, key: ConversationKey, message: Message) -> AppendOutcome {
        let unread_before = self.registry.get(&key).map(|c| c.unread_count);
        let outcome = self.registry.append_message(&key, message);
        if let AppendOutcome::Appended { index } = outcome {
            if let Some(conversation) = self.registry.get(&key) {
                let id = conversation.id;
                let unread_count = conversation.unread_count;
                self.emit(RouterEvent::MessageAppended { id, index });
                if unread_before != Some(unread_count) {
                    self.emit(RouterEvent::UnreadChanged { id, unread_count });
                }
            }
        }
        outcome
    }

    pub(super) fn set_status(&mut self, key: &ConversationKey, status: Option<String>) {
        if self.registry.set_status(key, status) {
            self.emit_updated(key);
        }
    }

    /// Best available name for a sender: cached display name, then the
    /// name the event carried, then the placeholder.
    pub(super) fn sender_name(&self, agent_id: Uuid, given: &str) -> String {
        if let Some(name) = self.roster.display_name(agent_id) {
            return name.to_string();
        }
        if !given.trim().is_empty() {
            return given.to_string();
        }
        PLACEHOLDER_NAME.to_string()
    }

    // ---- lookups ----

    /// Runs the continuations of a lookup that failed or timed out, if it is
    /// still the one that was issued.
    fn expire_lookup(&mut self, key: LookupKey, generation: u64, outcome: LookupOutcome) {
        let Some(continuations) = self.lookups.expire(&key, generation) else {
            return;
        };
        tracing::warn!(
            "[Router] Lookup {} did not complete: {}",
            key,
            outcome.failure_reason().unwrap_or("unknown")
        );
        self.run_continuations(continuations, &outcome);
    }

    pub(super) fn run_continuations(
        &mut self,
        continuations: Vec<Continuation<RouterState>>,
        outcome: &LookupOutcome,
    ) {
        for continuation in continuations {
            continuation(self, outcome);
        }
    }

    // ---- lifecycle ----

    /// Stops everything tied to the current connection: pending lookups,
    /// queued group messages, timers and typing state. Conversations stay.
    pub(super) fn teardown(&mut self, reason: &str) {
        self.session_token.cancel();
        self.session_token = CancellationToken::new();
        self.roster_timers.clear();

        let cancelled = self.lookups.cancel_all();
        self.resolver.clear_pending();
        self.typing.clear();

        let typing_keys: Vec<_> = self
            .registry
            .keys()
            .filter(|key| {
                self.registry
                    .get(key)
                    .is_some_and(|conversation| !conversation.typing.is_empty())
            })
            .collect();
        for key in typing_keys {
            self.registry.update(&key, typing::clear_remote);
            self.emit_typing_changed(&key);
        }

        tracing::info!(
            "[Router] Session teardown ({}): cancelled {} lookup(s)",
            reason,
            cancelled
        );
    }

    /// Teardown plus dropping every conversation and cache.
    pub(super) fn reset_session(&mut self) {
        self.teardown("session reset");
        self.registry.clear();
        self.resolver.reset();
        self.roster.clear();
        self.emit(RouterEvent::SessionReset);
        tracing::info!("[Router] Session reset");
    }

    /// Re-arms periodic roster refresh and refreshes every group now.
    pub(super) fn on_connected(&mut self) {
        let groups: Vec<Uuid> = self
            .registry
            .keys()
            .filter_map(|key| key.group_id())
            .collect();
        tracing::info!("[Router] Connected, refreshing {} group roster(s)", groups.len());
        for group_id in groups {
            self.arm_roster_timer(group_id);
            self.request_group_members(group_id);
        }
    }
}
