//! Spawned work: gateway requests, lookup timeouts and periodic timers.
//!
//! Every task is bound to the session token and re-enters the worker only by
//! posting a work item; none of them touch router state directly.

use super::state::RouterState;
use super::work::{WorkItem, post};
use crate::lookups::{Continuation, LookupKey, Registration};
use parley_core::{ParleyError, Result};
use parley_core::conversation::ConversationKey;
use parley_core::gateway::Gateway;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, interval_at, sleep};
use uuid::Uuid;

/// One gateway call covering one or more lookups.
enum LookupRequest {
    GroupName(Uuid),
    AvatarNames(Vec<Uuid>),
    AvatarProperties(Uuid),
}

impl LookupRequest {
    async fn send(&self, gateway: &dyn Gateway) -> Result<()> {
        match self {
            Self::GroupName(group_id) => gateway.request_group_name(*group_id).await,
            Self::AvatarNames(agent_ids) => gateway.request_avatar_names(agent_ids).await,
            Self::AvatarProperties(agent_id) => gateway.request_avatar_properties(*agent_id).await,
        }
    }
}

impl RouterState {
    /// Registers lookups and issues the ones not already in flight.
    ///
    /// Avatar name lookups issued together share one gateway request.
    pub(super) fn issue_lookups(
        &mut self,
        requests: impl IntoIterator<Item = (LookupKey, Option<Continuation<RouterState>>)>,
    ) {
        let mut names = Vec::new();
        for (key, continuation) in requests {
            let Registration::Issue { generation } = self.lookups.register(key, continuation) else {
                continue;
            };
            match key {
                LookupKey::AvatarName(_) => names.push((key, generation)),
                LookupKey::GroupName(group_id) => {
                    self.spawn_lookup(LookupRequest::GroupName(group_id), vec![(key, generation)])
                }
                LookupKey::AvatarProperties(agent_id) => self.spawn_lookup(
                    LookupRequest::AvatarProperties(agent_id),
                    vec![(key, generation)],
                ),
            }
        }
        if !names.is_empty() {
            let agent_ids = names
                .iter()
                .filter_map(|(key, _)| match key {
                    LookupKey::AvatarName(agent_id) => Some(*agent_id),
                    _ => None,
                })
                .collect();
            self.spawn_lookup(LookupRequest::AvatarNames(agent_ids), names);
        }
    }

    /// Sends one lookup request and arms its timeout.
    ///
    /// The deadline runs from before the send, so a gateway call that never
    /// returns still expires the lookup.
    fn spawn_lookup(&self, request: LookupRequest, lookups: Vec<(LookupKey, u64)>) {
        let label = lookups[0].0.to_string();
        tracing::debug!("[Router] Issuing {} lookup(s), first {}", lookups.len(), label);
        let gateway = Arc::clone(&self.gateway);
        let token = self.session_token.clone();
        let tx = self.work_tx.clone();
        let timeout = self.config.lookup_timeout();

        tokio::spawn(async move {
            let deadline = sleep(timeout);
            tokio::pin!(deadline);

            tokio::select! {
                _ = token.cancelled() => return,
                _ = &mut deadline => {
                    post(&tx, WorkItem::LookupExpired { lookups });
                    return;
                }
                result = request.send(gateway.as_ref()) => {
                    if let Err(e) = result {
                        let error = ParleyError::lookup_failed(label, e.to_string());
                        post(&tx, WorkItem::LookupFailed { lookups, error });
                        return;
                    }
                }
            }
            tokio::select! {
                _ = token.cancelled() => {}
                _ = &mut deadline => {
                    post(&tx, WorkItem::LookupExpired { lookups });
                }
            }
        });
    }

    /// Runs a fire-and-forget gateway call; failures are only logged.
    pub(super) fn spawn_gateway_call<F>(&self, operation: &'static str, call: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let token = self.session_token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                result = call => {
                    if let Err(e) = result {
                        tracing::warn!("[Router] Gateway {} failed: {}", operation, e);
                    }
                }
            }
        });
    }

    pub(super) fn request_group_members(&self, group_id: Uuid) {
        if !self.gateway.is_connected() {
            return;
        }
        let gateway = Arc::clone(&self.gateway);
        self.spawn_gateway_call("request_group_members", async move {
            gateway.request_group_members(group_id).await
        });
    }

    /// Starts the periodic membership refresh for a group, once.
    pub(super) fn arm_roster_timer(&mut self, group_id: Uuid) {
        if self.roster_timers.contains_key(&group_id) {
            return;
        }
        let token = self.session_token.child_token();
        self.roster_timers.insert(group_id, token.clone());
        let tx = self.work_tx.clone();
        let period = self.config.roster_refresh_interval();

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if !post(&tx, WorkItem::RosterTick { group_id }) {
                            break;
                        }
                    }
                }
            }
        });
    }

    pub(super) fn on_roster_tick(&mut self, group_id: Uuid) {
        if !self.registry.contains(&ConversationKey::Group(group_id)) {
            if let Some(token) = self.roster_timers.remove(&group_id) {
                token.cancel();
            }
            return;
        }
        tracing::trace!("[Router] Periodic roster refresh for group {}", group_id);
        self.request_group_members(group_id);
    }

    pub(super) fn arm_outbound_typing_timer(&self, key: ConversationKey, generation: u64) {
        let token = self.session_token.clone();
        let tx = self.work_tx.clone();
        let timeout = self.config.typing_timeout();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = sleep(timeout) => {
                    post(&tx, WorkItem::OutboundTypingExpired { key, generation });
                }
            }
        });
    }

    pub(super) fn arm_remote_typing_timer(
        &self,
        key: ConversationKey,
        agent_id: Uuid,
        generation: u64,
        expiry: Duration,
    ) {
        let token = self.session_token.clone();
        let tx = self.work_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = sleep(expiry) => {
                    post(&tx, WorkItem::RemoteTypingExpired { key, agent_id, generation });
                }
            }
        });
    }
}
