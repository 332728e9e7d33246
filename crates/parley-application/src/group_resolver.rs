//! Group identity resolution.
//!
//! A group message can arrive before the client knows the group's name. Such
//! messages are parked per group key in arrival order; when the name resolves
//! they are handed back for delivery in exactly that order.
//!
//! Each group key moves through `Unknown -> InFlight -> Resolved`. Failure
//! returns the key to `Unknown` and keeps its queue, so the next message for
//! the group triggers a fresh request.

use chrono::{DateTime, Utc};
use parley_core::event::GroupMessageEvent;
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupState {
    Unknown,
    InFlight,
    Resolved { name: String },
}

/// A group message waiting for its group to resolve.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingGroupEvent {
    pub event: GroupMessageEvent,
    pub received_at: DateTime<Utc>,
}

/// What to do with an incoming group message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The group is resolved; deliver the message now.
    Deliver { name: String },
    /// The message was queued. `issue_request` is set when the caller must
    /// send the name request (no request was in flight).
    Queued { issue_request: bool },
}

/// A completed resolution, with the queued messages to replay in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub group_id: Uuid,
    pub name: String,
    pub session_id: Option<Uuid>,
    pub drained: Vec<PendingGroupEvent>,
}

pub struct GroupIdentityResolver {
    states: HashMap<Uuid, GroupState>,
    queues: HashMap<Uuid, VecDeque<PendingGroupEvent>>,
    /// Session ids learned before the group's name.
    session_hints: HashMap<Uuid, Uuid>,
    queue_cap: usize,
}

impl GroupIdentityResolver {
    pub fn new(queue_cap: usize) -> Self {
        Self {
            states: HashMap::new(),
            queues: HashMap::new(),
            session_hints: HashMap::new(),
            queue_cap: queue_cap.max(1),
        }
    }

    pub fn state(&self, group_id: Uuid) -> GroupState {
        self.states
            .get(&group_id)
            .cloned()
            .unwrap_or(GroupState::Unknown)
    }

    pub fn resolved_name(&self, group_id: Uuid) -> Option<&str> {
        match self.states.get(&group_id) {
            Some(GroupState::Resolved { name }) => Some(name),
            _ => None,
        }
    }

    pub fn pending_len(&self, group_id: Uuid) -> usize {
        self.queues.get(&group_id).map_or(0, VecDeque::len)
    }

    /// Delivers or queues a group message.
    pub fn admit(&mut self, event: GroupMessageEvent, received_at: DateTime<Utc>) -> Admission {
        let group_id = event.group_id;
        if let Some(name) = self.resolved_name(group_id) {
            return Admission::Deliver {
                name: name.to_string(),
            };
        }

        let queue = self.queues.entry(group_id).or_default();
        if queue.len() >= self.queue_cap {
            queue.pop_front();
            tracing::warn!(
                "[GroupResolver] Pending queue for group {} is full ({}), dropped oldest message",
                group_id,
                self.queue_cap
            );
        }
        queue.push_back(PendingGroupEvent { event, received_at });

        Admission::Queued {
            issue_request: self.begin(group_id),
        }
    }

    /// Marks a name request as in flight. Returns `false` if one already is,
    /// or the group is already resolved.
    pub fn begin(&mut self, group_id: Uuid) -> bool {
        match self.states.get(&group_id) {
            Some(GroupState::InFlight) | Some(GroupState::Resolved { .. }) => false,
            _ => {
                self.states.insert(group_id, GroupState::InFlight);
                tracing::debug!("[GroupResolver] Requesting name for group {}", group_id);
                true
            }
        }
    }

    /// Remembers a session id for a group whose name is still unknown.
    pub fn note_session(&mut self, group_id: Uuid, session_id: Uuid) {
        self.session_hints.insert(group_id, session_id);
    }

    /// Resolves a group and drains its queue.
    ///
    /// The session id is taken from `session_id`, else a previously noted
    /// session, else the first queued message.
    pub fn resolve(
        &mut self,
        group_id: Uuid,
        name: impl Into<String>,
        session_id: Option<Uuid>,
    ) -> Resolution {
        let name = name.into();
        let drained: Vec<_> = self
            .queues
            .remove(&group_id)
            .map(Vec::from)
            .unwrap_or_default();
        let hint = self.session_hints.remove(&group_id);
        let session_id = session_id.or(hint).or_else(|| {
            drained
                .first()
                .and_then(|pending| pending.event.effective_session_id())
        });

        self.states.insert(
            group_id,
            GroupState::Resolved {
                name: name.clone(),
            },
        );
        tracing::debug!(
            "[GroupResolver] Resolved group {} as '{}', replaying {} message(s)",
            group_id,
            name,
            drained.len()
        );

        Resolution {
            group_id,
            name,
            session_id,
            drained,
        }
    }

    /// Records a failed or timed-out request. The queue is kept.
    ///
    /// Returns the number of messages still waiting.
    pub fn fail(&mut self, group_id: Uuid, reason: &str) -> usize {
        if matches!(self.states.get(&group_id), Some(GroupState::InFlight)) {
            self.states.insert(group_id, GroupState::Unknown);
        }
        let waiting = self.pending_len(group_id);
        tracing::warn!(
            "[GroupResolver] Name lookup for group {} failed: {} ({} message(s) waiting)",
            group_id,
            reason,
            waiting
        );
        waiting
    }

    /// Drops queued messages and in-flight markers on teardown.
    /// Resolved names are kept.
    pub fn clear_pending(&mut self) {
        self.queues.clear();
        self.session_hints.clear();
        self.states
            .retain(|_, state| matches!(state, GroupState::Resolved { .. }));
    }

    /// Forgets everything.
    pub fn reset(&mut self) {
        self.states.clear();
        self.queues.clear();
        self.session_hints.clear();
    }
}

impl Default for GroupIdentityResolver {
    fn default() -> Self {
        Self::new(200)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(group_id: Uuid, body: &str) -> GroupMessageEvent {
        GroupMessageEvent {
            group_id,
            session_id: None,
            group_im: false,
            from_id: Uuid::new_v4(),
            from_name: "Ada".to_string(),
            body: body.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_first_message_issues_exactly_one_request() {
        let mut resolver = GroupIdentityResolver::default();
        let group = Uuid::new_v4();
        assert_eq!(
            resolver.admit(event(group, "m1"), Utc::now()),
            Admission::Queued {
                issue_request: true
            }
        );
        assert_eq!(
            resolver.admit(event(group, "m2"), Utc::now()),
            Admission::Queued {
                issue_request: false
            }
        );
        assert_eq!(resolver.state(group), GroupState::InFlight);
        assert_eq!(resolver.pending_len(group), 2);
    }

    #[test]
    fn test_resolve_drains_in_fifo_order() {
        let mut resolver = GroupIdentityResolver::default();
        let group = Uuid::new_v4();
        for body in ["m1", "m2", "m3"] {
            resolver.admit(event(group, body), Utc::now());
        }
        let resolution = resolver.resolve(group, "Builders", None);
        let bodies: Vec<_> = resolution
            .drained
            .iter()
            .map(|p| p.event.body.as_str())
            .collect();
        assert_eq!(bodies, ["m1", "m2", "m3"]);
        assert_eq!(resolver.pending_len(group), 0);
        assert_eq!(
            resolver.admit(event(group, "m4"), Utc::now()),
            Admission::Deliver {
                name: "Builders".to_string()
            }
        );
    }

    #[test]
    fn test_session_id_falls_back_to_first_queued_event() {
        let mut resolver = GroupIdentityResolver::default();
        let group = Uuid::new_v4();
        let session = Uuid::new_v4();

        let mut first = event(group, "m1");
        first.group_im = true;
        first.session_id = Some(session);
        resolver.admit(first, Utc::now());
        resolver.admit(event(group, "m2"), Utc::now());

        let resolution = resolver.resolve(group, "Builders", None);
        assert_eq!(resolution.session_id, Some(session));
    }

    #[test]
    fn test_session_id_is_group_key_without_group_im() {
        let mut resolver = GroupIdentityResolver::default();
        let group = Uuid::new_v4();
        resolver.admit(event(group, "m1"), Utc::now());
        assert_eq!(resolver.resolve(group, "Builders", None).session_id, Some(group));
    }

    #[test]
    fn test_failure_keeps_queue_and_allows_retry() {
        let mut resolver = GroupIdentityResolver::default();
        let group = Uuid::new_v4();
        resolver.admit(event(group, "m1"), Utc::now());
        assert_eq!(resolver.fail(group, "timeout"), 1);
        assert_eq!(resolver.state(group), GroupState::Unknown);

        assert_eq!(
            resolver.admit(event(group, "m2"), Utc::now()),
            Admission::Queued {
                issue_request: true
            }
        );
        let resolution = resolver.resolve(group, "Builders", None);
        assert_eq!(resolution.drained.len(), 2);
    }

    #[test]
    fn test_queue_cap_drops_oldest() {
        let mut resolver = GroupIdentityResolver::new(2);
        let group = Uuid::new_v4();
        for body in ["m1", "m2", "m3"] {
            resolver.admit(event(group, body), Utc::now());
        }
        let resolution = resolver.resolve(group, "Builders", None);
        let bodies: Vec<_> = resolution
            .drained
            .iter()
            .map(|p| p.event.body.as_str())
            .collect();
        assert_eq!(bodies, ["m2", "m3"]);
    }

    #[test]
    fn test_clear_pending_keeps_resolved_names() {
        let mut resolver = GroupIdentityResolver::default();
        let resolved = Uuid::new_v4();
        let pending = Uuid::new_v4();
        resolver.admit(event(resolved, "a"), Utc::now());
        resolver.resolve(resolved, "Builders", None);
        resolver.admit(event(pending, "b"), Utc::now());

        resolver.clear_pending();
        assert_eq!(resolver.resolved_name(resolved), Some("Builders"));
        assert_eq!(resolver.state(pending), GroupState::Unknown);
        assert_eq!(resolver.pending_len(pending), 0);
    }
}
