//! Pending identity lookups.
//!
//! Every outstanding gateway lookup is keyed by what it asks for. Callers
//! attach completion continuations to the key; the first caller also gets to
//! issue the request, later callers join it. When the answer, a failure or
//! the timeout arrives, the entry is removed and each continuation runs
//! exactly once against the router state.

use parley_core::event::{AvatarName, AvatarProperties};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKey {
    GroupName(Uuid),
    AvatarName(Uuid),
    AvatarProperties(Uuid),
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GroupName(id) => write!(f, "group-name:{}", id),
            Self::AvatarName(id) => write!(f, "avatar-name:{}", id),
            Self::AvatarProperties(id) => write!(f, "avatar-properties:{}", id),
        }
    }
}

/// What a continuation is completed with.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    GroupName {
        name: String,
        session_id: Option<Uuid>,
    },
    AvatarName(AvatarName),
    AvatarProperties(AvatarProperties),
    Failed(String),
    TimedOut,
}

impl LookupOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_) | Self::TimedOut)
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Failed(reason) => Some(reason),
            Self::TimedOut => Some("timed out"),
            _ => None,
        }
    }
}

pub type Continuation<S> = Box<dyn FnOnce(&mut S, &LookupOutcome) + Send>;

/// Result of [`PendingLookups::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// No lookup was pending: the caller must issue it, tagged with this
    /// generation.
    Issue { generation: u64 },
    /// Joined a lookup already in flight.
    Joined,
}

struct PendingEntry<S> {
    generation: u64,
    continuations: Vec<Continuation<S>>,
}

pub struct PendingLookups<S> {
    entries: HashMap<LookupKey, PendingEntry<S>>,
    next_generation: u64,
}

impl<S> PendingLookups<S> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_generation: 0,
        }
    }

    pub fn register(&mut self, key: LookupKey, continuation: Option<Continuation<S>>) -> Registration {
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.continuations.extend(continuation);
            return Registration::Joined;
        }
        self.next_generation += 1;
        let generation = self.next_generation;
        self.entries.insert(
            key,
            PendingEntry {
                generation,
                continuations: continuation.into_iter().collect(),
            },
        );
        Registration::Issue { generation }
    }

    pub fn is_pending(&self, key: &LookupKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Removes the entry for an answered lookup, returning its
    /// continuations. Empty if nothing was pending.
    pub fn complete(&mut self, key: &LookupKey) -> Vec<Continuation<S>> {
        self.entries
            .remove(key)
            .map(|entry| entry.continuations)
            .unwrap_or_default()
    }

    /// Removes the entry if it is still the request tagged `generation`.
    ///
    /// A lookup that was answered, and possibly re-issued, since the timer
    /// was armed returns `None`.
    pub fn expire(&mut self, key: &LookupKey, generation: u64) -> Option<Vec<Continuation<S>>> {
        let current = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.generation == generation);
        if !current {
            return None;
        }
        self.entries.remove(key).map(|entry| entry.continuations)
    }

    /// Drops every pending lookup without running continuations.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S> Default for PendingLookups<S> {
    fn default() -> Self {
        Self::new()
    }
}
