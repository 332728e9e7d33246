//! Conversation participants.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placeholder shown until an avatar's name resolves.
pub const PLACEHOLDER_NAME: &str = "Loading…";

/// A position in region coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance_to(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// A remote avatar currently typing in a conversation.
///
/// Matched by `agent_id`; `name` is only what the typing line shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Typist {
    pub agent_id: Uuid,
    pub name: String,
}

/// A member of a conversation's roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub agent_id: Uuid,
    /// Account name ("First Last" / "first.last").
    pub legacy_name: String,
    /// Name shown in the UI. Lags behind `legacy_name` until enriched.
    pub display_name: String,
    pub moderator: bool,
    /// Distance from the local user. Only meaningful in local chat; 0 elsewhere.
    pub distance: f32,
    pub online: bool,
    /// Set once the display name has been resolved.
    #[serde(default)]
    pub enriched: bool,
    #[serde(default)]
    pub profile_image: Option<Uuid>,
}

impl Participant {
    /// Creates a participant whose display name is not yet known.
    ///
    /// An empty legacy name falls back to [`PLACEHOLDER_NAME`].
    pub fn pending(agent_id: Uuid, legacy_name: impl Into<String>) -> Self {
        let legacy_name = legacy_name.into();
        let display_name = if legacy_name.trim().is_empty() {
            PLACEHOLDER_NAME.to_string()
        } else {
            legacy_name.clone()
        };
        Self {
            agent_id,
            legacy_name,
            display_name,
            moderator: false,
            distance: 0.0,
            online: true,
            enriched: false,
            profile_image: None,
        }
    }

    /// Creates a participant whose display name is already known.
    pub fn resolved(
        agent_id: Uuid,
        legacy_name: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            enriched: true,
            ..Self::pending(agent_id, legacy_name)
        }
    }

    /// Applies a resolved name in place.
    pub fn enrich(&mut self, legacy_name: Option<&str>, display_name: &str) {
        if let Some(legacy) = legacy_name.filter(|l| !l.trim().is_empty()) {
            self.legacy_name = legacy.to_string();
        }
        self.display_name = display_name.to_string();
        self.enriched = true;
    }
}
