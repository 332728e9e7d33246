//! Router configuration.
//!
//! Loaded from `~/.config/parley/router.toml` (or an explicit path). Every
//! field has a default, so an empty or missing file yields a usable config.

use crate::error::{ParleyError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tunables for the routing engine.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RouterConfig {
    /// Window after the last outbound start-typing before the engine emits
    /// stop-typing on the user's behalf.
    pub typing_timeout_ms: u64,
    /// Upper bound on any identity lookup (group name, avatar name, profile).
    pub lookup_timeout_ms: u64,
    /// Period of the group roster consistency refresh.
    pub roster_refresh_interval_ms: u64,
    /// Maximum queued events per unresolved group before drop-oldest.
    pub pending_group_queue_cap: usize,
    /// Capacity of the change-notification broadcast channel.
    pub event_channel_capacity: usize,
    /// Expiry for remote typists. `None` keeps them until an explicit stop.
    pub remote_typing_expiry_ms: Option<u64>,
    /// Below this many messages the dedup filter scans linearly.
    pub dedup_linear_scan_limit: usize,
    /// Chat channel used for outbound local chat.
    pub local_chat_channel: i32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            typing_timeout_ms: 3_000,
            lookup_timeout_ms: 10_000,
            roster_refresh_interval_ms: 5_000,
            pending_group_queue_cap: 200,
            event_channel_capacity: 256,
            remote_typing_expiry_ms: None,
            dedup_linear_scan_limit: 32,
            local_chat_channel: 0,
        }
    }
}

impl RouterConfig {
    pub fn typing_timeout(&self) -> Duration {
        Duration::from_millis(self.typing_timeout_ms)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn roster_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.roster_refresh_interval_ms)
    }

    pub fn remote_typing_expiry(&self) -> Option<Duration> {
        self.remote_typing_expiry_ms.map(Duration::from_millis)
    }

    /// Returns the default config path: `~/.config/parley/router.toml`
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| ParleyError::config("Could not determine config directory"))?;
        Ok(base.join("parley").join("router.toml"))
    }

    /// Parses and validates a config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RouterConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the config at `path`. A missing file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ParleyError::Io {
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    /// Loads the config at `path`, falling back to defaults if the file does
    /// not exist. A file that exists but fails to parse is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Rejects values that would stall or disable the engine.
    pub fn validate(&self) -> Result<()> {
        if self.typing_timeout_ms == 0 {
            return Err(ParleyError::config("typing_timeout_ms must be > 0"));
        }
        if self.lookup_timeout_ms == 0 {
            return Err(ParleyError::config("lookup_timeout_ms must be > 0"));
        }
        if self.roster_refresh_interval_ms == 0 {
            return Err(ParleyError::config("roster_refresh_interval_ms must be > 0"));
        }
        if self.pending_group_queue_cap == 0 {
            return Err(ParleyError::config("pending_group_queue_cap must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(ParleyError::config("event_channel_capacity must be > 0"));
        }
        if self.remote_typing_expiry_ms == Some(0) {
            return Err(ParleyError::config("remote_typing_expiry_ms must be > 0 when set"));
        }
        Ok(())
    }
}
