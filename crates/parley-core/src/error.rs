//! Error types for the Parley router.

use serde::Serialize;
use thiserror::Error;

/// A shared error type for the routing engine and its collaborators.
///
/// Nothing in the engine lets one of these escape to the UI: every failure is
/// logged and turned into a state transition, a skip, or a status string.
/// The variants exist so that the gateway adapter, the classifier and the
/// configuration loader can report *what* went wrong in a typed way.
#[derive(Error, Debug, Clone, Serialize)]
pub enum ParleyError {
    /// A raw gateway event that could not be classified
    #[error("Malformed event ({event_type}): {reason}")]
    MalformedEvent {
        event_type: String,
        reason: String,
    },

    /// Outbound operation attempted while the gateway reports disconnected
    #[error("Gateway is not connected")]
    NotConnected,

    /// Identity lookup (group name, avatar name, profile) failed or timed out
    #[error("Lookup failed for {lookup}: {reason}")]
    LookupFailed { lookup: String, reason: String },

    /// Gateway rejected or failed an operation
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ParleyError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a MalformedEvent error
    pub fn malformed(event_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedEvent {
            event_type: event_type.into(),
            reason: reason.into(),
        }
    }

    /// Creates a LookupFailed error
    pub fn lookup_failed(lookup: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LookupFailed {
            lookup: lookup.into(),
            reason: reason.into(),
        }
    }

    /// Creates a Gateway error
    pub fn gateway(message: impl Into<String>) -> Self {
        Self::Gateway(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a MalformedEvent error
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedEvent { .. })
    }

    /// Check if this is a NotConnected error
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::NotConnected)
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for ParleyError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for ParleyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for ParleyError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for ParleyError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, ParleyError>`.
pub type Result<T> = std::result::Result<T, ParleyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates() {
        assert!(ParleyError::malformed("group_message", "missing group_id").is_malformed());
        assert!(ParleyError::NotConnected.is_not_connected());
        assert!(!ParleyError::config("zero timeout").is_malformed());
    }

    #[test]
    fn test_json_error_conversion() {
        let err: ParleyError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        match err {
            ParleyError::Serialization { format, .. } => assert_eq!(format, "JSON"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_display_messages() {
        let err = ParleyError::lookup_failed("group name abc", "gateway closed");
        assert_eq!(err.to_string(), "Lookup failed for group name abc: gateway closed");
        assert_eq!(
            ParleyError::NotConnected.to_string(),
            "Gateway is not connected"
        );
    }
}
