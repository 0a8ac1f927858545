//! Error types for envmirror
//!
//! All modules use `MirrorResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for envmirror operations
pub type MirrorResult<T> = Result<T, MirrorError>;

/// All errors that can occur in envmirror
#[derive(Error, Debug)]
pub enum MirrorError {
    // Store errors
    #[error("Key/value store unavailable at {addr}: {reason}")]
    StoreUnavailable { addr: String, reason: String },

    #[error("Store protocol error: {0}")]
    StoreProtocol(String),

    #[error("Store rejected {command}: {message}")]
    StoreCommand { command: String, message: String },

    #[error("Unknown store backend: {0}. Valid backends: redis, memory")]
    UnknownBackend(String),

    // Mirror errors
    #[error("Environment for pattern {0} is already started")]
    AlreadyStarted(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("{0}")]
    User(String),
}

impl MirrorError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a store unavailable error
    pub fn store_unavailable(addr: impl Into<String>, reason: impl ToString) -> Self {
        Self::StoreUnavailable {
            addr: addr.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the connection to the store is gone, as opposed to a
    /// single command failing
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::StoreUnavailable { .. } => {
                Some("Check that the store is running and [store] host/port in the config")
            }
            Self::StoreCommand { .. } => {
                Some("Keyspace events may be disabled. Set notify-keyspace-events or enable_keyspace_events")
            }
            Self::UnknownBackend(_) => Some("Set [store] backend to \"redis\" or \"memory\""),
            _ => None,
        }
    }
}
