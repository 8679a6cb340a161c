//! Error types for the shelfsync library

use std::path::PathBuf;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Error type covering a full reconciliation run
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The catalog rejected the supplied account
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// The feed could not be parsed into catalog entries
    #[error("Feed format error: {message}")]
    FeedFormat { message: String },

    /// Network-level failure; never retried internally
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A new acquisition would overwrite an existing file
    #[error("Destination '{path}' already exists")]
    Collision { path: PathBuf },

    /// A local package's embedded metadata could not be read
    #[error("Package error at '{path}': {message}")]
    Package { path: PathBuf, message: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Create a new authentication error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a new feed format error
    pub fn feed_format(message: impl Into<String>) -> Self {
        Self::FeedFormat {
            message: message.into(),
        }
    }

    /// Create a new collision error
    pub fn collision(path: impl Into<PathBuf>) -> Self {
        Self::Collision { path: path.into() }
    }

    /// Create a new package error
    pub fn package_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Package {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this error invalidates the whole run rather than one action
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth { .. } | Self::FeedFormat { .. })
    }
}
