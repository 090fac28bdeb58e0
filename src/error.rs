//! Unified error handling for the sync layer.
//!
//! Every fallible operation returns [`SyncError`]. The UI-facing wrappers in
//! [`crate::reconcile`] and [`crate::cache`] turn these into empty or no-op
//! results at the boundary, so callers that only want "never crash" behavior
//! never have to match on them.

use thiserror::Error;

/// Unified error type for sync operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    /// Destination id is not part of the canonical catalog
    #[error("Destination '{id}' is not in the catalog")]
    UnknownDestination { id: String },

    /// Remote index does not point into the catalog
    #[error("Catalog index {index} is out of range ({len} destinations)")]
    IndexOutOfRange { index: u64, len: usize },

    /// Local storage medium failed (unavailable, full, I/O)
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// Stored value could not be encoded or decoded
    #[error("Serialization error for '{key}': {message}")]
    Serialization { key: String, message: String },

    /// Operation needs a signed-in identity
    #[error("No authenticated identity")]
    NotAuthenticated,

    /// Remote backend rejected or failed the call
    #[error("Remote error: {message}")]
    Remote {
        message: String,
        status_code: Option<u16>,
    },

    /// Remote backend does not offer this operation
    #[error("Remote store does not support {operation}")]
    Unsupported { operation: &'static str },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl SyncError {
    pub(crate) fn storage(message: impl Into<String>) -> Self {
        SyncError::Storage {
            message: message.into(),
        }
    }

    #[cfg_attr(not(feature = "http"), allow(dead_code))]
    pub(crate) fn remote(message: impl Into<String>, status_code: Option<u16>) -> Self {
        SyncError::Remote {
            message: message.into(),
            status_code,
        }
    }

    /// Whether the failure came from the local storage medium.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            SyncError::Storage { .. } | SyncError::Serialization { .. }
        )
    }

    /// Whether the failure came from the remote backend.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            SyncError::Remote { .. } | SyncError::Unsupported { .. }
        )
    }
}

#[cfg(feature = "persistence")]
impl From<rusqlite::Error> for SyncError {
    fn from(e: rusqlite::Error) -> Self {
        SyncError::storage(e.to_string())
    }
}

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Extension trait for turning catalog misses into errors.
pub trait OptionExt<T> {
    /// Convert a missing catalog lookup into [`SyncError::UnknownDestination`].
    fn ok_or_unknown_destination(self, id: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_unknown_destination(self, id: &str) -> Result<T> {
        self.ok_or_else(|| SyncError::UnknownDestination { id: id.to_string() })
    }
}
