//! Configuration for the cache, the remote backend and the reconciliation
//! layer. Every field has a default, so an empty JSON object is a valid
//! configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Default prefix for local cache keys.
pub const DEFAULT_KEY_PREFIX: &str = "moolyatra";

/// Default request timeout for the remote backend.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SyncConfig {
    pub cache: CacheConfig,
    pub backend: BackendConfig,
    pub reconcile: ReconcileConfig,
}

impl SyncConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SyncConfig = serde_json::from_str(json).map_err(|e| SyncError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache.key_prefix.trim().is_empty() {
            return Err(SyncError::Config {
                message: "cache.key_prefix must not be empty".to_string(),
            });
        }
        if self.backend.timeout_secs == 0 {
            return Err(SyncError::Config {
                message: "backend.timeout_secs must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Local cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Prefix shared by every cache key, keeps them apart from other app state
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

/// Remote backend configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Server accepts `DELETE /profile/favorites/{index}`
    pub favorite_removal: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/v1".to_string(),
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            favorite_removal: false,
        }
    }
}

/// Reconciliation layer behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Re-fetch the remote profile after each successful remote mutation
    pub refresh_after_mutation: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            refresh_after_mutation: true,
        }
    }
}
