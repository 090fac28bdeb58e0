//! # Local Cache
//!
//! Typed adapter over a [`KeyValueStore`] holding the anonymous user's
//! favorites and explorations, the chosen onboarding role, and an offline
//! copy of the destination catalog.
//!
//! Values are JSON. Each operation comes in two forms:
//! - `try_*` returns the underlying [`SyncError`]
//! - the plain form never fails: reads degrade to empty, writes report
//!   `false` and leave the previously stored value in place
//!
//! The plain forms are what the UI uses, so a disabled or full storage
//! medium costs silently lost writes rather than a broken screen.

use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::catalog::Destination;
use crate::config::CacheConfig;
use crate::error::{Result, SyncError};
use crate::remote::UserRole;
use crate::store::KeyValueStore;

/// The fixed keys the cache writes under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    pub favorites: String,
    pub explorations: String,
    pub user_role: String,
    pub destinations: String,
    destination_detail_prefix: String,
}

impl CacheKeys {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            favorites: format!("{}_favorites", prefix),
            explorations: format!("{}_explorations", prefix),
            user_role: format!("{}_user_role", prefix),
            destinations: format!("{}_destinations", prefix),
            destination_detail_prefix: format!("{}_destination_", prefix),
        }
    }

    pub fn destination_detail(&self, id: &str) -> String {
        format!("{}{}", self.destination_detail_prefix, id)
    }
}

impl Default for CacheKeys {
    fn default() -> Self {
        Self::with_prefix(crate::config::DEFAULT_KEY_PREFIX)
    }
}

/// Local cache over a key-value medium.
pub struct LocalCache<S> {
    store: S,
    keys: CacheKeys,
}

impl<S: KeyValueStore> LocalCache<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            keys: CacheKeys::default(),
        }
    }

    pub fn with_config(store: S, config: &CacheConfig) -> Self {
        Self {
            store,
            keys: CacheKeys::with_prefix(&config.key_prefix),
        }
    }

    pub fn keys(&self) -> &CacheKeys {
        &self.keys
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ========================================================================
    // JSON values
    // ========================================================================

    fn try_read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.store.get(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| SyncError::Serialization {
                    key: key.to_string(),
                    message: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    fn try_write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value).map_err(|e| SyncError::Serialization {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.store.set(key, &raw)
    }

    // ========================================================================
    // String lists
    // ========================================================================

    /// Read a string list. A missing key is an empty list.
    pub fn try_read_list(&self, key: &str) -> Result<Vec<String>> {
        Ok(self.try_read_json(key)?.unwrap_or_default())
    }

    /// Read a string list, empty on any failure.
    pub fn read_list(&self, key: &str) -> Vec<String> {
        self.try_read_list(key).unwrap_or_else(|e| {
            warn!("[LocalCache] Read of '{}' failed: {}", key, e);
            Vec::new()
        })
    }

    pub fn try_write_list(&self, key: &str, values: &[String]) -> Result<()> {
        self.try_write_json(key, values)
    }

    /// Best-effort write. Returns whether the value was persisted.
    pub fn write_list(&self, key: &str, values: &[String]) -> bool {
        match self.try_write_list(key, values) {
            Ok(()) => true,
            Err(e) => {
                warn!("[LocalCache] Write of '{}' dropped: {}", key, e);
                false
            }
        }
    }

    pub fn favorites(&self) -> Vec<String> {
        self.read_list(&self.keys.favorites)
    }

    pub fn try_favorites(&self) -> Result<Vec<String>> {
        self.try_read_list(&self.keys.favorites)
    }

    pub fn set_favorites(&self, ids: &[String]) -> bool {
        self.write_list(&self.keys.favorites, ids)
    }

    pub fn try_set_favorites(&self, ids: &[String]) -> Result<()> {
        self.try_write_list(&self.keys.favorites, ids)
    }

    pub fn explorations(&self) -> Vec<String> {
        self.read_list(&self.keys.explorations)
    }

    pub fn try_explorations(&self) -> Result<Vec<String>> {
        self.try_read_list(&self.keys.explorations)
    }

    pub fn set_explorations(&self, ids: &[String]) -> bool {
        self.write_list(&self.keys.explorations, ids)
    }

    pub fn try_set_explorations(&self, ids: &[String]) -> Result<()> {
        self.try_write_list(&self.keys.explorations, ids)
    }

    // ========================================================================
    // User role (stored raw, not JSON)
    // ========================================================================

    pub fn user_role(&self) -> Option<UserRole> {
        match self.store.get(&self.keys.user_role) {
            Ok(Some(raw)) => raw.parse().ok(),
            Ok(None) => None,
            Err(e) => {
                warn!("[LocalCache] Read of user role failed: {}", e);
                None
            }
        }
    }

    pub fn save_user_role(&self, role: UserRole) -> bool {
        match self.store.set(&self.keys.user_role, role.as_str()) {
            Ok(()) => true,
            Err(e) => {
                warn!("[LocalCache] Write of user role dropped: {}", e);
                false
            }
        }
    }

    // ========================================================================
    // Offline catalog copy
    // ========================================================================

    pub fn cache_destinations(&self, destinations: &[Destination]) -> bool {
        let key = &self.keys.destinations;
        match self.try_write_json(key, destinations) {
            Ok(()) => true,
            Err(e) => {
                warn!("[LocalCache] Caching {} destinations dropped: {}", destinations.len(), e);
                false
            }
        }
    }

    /// Last cached catalog, `None` if never cached or unreadable.
    pub fn cached_destinations(&self) -> Option<Vec<Destination>> {
        self.try_read_json(&self.keys.destinations)
            .unwrap_or_else(|e| {
                warn!("[LocalCache] Cached destinations unreadable: {}", e);
                None
            })
    }

    pub fn cache_destination_detail(&self, detail: &Destination) -> bool {
        let key = self.keys.destination_detail(detail.id.as_str());
        match self.try_write_json(&key, detail) {
            Ok(()) => true,
            Err(e) => {
                warn!("[LocalCache] Caching detail '{}' dropped: {}", key, e);
                false
            }
        }
    }

    pub fn cached_destination_detail(&self, id: &str) -> Option<Destination> {
        let key = self.keys.destination_detail(id);
        self.try_read_json(&key).unwrap_or_else(|e| {
            warn!("[LocalCache] Cached detail '{}' unreadable: {}", key, e);
            None
        })
    }
}
