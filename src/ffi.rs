//! FFI bindings for mobile platforms (iOS/Android).
//!
//! Exposes a [`TravelSession`] object to Kotlin and Swift. The host app owns
//! the object: create it at startup, drop it at teardown. There are no global
//! singletons. Every method is blocking and never fails across the boundary;
//! failures are logged and reported as `false` or an empty list.

use std::sync::Arc;

use log::{info, warn};
use tokio::runtime::Runtime;

use crate::cache::LocalCache;
use crate::catalog::{Catalog, DestinationRef};
use crate::config::SyncConfig;
use crate::http::HttpBackend;
use crate::identity::{Identity, IdentitySession};
use crate::init_logging;
use crate::persistence::SqliteStore;
use crate::reconcile::{ReconciliationLayer, Resource};
use crate::remote::UserRole;

type MobileLayer = ReconciliationLayer<HttpBackend, SqliteStore>;

/// Which collection a pending query refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiResource {
    Favorites,
    Explorations,
}

impl From<FfiResource> for Resource {
    fn from(r: FfiResource) -> Self {
        match r {
            FfiResource::Favorites => Resource::Favorites,
            FfiResource::Explorations => Resource::Explorations,
        }
    }
}

/// Profile summary for the profile screen.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiProfile {
    pub display_name: String,
    pub role: String,
    pub favorite_count: u32,
    pub exploration_count: u32,
}

/// Session object wrapping the reconciliation layer.
#[derive(uniffi::Object)]
pub struct TravelSession {
    runtime: Runtime,
    layer: MobileLayer,
}

/// Build a session over a SQLite cache at `db_path` and the configured backend.
///
/// Returns `None` (and logs why) if the catalog, config, database or runtime
/// cannot be set up.
#[uniffi::export]
pub fn create_travel_session(
    db_path: String,
    catalog_json: String,
    config_json: String,
) -> Option<Arc<TravelSession>> {
    init_logging();
    info!("[TravelSession] Initializing with db: {}", db_path);

    let build = || -> crate::Result<TravelSession> {
        let config = if config_json.trim().is_empty() {
            SyncConfig::default()
        } else {
            SyncConfig::from_json(&config_json)?
        };
        let catalog = Catalog::from_json(&catalog_json)?;
        let store = SqliteStore::new(&db_path)?;
        let backend = HttpBackend::new(&config.backend)?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(|e| crate::SyncError::Config {
                message: format!("Failed to create runtime: {}", e),
            })?;

        let layer = ReconciliationLayer::with_config(
            Arc::new(catalog),
            Arc::new(IdentitySession::anonymous()),
            backend,
            LocalCache::with_config(store, &config.cache),
            config.reconcile,
        );
        Ok(TravelSession { runtime, layer })
    };

    match build() {
        Ok(session) => {
            info!(
                "[TravelSession] Initialized with {} destinations",
                session.layer.catalog().len()
            );
            Some(Arc::new(session))
        }
        Err(e) => {
            warn!("[TravelSession] Failed to initialize: {}", e);
            None
        }
    }
}

#[uniffi::export]
impl TravelSession {
    /// Sign in and fetch the caller's profile. Returns whether the fetch worked;
    /// the identity stays signed in either way.
    pub fn sign_in(&self, principal: String) -> bool {
        self.layer.session().sign_in(Identity::new(principal));
        self.refresh_profile()
    }

    pub fn sign_out(&self) {
        self.layer.sign_out();
    }

    pub fn is_authenticated(&self) -> bool {
        self.layer.session().is_authenticated()
    }

    pub fn refresh_profile(&self) -> bool {
        match self.runtime.block_on(self.layer.refresh_profile()) {
            Ok(_) => true,
            Err(e) => {
                warn!("[TravelSession] Profile refresh failed: {}", e);
                false
            }
        }
    }

    pub fn profile(&self) -> Option<FfiProfile> {
        self.layer.profile().map(|p| FfiProfile {
            display_name: p.display_name,
            role: p.role.to_string(),
            favorite_count: p.saved_favorites.len() as u32,
            exploration_count: p.past_explorations.len() as u32,
        })
    }

    pub fn favorite_ids(&self) -> Vec<String> {
        self.layer
            .favorite_ids()
            .into_iter()
            .map(DestinationRef::into_string)
            .collect()
    }

    pub fn is_favorite(&self, destination_id: String) -> bool {
        self.layer.is_favorite(&DestinationRef::from(destination_id))
    }

    pub fn toggle_favorite(&self, destination_id: String) -> bool {
        let id = DestinationRef::from(destination_id);
        self.runtime.block_on(self.layer.toggle_favorite(&id))
    }

    pub fn exploration_ids(&self) -> Vec<String> {
        self.layer
            .exploration_ids()
            .into_iter()
            .map(DestinationRef::into_string)
            .collect()
    }

    pub fn log_exploration(&self, destination_id: String) -> bool {
        let id = DestinationRef::from(destination_id);
        self.runtime.block_on(self.layer.log_exploration(&id))
    }

    /// `role` is "traveller" or "host"; an empty display name uses the
    /// abbreviated principal.
    pub fn create_profile(&self, role: String, display_name: String) -> bool {
        let role: UserRole = match role.parse() {
            Ok(r) => r,
            Err(e) => {
                warn!("[TravelSession] {}", e);
                return false;
            }
        };
        let name = Some(display_name.as_str()).filter(|n| !n.trim().is_empty());
        self.runtime.block_on(self.layer.create_profile(role, name))
    }

    pub fn is_pending(&self, resource: FfiResource) -> bool {
        self.layer.is_pending(resource.into())
    }

    pub fn last_error(&self, resource: FfiResource) -> Option<String> {
        self.layer.last_error(resource.into()).map(|e| e.to_string())
    }
}
