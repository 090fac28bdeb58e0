//! # MoolYatra Sync
//!
//! Client-side core of a travel-discovery app: favorites and exploration
//! history kept in a durable local cache while the user is anonymous, and in
//! a remote profile once they sign in, presented through one unified view.
//!
//! This library provides:
//! - [`ReconciliationLayer`], the unified view and mutation dispatcher
//! - [`LocalCache`] over any [`KeyValueStore`] (in-memory or SQLite)
//! - [`Catalog`], the canonical destination order used at the remote boundary
//! - [`RemoteProfileStore`], the backend contract, with an HTTP implementation
//!
//! ## Features
//!
//! - **`persistence`** (default) - SQLite-backed [`SqliteStore`]
//! - **`http`** - reqwest client for the travel backend
//! - **`ffi`** - UniFFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use moolyatra_sync::{
//!     Catalog, DestinationRef, IdentitySession, LocalCache, MemoryStore,
//!     ReconciliationLayer, RemoteProfileStore, Result, UserProfileView, UserRole,
//! };
//!
//! // Backend stand-in; the anonymous path never calls it
//! struct NoBackend;
//!
//! impl RemoteProfileStore for NoBackend {
//!     async fn get_caller_user_profile(&self) -> Result<Option<UserProfileView>> { Ok(None) }
//!     async fn save_favorite(&self, _index: u64) -> Result<()> { Ok(()) }
//!     async fn add_past_exploration(&self, _index: u64) -> Result<()> { Ok(()) }
//!     async fn create_user_profile(&self, _role: UserRole, _name: &str) -> Result<()> { Ok(()) }
//! }
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let layer = ReconciliationLayer::new(
//!     Arc::new(Catalog::from_ids(["ziro-valley", "majuli", "hampi"])),
//!     Arc::new(IdentitySession::anonymous()),
//!     NoBackend,
//!     LocalCache::new(MemoryStore::new()),
//! );
//!
//! let majuli = DestinationRef::from("majuli");
//! assert!(layer.toggle_favorite(&majuli).await);
//! assert_eq!(layer.favorite_ids(), vec![majuli]);
//! # });
//! ```

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, SyncError};

// Configuration with defaults
pub mod config;
pub use config::{BackendConfig, CacheConfig, ReconcileConfig, SyncConfig};

// Canonical destination catalog and positional lookup
pub mod catalog;
pub use catalog::{Catalog, Category, Destination, DestinationRef, TrustBreakdown};

// Signed-in identity
pub mod identity;
pub use identity::{Identity, IdentitySession};

// Key-value storage seam
pub mod store;
pub use store::{KeyValueStore, MemoryStore};

// SQLite-backed store
#[cfg(feature = "persistence")]
pub mod persistence;
#[cfg(feature = "persistence")]
pub use persistence::SqliteStore;

// Typed local cache
pub mod cache;
pub use cache::{CacheKeys, LocalCache};

// Remote profile contract
pub mod remote;
pub use remote::{RemoteProfileStore, UserProfileView, UserRole};

// Local/remote reconciliation
pub mod reconcile;
pub use reconcile::{
    ExplorationChange, FavoriteChange, MutationState, ReconciliationLayer, Resource,
};

// HTTP backend client
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub use http::{load_catalog, ExperienceRequestInput, Host, HttpBackend};

// FFI bindings for mobile platforms (iOS/Android)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("MoolYatraSync"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}
