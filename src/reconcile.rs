//! # Reconciliation Layer
//!
//! One answer to "what is favorited / explored" regardless of whether
//! anybody is signed in, and the routing of each mutation to the right
//! backing store.
//!
//! ## Sources
//!
//! - Signed in, profile fetched for that principal: the remote profile's
//!   catalog positions, mapped through the [`Catalog`]. Positions outside the
//!   catalog are dropped.
//! - Otherwise: the local cache's string ids, verbatim.
//!
//! Signing in never migrates local entries to the remote profile; they are
//! only hidden while the remote view is active.
//!
//! ## Mutations
//!
//! Each resource (favorites, explorations) has its own queue: mutations are
//! serialized, so the last one issued is the last one to land. A mutation
//! counts as pending from the moment it is queued until it completes.
//! Failures are recorded per resource and never retried or rolled back.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};

use crate::cache::LocalCache;
use crate::catalog::{Catalog, DestinationRef};
use crate::config::ReconcileConfig;
use crate::error::{OptionExt, Result, SyncError};
use crate::identity::{Identity, IdentitySession};
use crate::remote::{RemoteProfileStore, UserProfileView, UserRole};
use crate::store::KeyValueStore;

// ============================================================================
// Types
// ============================================================================

/// The two per-user collections the layer manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Favorites,
    Explorations,
}

/// Mutation state of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    Idle,
    Dispatching,
}

/// Result of a favorite toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteChange {
    /// Appended to the local list
    Added,
    /// Removed from the local list
    Removed,
    /// Save dispatched to the remote store, which owns dedup/toggle
    Submitted,
    /// Removal dispatched to the remote store
    RemovedRemote,
}

/// Result of logging an exploration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplorationChange {
    /// Appended to the local list
    Recorded,
    /// Already in the local list, nothing written
    AlreadyRecorded,
    /// Dispatched to the remote store
    Submitted,
}

/// Cached copy of the remote profile.
#[derive(Debug, Clone, PartialEq)]
enum ProfileSnapshot {
    Unfetched,
    Fetched {
        principal: String,
        profile: Option<UserProfileView>,
    },
}

/// Pending counter and last failure of one resource.
#[derive(Debug, Default)]
struct ResourceTrack {
    in_flight: AtomicUsize,
    last_error: Mutex<Option<SyncError>>,
    queue: tokio::sync::Mutex<()>,
}

impl ResourceTrack {
    fn record(&self, outcome: std::result::Result<(), &SyncError>) {
        if let Ok(mut guard) = self.last_error.lock() {
            *guard = outcome.err().cloned();
        }
    }
}

/// Marks a resource pending for as long as it lives.
struct PendingGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> PendingGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Reconciliation Layer
// ============================================================================

/// Unified favorites/explorations view over a local cache and a remote
/// profile store.
pub struct ReconciliationLayer<R, S> {
    catalog: Arc<Catalog>,
    session: Arc<IdentitySession>,
    remote: R,
    cache: LocalCache<S>,
    config: ReconcileConfig,
    snapshot: Mutex<ProfileSnapshot>,
    favorites: ResourceTrack,
    explorations: ResourceTrack,
}

impl<R: RemoteProfileStore, S: KeyValueStore> ReconciliationLayer<R, S> {
    pub fn new(
        catalog: Arc<Catalog>,
        session: Arc<IdentitySession>,
        remote: R,
        cache: LocalCache<S>,
    ) -> Self {
        Self::with_config(catalog, session, remote, cache, ReconcileConfig::default())
    }

    pub fn with_config(
        catalog: Arc<Catalog>,
        session: Arc<IdentitySession>,
        remote: R,
        cache: LocalCache<S>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            catalog,
            session,
            remote,
            cache,
            config,
            snapshot: Mutex::new(ProfileSnapshot::Unfetched),
            favorites: ResourceTrack::default(),
            explorations: ResourceTrack::default(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn session(&self) -> &IdentitySession {
        &self.session
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn cache(&self) -> &LocalCache<S> {
        &self.cache
    }

    fn track(&self, resource: Resource) -> &ResourceTrack {
        match resource {
            Resource::Favorites => &self.favorites,
            Resource::Explorations => &self.explorations,
        }
    }

    // ========================================================================
    // Profile snapshot
    // ========================================================================

    /// Fetch the caller's profile and cache it for the signed-in principal.
    ///
    /// Signed out: clears the snapshot and returns `Ok(None)`. On failure the
    /// previous snapshot stays in place.
    pub async fn refresh_profile(&self) -> Result<Option<UserProfileView>> {
        let Some(identity) = self.session.current() else {
            self.set_snapshot(ProfileSnapshot::Unfetched);
            return Ok(None);
        };

        let profile = self.remote.get_caller_user_profile().await?;
        debug!(
            "[Reconcile] Fetched profile for {}: {}",
            identity.short_name(),
            if profile.is_some() { "present" } else { "none" }
        );
        self.set_snapshot(ProfileSnapshot::Fetched {
            principal: identity.principal().to_string(),
            profile: profile.clone(),
        });
        Ok(profile)
    }

    /// Remote profile of the signed-in principal, if one has been fetched.
    pub fn profile(&self) -> Option<UserProfileView> {
        let identity = self.session.current()?;
        let guard = self.snapshot.lock().ok()?;
        match &*guard {
            ProfileSnapshot::Fetched { principal, profile } if principal == identity.principal() => {
                profile.clone()
            }
            _ => None,
        }
    }

    fn set_snapshot(&self, snapshot: ProfileSnapshot) {
        if let Ok(mut guard) = self.snapshot.lock() {
            *guard = snapshot;
        }
    }

    /// Re-fetch after a remote mutation; a failed fetch keeps the old view.
    async fn refresh_after_mutation(&self) {
        if !self.config.refresh_after_mutation {
            return;
        }
        if let Err(e) = self.refresh_profile().await {
            warn!("[Reconcile] Profile refresh after mutation failed: {}", e);
        }
    }

    /// End the session: forget the identity and the profile snapshot.
    /// Local cache contents stay.
    pub fn sign_out(&self) {
        self.session.sign_out();
        self.set_snapshot(ProfileSnapshot::Unfetched);
    }

    // ========================================================================
    // Views
    // ========================================================================

    /// Favorite destinations from whichever store is active.
    pub fn favorite_ids(&self) -> Vec<DestinationRef> {
        match self.profile() {
            Some(profile) => self.catalog.resolve_indices(&profile.saved_favorites),
            None => self.cache.favorites().into_iter().map(DestinationRef::from).collect(),
        }
    }

    pub fn is_favorite(&self, id: &DestinationRef) -> bool {
        self.favorite_ids().contains(id)
    }

    /// Explored destinations from whichever store is active.
    pub fn exploration_ids(&self) -> Vec<DestinationRef> {
        match self.profile() {
            Some(profile) => self.catalog.resolve_indices(&profile.past_explorations),
            None => self
                .cache
                .explorations()
                .into_iter()
                .map(DestinationRef::from)
                .collect(),
        }
    }

    // ========================================================================
    // Mutation state
    // ========================================================================

    pub fn mutation_state(&self, resource: Resource) -> MutationState {
        if self.track(resource).in_flight.load(Ordering::SeqCst) > 0 {
            MutationState::Dispatching
        } else {
            MutationState::Idle
        }
    }

    pub fn is_pending(&self, resource: Resource) -> bool {
        self.mutation_state(resource) == MutationState::Dispatching
    }

    /// Error of the most recent mutation of `resource`, cleared by a success.
    pub fn last_error(&self, resource: Resource) -> Option<SyncError> {
        self.track(resource)
            .last_error
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }

    // ========================================================================
    // Favorites
    // ========================================================================

    /// Toggle a favorite.
    ///
    /// Unknown refs fail with [`SyncError::UnknownDestination`] before any
    /// store is touched. Signed out, the local list is toggled. Signed in,
    /// a save is dispatched by catalog position, or a removal when the
    /// remote store supports it and the ref is currently a favorite.
    pub async fn try_toggle_favorite(&self, id: &DestinationRef) -> Result<FavoriteChange> {
        let index = self.catalog.index_of(id).ok_or_unknown_destination(id.as_str())?;

        let track = &self.favorites;
        let _pending = PendingGuard::new(&track.in_flight);
        let _queue = track.queue.lock().await;

        let result = match self.session.current() {
            None => self.toggle_local_favorite(id),
            Some(identity) => self.toggle_remote_favorite(&identity, id, index as u64).await,
        };
        track.record(result.as_ref().map(|_| ()));
        result
    }

    /// Boundary form of [`Self::try_toggle_favorite`]: returns whether the
    /// toggle was applied, logging any failure.
    pub async fn toggle_favorite(&self, id: &DestinationRef) -> bool {
        match self.try_toggle_favorite(id).await {
            Ok(change) => {
                debug!("[Reconcile] Favorite {}: {:?}", id, change);
                true
            }
            Err(e) => {
                warn!("[Reconcile] Toggle favorite {} failed: {}", id, e);
                false
            }
        }
    }

    /// An unreadable stored list counts as empty and is overwritten.
    fn toggle_local_favorite(&self, id: &DestinationRef) -> Result<FavoriteChange> {
        let mut current = self.cache.favorites();
        let change = if let Some(pos) = current.iter().position(|f| f == id.as_str()) {
            current.remove(pos);
            FavoriteChange::Removed
        } else {
            current.push(id.as_str().to_string());
            FavoriteChange::Added
        };
        self.cache.try_set_favorites(&current)?;
        Ok(change)
    }

    async fn toggle_remote_favorite(
        &self,
        identity: &Identity,
        id: &DestinationRef,
        index: u64,
    ) -> Result<FavoriteChange> {
        // Only the fetched remote profile decides removal; the local list never
        // acts on the remote set.
        let held_remotely = self
            .profile()
            .is_some_and(|p| p.saved_favorites.contains(&index));
        let change = if self.remote.supports_favorite_removal() && held_remotely {
            self.remote.remove_favorite(index).await?;
            FavoriteChange::RemovedRemote
        } else {
            self.remote.save_favorite(index).await?;
            FavoriteChange::Submitted
        };
        info!(
            "[Reconcile] {:?} favorite #{} ({}) for {}",
            change,
            index,
            id,
            identity.short_name()
        );
        self.refresh_after_mutation().await;
        Ok(change)
    }

    // ========================================================================
    // Explorations
    // ========================================================================

    /// Record an exploration. Append-only; unknown refs dispatch nothing.
    pub async fn try_log_exploration(&self, id: &DestinationRef) -> Result<ExplorationChange> {
        let index = self.catalog.index_of(id).ok_or_unknown_destination(id.as_str())?;

        let track = &self.explorations;
        let _pending = PendingGuard::new(&track.in_flight);
        let _queue = track.queue.lock().await;

        let result = match self.session.current() {
            None => self.log_local_exploration(id),
            Some(identity) => {
                self.log_remote_exploration(&identity, id, index as u64)
                    .await
            }
        };
        track.record(result.as_ref().map(|_| ()));
        result
    }

    /// Boundary form of [`Self::try_log_exploration`].
    pub async fn log_exploration(&self, id: &DestinationRef) -> bool {
        match self.try_log_exploration(id).await {
            Ok(change) => {
                debug!("[Reconcile] Exploration {}: {:?}", id, change);
                true
            }
            Err(e) => {
                warn!("[Reconcile] Log exploration {} failed: {}", id, e);
                false
            }
        }
    }

    fn log_local_exploration(&self, id: &DestinationRef) -> Result<ExplorationChange> {
        let mut current = self.cache.explorations();
        if current.iter().any(|e| e == id.as_str()) {
            return Ok(ExplorationChange::AlreadyRecorded);
        }
        current.push(id.as_str().to_string());
        self.cache.try_set_explorations(&current)?;
        Ok(ExplorationChange::Recorded)
    }

    async fn log_remote_exploration(
        &self,
        identity: &Identity,
        id: &DestinationRef,
        index: u64,
    ) -> Result<ExplorationChange> {
        self.remote.add_past_exploration(index).await?;
        info!(
            "[Reconcile] Exploration #{} ({}) submitted for {}",
            index,
            id,
            identity.short_name()
        );
        self.refresh_after_mutation().await;
        Ok(ExplorationChange::Submitted)
    }

    // ========================================================================
    // Profile creation
    // ========================================================================

    /// Create the signed-in caller's profile.
    ///
    /// The display name defaults to the abbreviated principal. The role is
    /// also remembered locally so onboarding can resume without the backend.
    pub async fn try_create_profile(
        &self,
        role: UserRole,
        display_name: Option<&str>,
    ) -> Result<()> {
        let identity = self.session.current().ok_or(SyncError::NotAuthenticated)?;
        let display_name = display_name
            .map(str::to_string)
            .unwrap_or_else(|| identity.short_name());

        self.cache.save_user_role(role);
        self.remote.create_user_profile(role, &display_name).await?;
        info!("[Reconcile] Created {} profile '{}'", role, display_name);

        if let Err(e) = self.refresh_profile().await {
            warn!("[Reconcile] Profile refresh after creation failed: {}", e);
        }
        Ok(())
    }

    /// Boundary form of [`Self::try_create_profile`].
    pub async fn create_profile(&self, role: UserRole, display_name: Option<&str>) -> bool {
        match self.try_create_profile(role, display_name).await {
            Ok(()) => true,
            Err(e) => {
                warn!("[Reconcile] Create profile failed: {}", e);
                false
            }
        }
    }
}
