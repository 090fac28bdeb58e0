//! Reconciliation layer scenarios against a scripted remote store.
//!
//! Covers the anonymous/local path, the signed-in/remote path, stale
//! positions, unknown destinations, mutation queueing and the session
//! lifecycle.

use std::future::Future;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::Poll;

use moolyatra_sync::{
    Catalog, DestinationRef, ExplorationChange, FavoriteChange, Identity, IdentitySession,
    LocalCache, MemoryStore, MutationState, ReconciliationLayer, RemoteProfileStore, Resource,
    Result, SyncError, UserProfileView, UserRole,
};

// ============================================================================
// Scripted remote store
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Call {
    GetProfile,
    SaveFavorite(u64),
    RemoveFavorite(u64),
    AddExploration(u64),
    CreateProfile(UserRole, String),
}

#[derive(Default)]
struct ScriptedRemote {
    profile: Mutex<Option<UserProfileView>>,
    calls: Mutex<Vec<Call>>,
    failing: AtomicBool,
    failing_fetch: AtomicBool,
    removal: bool,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedRemote {
    fn with_profile(profile: UserProfileView) -> Self {
        Self {
            profile: Mutex::new(Some(profile)),
            ..Self::default()
        }
    }

    fn with_removal(mut self) -> Self {
        self.removal = true;
        self
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Fail only `get_caller_user_profile`; mutations still succeed.
    fn set_failing_fetch(&self, failing: bool) {
        self.failing_fetch.store(failing, Ordering::SeqCst);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| *c != Call::GetProfile)
            .collect()
    }

    /// Record the call, suspend once, and fail if scripted to.
    async fn enter(&self, call: Call) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.failing.load(Ordering::SeqCst) {
            Err(SyncError::Remote {
                message: "backend unavailable".to_string(),
                status_code: Some(503),
            })
        } else {
            Ok(())
        }
    }

    fn update(&self, f: impl FnOnce(&mut UserProfileView)) {
        if let Some(profile) = self.profile.lock().unwrap().as_mut() {
            f(profile);
        }
    }
}

impl RemoteProfileStore for ScriptedRemote {
    async fn get_caller_user_profile(&self) -> Result<Option<UserProfileView>> {
        self.enter(Call::GetProfile).await?;
        if self.failing_fetch.load(Ordering::SeqCst) {
            return Err(SyncError::Remote {
                message: "profile fetch unavailable".to_string(),
                status_code: Some(503),
            });
        }
        Ok(self.profile.lock().unwrap().clone())
    }

    async fn save_favorite(&self, index: u64) -> Result<()> {
        self.enter(Call::SaveFavorite(index)).await?;
        self.update(|p| {
            if !p.saved_favorites.contains(&index) {
                p.saved_favorites.push(index);
            }
        });
        Ok(())
    }

    async fn add_past_exploration(&self, index: u64) -> Result<()> {
        self.enter(Call::AddExploration(index)).await?;
        self.update(|p| {
            if !p.past_explorations.contains(&index) {
                p.past_explorations.push(index);
            }
        });
        Ok(())
    }

    async fn create_user_profile(&self, role: UserRole, display_name: &str) -> Result<()> {
        self.enter(Call::CreateProfile(role, display_name.to_string()))
            .await?;
        *self.profile.lock().unwrap() = Some(UserProfileView {
            principal: "owner".to_string(),
            display_name: display_name.to_string(),
            role,
            saved_favorites: Vec::new(),
            past_explorations: Vec::new(),
        });
        Ok(())
    }

    fn supports_favorite_removal(&self) -> bool {
        self.removal
    }

    async fn remove_favorite(&self, index: u64) -> Result<()> {
        self.enter(Call::RemoveFavorite(index)).await?;
        self.update(|p| p.saved_favorites.retain(|&i| i != index));
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

type Layer = ReconciliationLayer<ScriptedRemote, Arc<MemoryStore>>;

const PRINCIPAL: &str = "rrkah-fqaaa-aaaaa-aaaaq-cai";

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn refs(ids: &[&str]) -> Vec<DestinationRef> {
    ids.iter().map(|&id| DestinationRef::from(id)).collect()
}

fn profile(favorites: Vec<u64>, explorations: Vec<u64>) -> UserProfileView {
    UserProfileView {
        principal: PRINCIPAL.to_string(),
        display_name: "Traveller".to_string(),
        role: UserRole::Traveller,
        saved_favorites: favorites,
        past_explorations: explorations,
    }
}

fn build(remote: ScriptedRemote, signed_in: bool) -> (Layer, Arc<MemoryStore>) {
    init();
    let store = Arc::new(MemoryStore::new());
    let session = if signed_in {
        IdentitySession::authenticated(Identity::new(PRINCIPAL))
    } else {
        IdentitySession::anonymous()
    };
    let layer = ReconciliationLayer::new(
        Arc::new(Catalog::from_ids(["a", "b", "c"])),
        Arc::new(session),
        remote,
        LocalCache::new(Arc::clone(&store)),
    );
    (layer, store)
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn scenario_a_anonymous_toggle_round_trip() {
    let (layer, _store) = build(ScriptedRemote::default(), false);
    let b = DestinationRef::from("b");

    assert!(layer.toggle_favorite(&b).await);
    assert_eq!(layer.favorite_ids(), refs(&["b"]));

    assert!(layer.toggle_favorite(&b).await);
    assert!(layer.favorite_ids().is_empty());
    assert!(layer.remote().calls().is_empty());
}

#[tokio::test]
async fn scenario_b_remote_positions_map_to_ids() {
    let (layer, _store) = build(ScriptedRemote::with_profile(profile(vec![0, 2], vec![])), true);
    layer.refresh_profile().await.unwrap();

    assert_eq!(layer.favorite_ids(), refs(&["a", "c"]));
    assert!(layer.is_favorite(&"c".into()));
    assert!(!layer.is_favorite(&"b".into()));
}

#[tokio::test]
async fn scenario_c_out_of_range_positions_are_dropped() {
    let (layer, _store) = build(ScriptedRemote::with_profile(profile(vec![5], vec![7])), true);
    layer.refresh_profile().await.unwrap();

    assert!(layer.favorite_ids().is_empty());
    assert!(layer.exploration_ids().is_empty());
}

#[tokio::test]
async fn scenario_d_unknown_exploration_dispatches_nothing() {
    for signed_in in [false, true] {
        let (layer, store) = build(ScriptedRemote::with_profile(profile(vec![], vec![])), signed_in);
        let unknown = DestinationRef::from("unknown-id");

        assert!(matches!(
            layer.try_log_exploration(&unknown).await,
            Err(SyncError::UnknownDestination { .. })
        ));
        assert!(layer.remote().calls().is_empty());
        assert!(store.is_empty());
    }
}

// ============================================================================
// Properties
// ============================================================================

#[tokio::test]
async fn unknown_refs_leave_both_stores_unchanged() {
    for signed_in in [false, true] {
        let (layer, store) = build(ScriptedRemote::with_profile(profile(vec![1], vec![])), signed_in);
        layer.cache().set_favorites(&["a".to_string()]);

        for id in ["", "A", "z", "a ", "ziro-valley"] {
            let id = DestinationRef::from(id);
            assert!(!layer.toggle_favorite(&id).await);
            assert!(!layer.log_exploration(&id).await);
        }

        assert!(layer.remote().mutations().is_empty());
        assert_eq!(layer.cache().favorites(), vec!["a".to_string()]);
        assert!(layer.cache().explorations().is_empty());
        assert_eq!(store.len(), 1);
    }
}

#[tokio::test]
async fn anonymous_double_toggle_restores_membership() {
    let (layer, _store) = build(ScriptedRemote::default(), false);
    layer.cache().set_favorites(&["c".to_string()]);

    for id in ["a", "b", "c"] {
        let id = DestinationRef::from(id);
        let before = layer.is_favorite(&id);
        layer.toggle_favorite(&id).await;
        assert_ne!(layer.is_favorite(&id), before);
        layer.toggle_favorite(&id).await;
        assert_eq!(layer.is_favorite(&id), before);
    }
}

#[tokio::test]
async fn remote_view_only_contains_catalog_positions() {
    let (layer, _store) = build(
        ScriptedRemote::with_profile(profile(vec![0, 3, 99, 2, u64::MAX], vec![1, 1000])),
        true,
    );
    layer.refresh_profile().await.unwrap();

    assert_eq!(layer.favorite_ids(), refs(&["a", "c"]));
    assert_eq!(layer.exploration_ids(), refs(&["b"]));
    for id in layer.favorite_ids() {
        assert!(layer.catalog().index_of(&id).unwrap() < layer.catalog().len());
    }
}

#[tokio::test]
async fn storage_failure_keeps_last_persisted_state() {
    let (layer, store) = build(ScriptedRemote::default(), false);
    let a = DestinationRef::from("a");
    let b = DestinationRef::from("b");

    assert!(layer.toggle_favorite(&a).await);

    store.set_available(false);
    assert!(!layer.toggle_favorite(&b).await);
    assert!(layer.favorite_ids().is_empty());
    assert!(matches!(
        layer.last_error(Resource::Favorites),
        Some(SyncError::Storage { .. })
    ));

    store.set_available(true);
    assert_eq!(layer.favorite_ids(), refs(&["a"]));
}

// ============================================================================
// Signed-in mutations
// ============================================================================

#[tokio::test]
async fn signed_in_toggle_dispatches_save_and_refreshes() {
    let (layer, store) = build(ScriptedRemote::with_profile(profile(vec![], vec![])), true);
    layer.refresh_profile().await.unwrap();

    assert_eq!(
        layer.try_toggle_favorite(&"b".into()).await,
        Ok(FavoriteChange::Submitted)
    );
    assert_eq!(layer.favorite_ids(), refs(&["b"]));
    assert_eq!(
        layer.remote().calls(),
        vec![Call::GetProfile, Call::SaveFavorite(1), Call::GetProfile]
    );
    assert!(store.is_empty());
}

#[tokio::test]
async fn signed_in_toggle_is_add_only_without_removal_support() {
    let (layer, _store) = build(ScriptedRemote::with_profile(profile(vec![1], vec![])), true);
    layer.refresh_profile().await.unwrap();

    assert_eq!(
        layer.try_toggle_favorite(&"b".into()).await,
        Ok(FavoriteChange::Submitted)
    );
    assert_eq!(layer.remote().mutations(), vec![Call::SaveFavorite(1)]);
    assert_eq!(layer.favorite_ids(), refs(&["b"]));
}

#[tokio::test]
async fn signed_in_toggle_removes_when_supported() {
    let remote = ScriptedRemote::with_profile(profile(vec![1, 2], vec![])).with_removal();
    let (layer, _store) = build(remote, true);
    layer.refresh_profile().await.unwrap();

    assert_eq!(
        layer.try_toggle_favorite(&"b".into()).await,
        Ok(FavoriteChange::RemovedRemote)
    );
    assert_eq!(layer.favorite_ids(), refs(&["c"]));

    assert_eq!(
        layer.try_toggle_favorite(&"b".into()).await,
        Ok(FavoriteChange::Submitted)
    );
    assert_eq!(layer.favorite_ids(), refs(&["c", "b"]));
}

#[tokio::test]
async fn local_favorite_never_triggers_remote_removal() {
    let remote = ScriptedRemote::with_profile(profile(vec![], vec![])).with_removal();
    let (layer, _store) = build(remote, true);
    // Favorited while signed out; no remote profile fetched yet
    assert!(layer.cache().set_favorites(&["a".to_string()]));
    assert!(layer.is_favorite(&"a".into()));

    assert_eq!(
        layer.try_toggle_favorite(&"a".into()).await,
        Ok(FavoriteChange::Submitted)
    );
    assert_eq!(layer.remote().mutations(), vec![Call::SaveFavorite(0)]);
    assert_eq!(layer.favorite_ids(), refs(&["a"]));
    assert_eq!(layer.profile().unwrap().saved_favorites, vec![0]);
}

#[tokio::test]
async fn missing_remote_profile_toggle_saves_instead_of_removing() {
    let (layer, _store) = build(ScriptedRemote::default().with_removal(), true);
    assert!(layer.cache().set_favorites(&["b".to_string()]));
    assert_eq!(layer.refresh_profile().await, Ok(None));

    assert_eq!(
        layer.try_toggle_favorite(&"b".into()).await,
        Ok(FavoriteChange::Submitted)
    );
    assert_eq!(layer.remote().mutations(), vec![Call::SaveFavorite(1)]);
}

#[tokio::test]
async fn signed_in_without_profile_uses_local_view_but_remote_writes() {
    let (layer, store) = build(ScriptedRemote::default(), true);
    layer.cache().set_favorites(&["a".to_string()]);

    // No profile fetched yet: local view
    assert_eq!(layer.favorite_ids(), refs(&["a"]));

    assert!(layer.toggle_favorite(&"c".into()).await);
    assert_eq!(layer.remote().mutations(), vec![Call::SaveFavorite(2)]);
    // Local list untouched by a signed-in toggle
    assert_eq!(layer.cache().favorites(), vec!["a".to_string()]);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn signed_in_exploration_is_dispatched() {
    let (layer, _store) = build(ScriptedRemote::with_profile(profile(vec![], vec![0])), true);
    layer.refresh_profile().await.unwrap();

    assert_eq!(
        layer.try_log_exploration(&"c".into()).await,
        Ok(ExplorationChange::Submitted)
    );
    assert_eq!(layer.exploration_ids(), refs(&["a", "c"]));
    assert!(layer.cache().explorations().is_empty());
}

#[tokio::test]
async fn remote_failure_surfaces_without_retry() {
    let (layer, _store) = build(ScriptedRemote::with_profile(profile(vec![0], vec![])), true);
    layer.refresh_profile().await.unwrap();
    layer.remote().set_failing(true);

    assert!(!layer.toggle_favorite(&"b".into()).await);
    assert_eq!(layer.remote().mutations(), vec![Call::SaveFavorite(1)]);
    assert!(matches!(
        layer.last_error(Resource::Favorites),
        Some(SyncError::Remote {
            status_code: Some(503),
            ..
        })
    ));
    assert_eq!(layer.mutation_state(Resource::Favorites), MutationState::Idle);

    // A failed refresh keeps the previous snapshot
    assert!(layer.refresh_profile().await.is_err());
    assert_eq!(layer.favorite_ids(), refs(&["a"]));

    // The next success clears the recorded error
    layer.remote().set_failing(false);
    assert!(layer.toggle_favorite(&"b".into()).await);
    assert_eq!(layer.last_error(Resource::Favorites), None);
    assert_eq!(layer.favorite_ids(), refs(&["a", "b"]));
}

// ============================================================================
// Mutation queue
// ============================================================================

#[tokio::test]
async fn mutation_is_pending_while_dispatching() {
    let (layer, _store) = build(ScriptedRemote::with_profile(profile(vec![], vec![])), true);
    let a = DestinationRef::from("a");

    assert!(!layer.is_pending(Resource::Favorites));

    let mut toggle = pin!(layer.toggle_favorite(&a));
    let first = std::future::poll_fn(|cx| Poll::Ready(toggle.as_mut().poll(cx))).await;
    assert!(first.is_pending());
    assert!(layer.is_pending(Resource::Favorites));
    assert!(!layer.is_pending(Resource::Explorations));

    assert!(toggle.await);
    assert!(!layer.is_pending(Resource::Favorites));
}

#[tokio::test]
async fn mutations_of_one_resource_never_overlap() {
    let (layer, _store) = build(ScriptedRemote::with_profile(profile(vec![], vec![])), true);
    let a = DestinationRef::from("a");
    let b = DestinationRef::from("b");
    let c = DestinationRef::from("c");

    let (ra, rb, rc) = tokio::join!(
        layer.toggle_favorite(&a),
        layer.toggle_favorite(&b),
        layer.toggle_favorite(&c),
    );
    assert!(ra && rb && rc);
    assert_eq!(layer.remote().max_active.load(Ordering::SeqCst), 1);

    let saves: Vec<Call> = layer.remote().mutations();
    assert_eq!(
        saves,
        vec![Call::SaveFavorite(0), Call::SaveFavorite(1), Call::SaveFavorite(2)]
    );
    assert_eq!(layer.favorite_ids(), refs(&["a", "b", "c"]));
}

#[tokio::test]
async fn concurrent_anonymous_toggles_of_same_ref_cancel_out() {
    let (layer, _store) = build(ScriptedRemote::default(), false);
    let a = DestinationRef::from("a");

    let (first, second) = tokio::join!(layer.toggle_favorite(&a), layer.toggle_favorite(&a));
    assert!(first && second);
    assert!(layer.favorite_ids().is_empty());
}

// ============================================================================
// Session lifecycle
// ============================================================================

#[tokio::test]
async fn sign_out_returns_to_local_view() {
    let (layer, _store) = build(ScriptedRemote::with_profile(profile(vec![0, 1], vec![])), true);
    layer.cache().set_favorites(&["c".to_string()]);
    layer.refresh_profile().await.unwrap();
    assert_eq!(layer.favorite_ids(), refs(&["a", "b"]));

    layer.sign_out();
    assert!(!layer.session().is_authenticated());
    assert_eq!(layer.profile(), None);
    assert_eq!(layer.favorite_ids(), refs(&["c"]));

    // Local entries are not migrated on sign-in either
    layer.session().sign_in(Identity::new(PRINCIPAL));
    layer.refresh_profile().await.unwrap();
    assert_eq!(layer.favorite_ids(), refs(&["a", "b"]));
    assert_eq!(layer.cache().favorites(), vec!["c".to_string()]);
}

#[tokio::test]
async fn snapshot_is_scoped_to_principal() {
    let (layer, _store) = build(ScriptedRemote::with_profile(profile(vec![2], vec![])), true);
    layer.refresh_profile().await.unwrap();
    assert_eq!(layer.favorite_ids(), refs(&["c"]));

    layer.session().sign_in(Identity::new("someone-else"));
    assert_eq!(layer.profile(), None);
    assert!(layer.favorite_ids().is_empty());
}

#[tokio::test]
async fn refresh_while_signed_out_clears_snapshot() {
    let (layer, _store) = build(ScriptedRemote::with_profile(profile(vec![0], vec![])), true);
    layer.refresh_profile().await.unwrap();

    layer.session().sign_out();
    assert_eq!(layer.refresh_profile().await, Ok(None));
    assert_eq!(layer.remote().calls(), vec![Call::GetProfile]);
}

#[tokio::test]
async fn create_profile_uses_abbreviated_principal() {
    let (layer, store) = build(ScriptedRemote::default(), true);

    assert!(layer.create_profile(UserRole::Host, None).await);
    assert_eq!(
        layer.remote().mutations(),
        vec![Call::CreateProfile(UserRole::Host, "rrkah-fqaaa-...".to_string())]
    );
    assert_eq!(layer.cache().user_role(), Some(UserRole::Host));
    assert_eq!(store.len(), 1);

    let created = layer.profile().unwrap();
    assert_eq!(created.role, UserRole::Host);
    assert!(created.saved_favorites.is_empty());
}

#[tokio::test]
async fn create_profile_with_explicit_name() {
    let (layer, _store) = build(ScriptedRemote::default(), true);

    layer
        .try_create_profile(UserRole::Traveller, Some("Asha"))
        .await
        .unwrap();
    assert_eq!(layer.profile().map(|p| p.display_name), Some("Asha".to_string()));
}

#[tokio::test]
async fn create_profile_succeeds_when_follow_up_fetch_fails() {
    let (layer, _store) = build(ScriptedRemote::default(), true);
    layer.remote().set_failing_fetch(true);

    assert!(layer.create_profile(UserRole::Host, None).await);
    assert_eq!(
        layer.remote().calls(),
        vec![
            Call::CreateProfile(UserRole::Host, "rrkah-fqaaa-...".to_string()),
            Call::GetProfile,
        ]
    );
    assert!(layer.profile().is_none());
    assert_eq!(layer.cache().user_role(), Some(UserRole::Host));

    layer.remote().set_failing_fetch(false);
    assert_eq!(layer.refresh_profile().await.unwrap().map(|p| p.role), Some(UserRole::Host));
}
