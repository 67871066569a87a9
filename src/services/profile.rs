// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile reconciliation between the guest profile and the remote profile.
//!
//! Keeps a single [`ProfileSnapshot`] (session, user, profile, loading) in a
//! `watch` channel and converges it after every start-up and auth
//! transition:
//! - Signed in: cached copy first, then the remote row (bounded by a timeout)
//! - Signed out: the guest profile from local storage, if any
//!
//! Nothing here returns an error for a failed fetch. Failures are logged and
//! the current in-memory profile is kept, so callers only ever observe
//! `profile` and `loading` settling.

use crate::db::ProfileStore;
use crate::error::AppError;
use crate::models::{AuthEvent, AuthStateChange, AuthUser, Profile, ProfileUpdate, Session};
use crate::services::auth::AuthBackend;
use crate::storage::{keys, LocalStorage};
use crate::time_utils::format_utc_rfc3339;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// What the rest of the app sees.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileSnapshot {
    /// Tokens stay in-process.
    #[serde(skip)]
    pub session: Option<Session>,
    pub user: Option<AuthUser>,
    pub profile: Option<Profile>,
    pub loading: bool,
}

impl ProfileSnapshot {
    /// State at process start, before anything has been resolved.
    fn starting() -> Self {
        Self {
            session: None,
            user: None,
            profile: None,
            loading: true,
        }
    }

    fn signed_out() -> Self {
        Self {
            loading: false,
            ..Self::starting()
        }
    }
}

/// Profile reconciliation service.
///
/// Cheap to clone; all clones share one state.
#[derive(Clone)]
pub struct ProfileService {
    inner: Arc<Inner>,
}

struct Inner {
    auth: Arc<dyn AuthBackend>,
    store: Arc<dyn ProfileStore>,
    storage: LocalStorage,
    state: watch::Sender<ProfileSnapshot>,
    /// Bumped by every authoritative fetch and by sign-out. A fetch may only
    /// apply its result while the generation it started under is current.
    generation: AtomicU64,
    /// Cleared on shutdown; late results are dropped once false.
    alive: AtomicBool,
    fetch_timeout: Duration,
    loading_deadline: Duration,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ProfileService {
    pub fn new(
        auth: Arc<dyn AuthBackend>,
        store: Arc<dyn ProfileStore>,
        storage: LocalStorage,
        fetch_timeout: Duration,
        loading_deadline: Duration,
    ) -> Self {
        let (state, _) = watch::channel(ProfileSnapshot::starting());
        Self {
            inner: Arc::new(Inner {
                auth,
                store,
                storage,
                state,
                generation: AtomicU64::new(0),
                alive: AtomicBool::new(true),
                fetch_timeout,
                loading_deadline,
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    // ─── Observation ─────────────────────────────────────────────

    pub fn snapshot(&self) -> ProfileSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Receiver that is notified on every change.
    pub fn subscribe(&self) -> watch::Receiver<ProfileSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::SeqCst)
    }

    // ─── Lifecycle ───────────────────────────────────────────────

    /// Resolve the starting identity.
    ///
    /// With a session the remote fetch runs in the background; this returns
    /// as soon as it has been started. `loading` is cleared within the
    /// loading deadline regardless of how the fetch goes.
    pub async fn initialize(&self) {
        self.arm_loading_deadline();

        let session = match self.inner.auth.current_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read auth session, starting signed out");
                None
            }
        };

        if !self.is_alive() {
            return;
        }

        match session {
            Some(session) => {
                let user_id = session.user.id.clone();
                tracing::info!(user_id = %user_id, "Existing session found");
                self.inner.state.send_modify(|s| {
                    s.user = Some(session.user.clone());
                    s.session = Some(session);
                });

                let this = self.clone();
                self.track(tokio::spawn(async move {
                    this.fetch_profile(&user_id, false).await;
                }));
            }
            None => {
                let guest = self.load_guest_profile().await;
                tracing::info!(guest = guest.is_some(), "No session, starting signed out");
                self.inner.state.send_modify(|s| {
                    if guest.is_some() {
                        s.profile = guest;
                    }
                    s.loading = false;
                });
            }
        }
    }

    /// Apply auth transitions from the backend, in delivery order, until
    /// shutdown.
    pub fn spawn_auth_listener(&self) {
        let mut events = self.inner.auth.subscribe();
        let weak = Arc::downgrade(&self.inner);

        self.track(tokio::spawn(async move {
            loop {
                let change = match events.recv().await {
                    Ok(change) => change,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Auth listener lagged behind");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                let Some(service) = upgrade(&weak) else {
                    break;
                };
                service.on_auth_state_change(change).await;
            }
            tracing::debug!("Auth listener stopped");
        }));
    }

    /// Tear down: stop timers and listeners and ignore any late results.
    pub fn shutdown(&self) {
        self.inner.alive.store(false, Ordering::SeqCst);
        let tasks = std::mem::take(&mut *lock(&self.inner.tasks));
        for task in tasks {
            task.abort();
        }
        tracing::debug!("Profile service shut down");
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = lock(&self.inner.tasks);
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
    }

    fn arm_loading_deadline(&self) {
        let weak = Arc::downgrade(&self.inner);
        let deadline = self.inner.loading_deadline;

        self.track(tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            let Some(service) = upgrade(&weak) else {
                return;
            };
            service.inner.state.send_if_modified(|s| {
                if !s.loading {
                    return false;
                }
                tracing::warn!(
                    deadline_ms = deadline.as_millis() as u64,
                    "Loading deadline reached, releasing UI"
                );
                s.loading = false;
                true
            });
        }));
    }

    // ─── Fetching ────────────────────────────────────────────────

    /// Resolve the authoritative profile for `user_id`.
    ///
    /// 1. Non-silent: apply the per-user cached copy right away
    /// 2. Fetch the remote row, bounded by the fetch timeout
    /// 3. On success: sanitize, apply, refresh the cache
    /// 4. On failure: log and keep whatever is in memory
    ///
    /// Silent fetches never touch `loading`.
    pub async fn fetch_profile(&self, user_id: &str, silent: bool) {
        if !self.is_current_user(user_id) {
            tracing::warn!(user_id, "Ignoring profile fetch for a user who is not signed in");
            return;
        }
        let generation = self.begin_fetch(user_id, silent);

        if !silent {
            let cache_key = keys::profile_cache(user_id);
            if let Some(cached) = self.inner.storage.get_json::<Profile>(&cache_key).await {
                let cached = cached.sanitize_remote();
                if self.apply_if_current(user_id, generation, |s| {
                    s.profile = Some(cached);
                    s.loading = false;
                }) {
                    tracing::debug!(user_id, "Applied cached profile");
                }
            }
        }

        let fetched = match tokio::time::timeout(
            self.inner.fetch_timeout,
            self.inner.store.get_profile(user_id),
        )
        .await
        {
            Ok(Ok(Some(row))) => Some(row),
            Ok(Ok(None)) => {
                tracing::warn!(user_id, "No profile row for user yet");
                None
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    user_id,
                    error = %e,
                    recoverable = e.is_recoverable(),
                    "Profile fetch failed, keeping current profile"
                );
                None
            }
            Err(_) => {
                let e = AppError::Timeout(self.inner.fetch_timeout.as_millis() as u64);
                tracing::warn!(user_id, error = %e, "Profile fetch timed out, keeping current profile");
                None
            }
        };

        let Some(row) = fetched else {
            if !silent {
                self.apply_if_current(user_id, generation, |s| s.loading = false);
            }
            return;
        };

        let mut profile = row.sanitize_remote();
        profile.id = Some(user_id.to_string());

        let applied = self.apply_if_current(user_id, generation, |s| {
            s.profile = Some(profile.clone());
            if !silent {
                s.loading = false;
            }
        });

        if !applied {
            tracing::debug!(user_id, silent, "Discarding superseded profile fetch");
            return;
        }

        tracing::debug!(user_id, silent, "Profile fetched");
        self.inner
            .storage
            .set_json(&keys::profile_cache(user_id), &profile)
            .await;
    }

    /// Register a fetch and return the generation it runs under.
    ///
    /// An authoritative fetch supersedes all earlier fetches. A profile
    /// that belongs to somebody else is dropped rather than shown under
    /// this user, and `loading` stays up until this fetch settles.
    fn begin_fetch(&self, user_id: &str, silent: bool) -> u64 {
        let mut generation = 0;
        self.inner.state.send_if_modified(|s| {
            if silent {
                generation = self.inner.generation.load(Ordering::SeqCst);
                return false;
            }
            generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

            let owned = s.profile.as_ref().is_some_and(|p| p.belongs_to(user_id));
            if owned {
                return false;
            }
            s.profile = None;
            s.loading = true;
            true
        });
        generation
    }

    /// Apply `f` to the state if the service is alive, no newer
    /// authoritative fetch or sign-out has started, and `user_id` is still
    /// the current user. Returns whether it was applied.
    fn apply_if_current<F>(&self, user_id: &str, generation: u64, f: F) -> bool
    where
        F: FnOnce(&mut ProfileSnapshot),
    {
        if !self.is_alive() {
            return false;
        }

        let mut applied = false;
        self.inner.state.send_if_modified(|s| {
            if self.inner.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            if !s.user.as_ref().is_some_and(|u| u.id == user_id) {
                return false;
            }
            f(s);
            applied = true;
            true
        });
        applied
    }

    fn is_current_user(&self, user_id: &str) -> bool {
        self.inner
            .state
            .borrow()
            .user
            .as_ref()
            .is_some_and(|u| u.id == user_id)
    }

    // ─── Auth Transitions ────────────────────────────────────────

    pub async fn on_auth_state_change(&self, change: AuthStateChange) {
        if !self.is_alive() {
            return;
        }

        match change.event {
            AuthEvent::SignedIn => {
                let Some(session) = change.session else {
                    tracing::warn!("SIGNED_IN without a session, ignoring");
                    return;
                };
                let user_id = session.user.id.clone();

                let mut already_loaded = false;
                self.inner.state.send_modify(|s| {
                    already_loaded = s.profile.as_ref().is_some_and(|p| p.belongs_to(&user_id));
                    s.user = Some(session.user.clone());
                    s.session = Some(session);
                });

                tracing::info!(user_id = %user_id, silent = already_loaded, "Signed in");
                self.fetch_profile(&user_id, already_loaded).await;
            }
            AuthEvent::SignedOut => {
                tracing::info!("Signed out");
                self.reset_signed_out();
                self.inner.storage.remove(keys::GUEST_PROFILE).await;
            }
            AuthEvent::TokenRefreshed | AuthEvent::UserUpdated | AuthEvent::InitialSession => {
                if let Some(session) = change.session {
                    self.inner.state.send_modify(|s| {
                        s.user = Some(session.user.clone());
                        s.session = Some(session);
                    });
                }
            }
        }
    }

    fn reset_signed_out(&self) {
        self.inner.state.send_modify(|s| {
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            *s = ProfileSnapshot::signed_out();
        });
    }

    // ─── Mutations ───────────────────────────────────────────────

    async fn load_guest_profile(&self) -> Option<Profile> {
        let mut guest = self
            .inner
            .storage
            .get_json::<Profile>(keys::GUEST_PROFILE)
            .await?;
        guest.id = None;
        guest.is_guest = true;
        Some(guest)
    }

    /// Merge `update` into the guest profile and persist it.
    ///
    /// Only valid while nobody is signed in; a signed-in user's settings go
    /// through [`Self::update_profile`]. The in-memory profile is updated
    /// before the write to storage.
    pub async fn save_local_profile(&self, update: &ProfileUpdate) -> Result<Profile, AppError> {
        let snapshot = self.snapshot();
        if snapshot.user.is_some() {
            return Err(signed_in_error());
        }
        let mut profile = match snapshot.profile.filter(|p| p.is_guest) {
            Some(p) => p,
            None => self
                .load_guest_profile()
                .await
                .unwrap_or_else(Profile::new_guest),
        };

        update.apply_to(&mut profile);
        profile.id = None;
        profile.is_guest = true;
        profile.updated_at = Some(format_utc_rfc3339(chrono::Utc::now()));

        // A sign-in may have landed while the stored guest was being read.
        let mut applied = false;
        self.inner.state.send_if_modified(|s| {
            if s.user.is_some() {
                return false;
            }
            s.profile = Some(profile.clone());
            applied = true;
            true
        });
        if !applied {
            return Err(signed_in_error());
        }

        self.inner
            .storage
            .set_json(keys::GUEST_PROFILE, &profile)
            .await;

        tracing::debug!("Guest profile saved");
        Ok(profile)
    }

    /// Apply a settings change for whoever is active.
    ///
    /// Signed in: remote upsert, then a silent refetch. Guest: local save.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), AppError> {
        let Some(user) = self.snapshot().user else {
            self.save_local_profile(update).await?;
            return Ok(());
        };

        self.inner.store.upsert_profile(&user.id, update).await?;

        // Show the change now; the refetch brings back server-side fields.
        self.inner.state.send_modify(|s| {
            if let Some(profile) = s.profile.as_mut().filter(|p| p.belongs_to(&user.id)) {
                update.apply_to(profile);
            }
        });
        self.fetch_profile(&user.id, true).await;
        Ok(())
    }

    /// Silent refetch for the current user; without a user, re-apply the
    /// stored guest profile.
    ///
    /// An explicit `user_id` that is not the signed-in user is ignored.
    pub async fn refetch_profile(&self, user_id: Option<&str>) {
        let current = self.snapshot().user.map(|u| u.id);
        match (user_id, current) {
            (Some(requested), current) if current.as_deref() != Some(requested) => {
                tracing::warn!(
                    user_id = requested,
                    current = ?current,
                    "Ignoring refetch for a user who is not signed in"
                );
            }
            (_, Some(id)) => self.fetch_profile(&id, true).await,
            (_, None) => {
                if let Some(guest) = self.load_guest_profile().await {
                    self.inner.state.send_if_modified(|s| {
                        if s.user.is_some() {
                            return false;
                        }
                        s.profile = Some(guest);
                        true
                    });
                }
            }
        }
    }

    /// Sign out remotely and wipe all local identity state.
    ///
    /// The remote call is bounded by the fetch timeout. Cleanup runs on its
    /// own task, so it completes whether the remote call fails, hangs, or the
    /// caller stops waiting.
    pub async fn sign_out(&self) {
        let this = self.clone();
        let cleanup = tokio::spawn(async move { this.sign_out_and_clear().await });
        if let Err(e) = cleanup.await {
            tracing::error!(error = %e, "Sign-out task failed");
        }
    }

    async fn sign_out_and_clear(&self) {
        self.inner.state.send_modify(|s| s.loading = true);

        match tokio::time::timeout(self.inner.fetch_timeout, self.inner.auth.sign_out()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Remote sign-out failed, clearing local state anyway");
            }
            Err(_) => {
                let e = AppError::Timeout(self.inner.fetch_timeout.as_millis() as u64);
                tracing::warn!(error = %e, "Remote sign-out timed out, clearing local state anyway");
            }
        }

        let removed = self
            .inner
            .storage
            .remove_prefixed(keys::PROFILE_CACHE_PREFIX)
            .await;
        self.inner.storage.remove(keys::GUEST_PROFILE).await;
        self.reset_signed_out();

        tracing::info!(cache_entries_removed = removed, "Local session cleared");
    }
}

fn signed_in_error() -> AppError {
    AppError::BadRequest("A user is signed in; update the account profile instead".to_string())
}

fn upgrade(weak: &Weak<Inner>) -> Option<ProfileService> {
    let inner = weak.upgrade()?;
    if !inner.alive.load(Ordering::SeqCst) {
        return None;
    }
    Some(ProfileService { inner })
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
