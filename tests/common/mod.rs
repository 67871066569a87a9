// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use calorie_tracker::config::Config;
use calorie_tracker::db::{MemoryDb, ProfileStore, UsageLogStore};
use calorie_tracker::error::AppError;
use calorie_tracker::models::{
    AiFeature, AuthEvent, AuthStateChange, AuthUser, NewUsageLog, Profile, ProfileUpdate, Session,
};
use calorie_tracker::routes::create_router;
use calorie_tracker::services::{AuthBackend, ProfileService, ProfileSnapshot, UsageLimiter};
use calorie_tracker::storage::{LocalStorage, MemoryStore};
use calorie_tracker::time_utils::{Clock, SystemClock};
use calorie_tracker::AppState;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

pub const FETCH_TIMEOUT: Duration = Duration::from_millis(4000);
pub const LOADING_DEADLINE: Duration = Duration::from_millis(3000);

/// Session for `user_id` that will not need a refresh during a test.
#[allow(dead_code)]
pub fn session_for(user_id: &str) -> Session {
    Session {
        access_token: format!("access-{}", user_id),
        refresh_token: format!("refresh-{}", user_id),
        expires_at: Utc::now().timestamp() + 3600,
        user: AuthUser {
            id: user_id.to_string(),
            email: Some(format!("{}@example.com", user_id)),
        },
    }
}

/// Remote profile row as the backend would return it.
#[allow(dead_code)]
pub fn remote_profile(user_id: &str, name: &str) -> Profile {
    Profile {
        id: Some(user_id.to_string()),
        full_name: Some(name.to_string()),
        ..Default::default()
    }
}

// ─── Fakes ───────────────────────────────────────────────────

/// Scriptable auth backend.
pub struct FakeAuth {
    session: Mutex<Option<Session>>,
    events: broadcast::Sender<AuthStateChange>,
    pub fail_sign_out: AtomicBool,
    /// Remote sign-out never completes.
    pub stall_sign_out: AtomicBool,
    pub sign_out_calls: AtomicUsize,
}

#[allow(dead_code)]
impl FakeAuth {
    pub fn signed_out() -> Arc<Self> {
        let (events, _) = broadcast::channel(32);
        Arc::new(Self {
            session: Mutex::new(None),
            events,
            fail_sign_out: AtomicBool::new(false),
            stall_sign_out: AtomicBool::new(false),
            sign_out_calls: AtomicUsize::new(0),
        })
    }

    pub fn signed_in(user_id: &str) -> Arc<Self> {
        let auth = Self::signed_out();
        *auth.session.lock().unwrap() = Some(session_for(user_id));
        auth
    }

    /// Deliver an auth transition to subscribers.
    pub fn emit(&self, event: AuthEvent, session: Option<Session>) {
        let _ = self.events.send(AuthStateChange { event, session });
    }
}

#[async_trait]
impl AuthBackend for FakeAuth {
    async fn current_session(&self) -> Result<Option<Session>, AppError> {
        Ok(self.session.lock().unwrap().clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AppError> {
        if password == "wrong-password" {
            return Err(AppError::Unauthorized);
        }
        let user_id = email.split('@').next().unwrap_or(email);
        let session = session_for(user_id);
        *self.session.lock().unwrap() = Some(session.clone());
        self.emit(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, _email: &str, _password: &str) -> Result<Option<Session>, AppError> {
        Ok(None)
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        if self.stall_sign_out.load(Ordering::SeqCst) {
            return std::future::pending().await;
        }
        *self.session.lock().unwrap() = None;
        self.emit(AuthEvent::SignedOut, None);
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(AppError::Backend("network unreachable".to_string()));
        }
        Ok(())
    }
}

/// Profile store whose reads never complete.
#[allow(dead_code)]
pub struct StalledProfiles;

#[async_trait]
impl ProfileStore for StalledProfiles {
    async fn get_profile(&self, _user_id: &str) -> Result<Option<Profile>, AppError> {
        std::future::pending().await
    }

    async fn upsert_profile(&self, _user_id: &str, _update: &ProfileUpdate) -> Result<(), AppError> {
        std::future::pending().await
    }
}

/// Profile store that answers from `inner` after `delay`.
#[allow(dead_code)]
pub struct SlowProfiles {
    pub inner: Arc<MemoryDb>,
    pub delay: Duration,
}

#[async_trait]
impl ProfileStore for SlowProfiles {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_profile(user_id).await
    }

    async fn upsert_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<(), AppError> {
        self.inner.upsert_profile(user_id, update).await
    }
}

/// Profile store that is always unreachable.
#[allow(dead_code)]
pub struct FailingProfiles;

#[async_trait]
impl ProfileStore for FailingProfiles {
    async fn get_profile(&self, _user_id: &str) -> Result<Option<Profile>, AppError> {
        Err(AppError::Backend("503 Service Unavailable".to_string()))
    }

    async fn upsert_profile(&self, _user_id: &str, _update: &ProfileUpdate) -> Result<(), AppError> {
        Err(AppError::Backend("503 Service Unavailable".to_string()))
    }
}

/// Usage log that cannot be counted or written.
#[allow(dead_code)]
pub struct FailingUsageLog;

#[async_trait]
impl UsageLogStore for FailingUsageLog {
    async fn insert_usage(&self, _entry: &NewUsageLog) -> Result<(), AppError> {
        Err(AppError::Backend("insert failed".to_string()))
    }

    async fn count_usage(
        &self,
        _user_id: &str,
        _feature: AiFeature,
        _since: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        Err(AppError::Backend("count failed".to_string()))
    }
}

// ─── Builders ────────────────────────────────────────────────

/// Reconciliation service over the given collaborators, with the default
/// fetch timeout and loading deadline.
#[allow(dead_code)]
pub fn profile_service(
    auth: Arc<FakeAuth>,
    store: Arc<dyn ProfileStore>,
    storage: LocalStorage,
) -> ProfileService {
    ProfileService::new(auth, store, storage, FETCH_TIMEOUT, LOADING_DEADLINE)
}

/// Fresh in-memory device storage, plus a handle for inspecting it.
#[allow(dead_code)]
pub fn memory_storage() -> (LocalStorage, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (LocalStorage::new(store.clone()), store)
}

/// Wait (in virtual time) until the snapshot satisfies `f`.
#[allow(dead_code)]
pub async fn wait_for<F>(service: &ProfileService, f: F) -> ProfileSnapshot
where
    F: FnMut(&ProfileSnapshot) -> bool,
{
    let mut rx = service.subscribe();
    let snapshot = tokio::time::timeout(Duration::from_secs(30), rx.wait_for(f))
        .await
        .expect("snapshot condition not reached")
        .expect("profile service dropped")
        .clone();
    snapshot
}

/// Test app over in-memory stores.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub auth: Arc<FakeAuth>,
    pub db: Arc<MemoryDb>,
}

/// Create a test app with offline fakes. The profile service is running
/// but not initialized.
#[allow(dead_code)]
pub fn create_test_app(auth: Arc<FakeAuth>) -> TestApp {
    create_test_app_with_clock(auth, Arc::new(SystemClock))
}

#[allow(dead_code)]
pub fn create_test_app_with_clock(auth: Arc<FakeAuth>, clock: Arc<dyn Clock>) -> TestApp {
    let config = Config::test_default();
    let db = Arc::new(MemoryDb::new());
    let (storage, _) = memory_storage();

    let profile_service = profile_service(auth.clone(), db.clone(), storage);
    profile_service.spawn_auth_listener();
    let limiter = UsageLimiter::new(profile_service.clone(), db.clone(), clock.clone());

    let state = Arc::new(AppState {
        config,
        auth: auth.clone(),
        profile_service,
        limiter,
        clock,
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        auth,
        db,
    }
}
