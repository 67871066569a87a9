// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Supabase Auth (GoTrue) client.
//!
//! Handles:
//! - Password sign-in and sign-up
//! - Session persistence in local storage
//! - Access token refresh when expiring
//! - Auth state change notifications

use crate::db::supabase::{http_client, DEFAULT_HTTP_TIMEOUT};
use crate::error::AppError;
use crate::models::{AuthEvent, AuthStateChange, AuthUser, Session};
use crate::storage::{keys, LocalStorage};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// Margin before token expiration when we proactively refresh (60 seconds).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Capacity of the auth event channel.
const AUTH_EVENT_CAPACITY: usize = 32;

/// Current session, shared with the REST client for bearer tokens.
pub type SharedSession = Arc<RwLock<Option<Session>>>;

/// Auth subsystem consumed by the reconciliation service.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Existing session, if the user is signed in.
    async fn current_session(&self) -> Result<Option<Session>, AppError>;

    /// Stream of auth transitions, in the order they happen.
    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange>;

    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> Result<Session, AppError>;

    /// Create an account. `None` when email confirmation is still pending.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, AppError>;

    async fn sign_out(&self) -> Result<(), AppError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// GoTrueClient - raw REST calls
// ─────────────────────────────────────────────────────────────────────────────

/// Low-level GoTrue API client.
#[derive(Clone)]
pub struct GoTrueClient {
    http: reqwest::Client,
    auth_url: String,
    anon_key: String,
}

/// Token grant response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .unwrap_or_else(|| Utc::now().timestamp() + self.expires_in);
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

impl GoTrueClient {
    pub fn new(project_url: &str, anon_key: &str) -> anyhow::Result<Self> {
        Ok(Self {
            http: http_client(DEFAULT_HTTP_TIMEOUT)?,
            auth_url: format!("{}/auth/v1", project_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
        })
    }

    async fn grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.auth_url))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Backend(format!("Token request failed: {}", e)))?;

        // GoTrue reports bad credentials and dead refresh tokens as 400 invalid_grant.
        if response.status().as_u16() == 400 {
            let body = response.text().await.unwrap_or_default();
            if body.contains(AppError::INVALID_CREDENTIALS) {
                return Err(AppError::Unauthorized);
            }
            return Err(AppError::BadRequest(body));
        }

        crate::db::supabase::check_response_json(response).await
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AppError> {
        let body = serde_json::json!({ "email": email, "password": password });
        Ok(self.grant("password", body).await?.into_session())
    }

    /// Create an account. Returns `None` when email confirmation is pending.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, AppError> {
        let response = self
            .http
            .post(format!("{}/signup", self.auth_url))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| AppError::Backend(format!("Sign-up request failed: {}", e)))?;

        let body: serde_json::Value = crate::db::supabase::check_response_json(response).await?;
        if body.get("access_token").is_none() {
            return Ok(None);
        }
        serde_json::from_value::<TokenResponse>(body)
            .map(|t| Some(t.into_session()))
            .map_err(|e| AppError::Backend(format!("JSON parse error: {}", e)))
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<Session, AppError> {
        let body = serde_json::json!({ "refresh_token": refresh_token });
        Ok(self.grant("refresh_token", body).await?.into_session())
    }

    /// Revoke the session server-side.
    pub async fn logout(&self, access_token: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(format!("{}/logout", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Backend(format!("Logout request failed: {}", e)))?;

        crate::db::supabase::check_response(response).await?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AuthClient - session lifecycle
// ─────────────────────────────────────────────────────────────────────────────

/// High-level auth client that owns the session lifecycle.
#[derive(Clone)]
pub struct AuthClient {
    client: GoTrueClient,
    storage: LocalStorage,
    session: SharedSession,
    events: broadcast::Sender<AuthStateChange>,
}

impl AuthClient {
    pub fn new(
        project_url: &str,
        anon_key: &str,
        storage: LocalStorage,
    ) -> anyhow::Result<Self> {
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Ok(Self {
            client: GoTrueClient::new(project_url, anon_key)?,
            storage,
            session: Arc::new(RwLock::new(None)),
            events,
        })
    }

    /// Handle to the live session for other Supabase clients.
    pub fn shared_session(&self) -> SharedSession {
        self.session.clone()
    }

    fn cached(&self) -> Option<Session> {
        self.session.read().ok().and_then(|s| s.clone())
    }

    async fn store_session(&self, session: Option<Session>) {
        match &session {
            Some(s) => self.storage.set_json(keys::AUTH_SESSION, s).await,
            None => self.storage.remove(keys::AUTH_SESSION).await,
        }
        if let Ok(mut current) = self.session.write() {
            *current = session;
        }
    }

    fn emit(&self, event: AuthEvent, session: Option<Session>) {
        // No receivers is fine.
        let _ = self.events.send(AuthStateChange { event, session });
    }

    fn needs_refresh(session: &Session) -> bool {
        Utc::now().timestamp() + TOKEN_REFRESH_MARGIN_SECS >= session.expires_at
    }
}

#[async_trait]
impl AuthBackend for AuthClient {
    async fn current_session(&self) -> Result<Option<Session>, AppError> {
        let session = match self.cached() {
            Some(s) => s,
            None => match self.storage.get_json::<Session>(keys::AUTH_SESSION).await {
                Some(s) => s,
                None => return Ok(None),
            },
        };

        if !Self::needs_refresh(&session) {
            if let Ok(mut current) = self.session.write() {
                *current = Some(session.clone());
            }
            return Ok(Some(session));
        }

        tracing::info!(user_id = %session.user.id, "Access token expired, refreshing");
        match self.client.refresh(&session.refresh_token).await {
            Ok(fresh) => {
                self.store_session(Some(fresh.clone())).await;
                self.emit(AuthEvent::TokenRefreshed, Some(fresh.clone()));
                Ok(Some(fresh))
            }
            Err(AppError::Unauthorized) => {
                tracing::warn!(user_id = %session.user.id, "Refresh token rejected, dropping session");
                self.store_session(None).await;
                Ok(None)
            }
            Err(e) => {
                // Offline: keep the stale session so the user stays signed in.
                tracing::warn!(error = %e, "Token refresh failed, keeping stored session");
                Ok(Some(session))
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AppError> {
        let session = self.client.sign_in_with_password(email, password).await?;
        self.store_session(Some(session.clone())).await;
        tracing::info!(user_id = %session.user.id, "Signed in");
        self.emit(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, AppError> {
        let session = self.client.sign_up(email, password).await?;
        if let Some(session) = &session {
            self.store_session(Some(session.clone())).await;
            tracing::info!(user_id = %session.user.id, "Signed up");
            self.emit(AuthEvent::SignedIn, Some(session.clone()));
        }
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        let remote = match self.cached() {
            Some(session) => self.client.logout(&session.access_token).await,
            None => Ok(()),
        };

        // Local session is dropped even if the server call failed.
        self.store_session(None).await;
        self.emit(AuthEvent::SignedOut, None);
        remote
    }
}
