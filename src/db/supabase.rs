// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Supabase PostgREST client with typed operations.
//!
//! Provides high-level operations for:
//! - Profiles (one row per user)
//! - AI usage logs (insert and windowed count)
//!
//! Requests carry the project's anon key plus the signed-in user's access
//! token so row-level security applies.

use crate::db::{tables, ProfileStore, UsageLogStore};
use crate::error::AppError;
use crate::models::{AiFeature, NewUsageLog, Profile, ProfileUpdate};
use crate::services::auth::SharedSession;
use crate::time_utils::format_utc_rfc3339;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Upper bound on any single Supabase request.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client shared by the auth and REST clients.
pub(crate) fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("failed building Supabase HTTP client")
}

/// Supabase REST database client.
#[derive(Clone)]
pub struct SupabaseDb {
    http: reqwest::Client,
    rest_url: String,
    anon_key: String,
    session: SharedSession,
}

impl SupabaseDb {
    /// Create a client for `{project_url}/rest/v1`.
    ///
    /// `session` is shared with the auth client and read on every request.
    pub fn new(
        project_url: &str,
        anon_key: &str,
        session: SharedSession,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            http: http_client(DEFAULT_HTTP_TIMEOUT)?,
            rest_url: format!("{}/rest/v1", project_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
            session,
        })
    }

    /// Bearer token for the current user, falling back to the anon key.
    fn bearer(&self) -> String {
        self.session
            .read()
            .ok()
            .and_then(|s| s.as_ref().map(|s| s.access_token.clone()))
            .unwrap_or_else(|| self.anon_key.clone())
    }

    fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}/{}", self.rest_url, table))
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
    }
}

/// Check response status and return error if not successful.
pub(crate) async fn check_response(
    response: reqwest::Response,
) -> Result<reqwest::Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();

    if status.as_u16() == 401 || status.as_u16() == 403 {
        tracing::warn!(status = status.as_u16(), "Supabase rejected credentials");
        return Err(AppError::Unauthorized);
    }

    if status.as_u16() == 429 {
        tracing::warn!("Supabase rate limit hit (429)");
    }

    Err(AppError::Backend(format!("HTTP {}: {}", status, body)))
}

/// Check response and parse JSON body.
pub(crate) async fn check_response_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    check_response(response)
        .await?
        .json()
        .await
        .map_err(|e| AppError::Backend(format!("JSON parse error: {}", e)))
}

/// Parse the total from a PostgREST `Content-Range` header (`0-9/42` or `*/0`).
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

#[async_trait]
impl ProfileStore for SupabaseDb {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError> {
        let response = self
            .request(reqwest::Method::GET, tables::PROFILES)
            .query(&[("select", "*".to_string()), ("id", format!("eq.{}", user_id))])
            .send()
            .await
            .map_err(|e| AppError::Backend(e.to_string()))?;

        let rows: Vec<Profile> = check_response_json(response).await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<(), AppError> {
        let mut body = serde_json::to_value(update)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Encode profile update: {}", e)))?;
        if let Some(fields) = body.as_object_mut() {
            fields.insert("id".to_string(), user_id.into());
            fields.insert(
                "updated_at".to_string(),
                format_utc_rfc3339(Utc::now()).into(),
            );
        }

        let response = self
            .request(reqwest::Method::POST, tables::PROFILES)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Backend(e.to_string()))?;

        check_response(response).await?;
        tracing::debug!(user_id, "Profile upserted");
        Ok(())
    }
}

#[async_trait]
impl UsageLogStore for SupabaseDb {
    async fn insert_usage(&self, entry: &NewUsageLog) -> Result<(), AppError> {
        let body = serde_json::json!({
            "user_id": entry.user_id,
            "feature": entry.feature,
            "created_at": format_utc_rfc3339(entry.created_at),
        });

        let response = self
            .request(reqwest::Method::POST, tables::AI_USAGE_LOGS)
            .header("Prefer", "return=minimal")
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Backend(e.to_string()))?;

        check_response(response).await?;
        Ok(())
    }

    async fn count_usage(
        &self,
        user_id: &str,
        feature: AiFeature,
        since: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let response = self
            .request(reqwest::Method::HEAD, tables::AI_USAGE_LOGS)
            .header("Prefer", "count=exact")
            .query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{}", user_id)),
                ("feature", format!("eq.{}", feature.as_str())),
                ("created_at", format!("gte.{}", format_utc_rfc3339(since))),
            ])
            .send()
            .await
            .map_err(|e| AppError::Backend(e.to_string()))?;

        let response = check_response(response).await?;
        response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| AppError::Backend("Missing or invalid Content-Range".to_string()))
    }
}
