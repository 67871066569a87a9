// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Email/password authentication routes.
//!
//! Signing in or up only talks to the auth backend; the profile follows
//! through the auth listener's SIGNED_IN handling.

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::error::Result;
use crate::models::AuthUser;
use crate::services::ProfileSnapshot;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/sign-in", post(sign_in))
        .route("/api/auth/sign-up", post(sign_up))
        .route("/api/auth/sign-out", post(sign_out))
}

#[derive(Deserialize, Validate)]
pub struct Credentials {
    #[validate(email)]
    email: String,
    #[validate(length(min = 6, max = 72))]
    password: String,
}

/// Sign in and return the signed-in user.
async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<AuthUser>> {
    credentials.validate()?;
    let session = state
        .auth
        .sign_in_with_password(&credentials.email, &credentials.password)
        .await?;
    Ok(Json(session.user))
}

/// Create an account. Returns `null` while email confirmation is pending.
async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<Option<AuthUser>>> {
    credentials.validate()?;
    let session = state
        .auth
        .sign_up(&credentials.email, &credentials.password)
        .await?;
    Ok(Json(session.map(|s| s.user)))
}

/// Sign out. Always succeeds locally.
async fn sign_out(State(state): State<Arc<AppState>>) -> Json<ProfileSnapshot> {
    state.profile_service.sign_out().await;
    Json(state.profile_service.snapshot())
}
