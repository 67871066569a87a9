// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile, AI usage and nutrition routes.
//!
//! The bridge token middleware is applied in routes/mod.rs.

use crate::error::{AppError, Result};
use crate::models::{AiFeature, ProfileUpdate, TimeFrame, Units};
use crate::services::intake::{self, CalorieEntry, ChartRange, DayCalories, StreakDay};
use crate::services::limiter::{DenyReason, LimitPrompt};
use crate::services::{calculate_plan, NutritionInput, NutritionPlan, ProfileSnapshot};
use crate::time_utils::Clock;
use crate::units;
use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/profile", get(get_profile).patch(update_profile))
        .route("/api/profile/local", put(save_local_profile))
        .route("/api/profile/refetch", post(refetch_profile))
        .route("/api/limits/check", post(check_limit))
        .route("/api/usage", post(log_usage))
        .route("/api/nutrition/plan", post(nutrition_plan))
        .route("/api/charts/calories", post(calorie_chart))
        .route("/api/charts/streak", post(streak_calendar))
}

// ─── Profile ─────────────────────────────────────────────────

async fn get_profile(State(state): State<Arc<AppState>>) -> Json<ProfileSnapshot> {
    Json(state.profile_service.snapshot())
}

/// Update the active profile (remote when signed in, local for guests).
async fn update_profile(
    State(state): State<Arc<AppState>>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ProfileSnapshot>> {
    update.validate()?;
    if update.is_empty() {
        return Err(AppError::BadRequest("No fields to update".to_string()));
    }
    state.profile_service.update_profile(&update).await?;
    Ok(Json(state.profile_service.snapshot()))
}

async fn save_local_profile(
    State(state): State<Arc<AppState>>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ProfileSnapshot>> {
    update.validate()?;
    state.profile_service.save_local_profile(&update).await?;
    Ok(Json(state.profile_service.snapshot()))
}

#[derive(Deserialize, Default)]
pub struct RefetchRequest {
    #[serde(default)]
    user_id: Option<String>,
}

async fn refetch_profile(
    State(state): State<Arc<AppState>>,
    body: Option<Json<RefetchRequest>>,
) -> Json<ProfileSnapshot> {
    let Json(request) = body.unwrap_or_default();
    state
        .profile_service
        .refetch_profile(request.user_id.as_deref())
        .await;
    Json(state.profile_service.snapshot())
}

// ─── AI Usage ────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LimitCheckRequest {
    feature: AiFeature,
    limit: u32,
    #[serde(default)]
    time_frame: TimeFrame,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LimitCheckResponse {
    pub allowed: bool,
    pub reason: Option<DenyReason>,
    pub prompt: Option<LimitPrompt>,
}

async fn check_limit(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LimitCheckRequest>,
) -> Json<LimitCheckResponse> {
    let decision = state
        .limiter
        .check_limit(request.feature, request.limit, request.time_frame)
        .await;
    let reason = decision.reason();

    Json(LimitCheckResponse {
        allowed: decision.is_allowed(),
        reason,
        prompt: reason.and_then(|r| r.prompt()),
    })
}

#[derive(Deserialize)]
pub struct UsageRequest {
    feature: AiFeature,
}

async fn log_usage(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UsageRequest>,
) -> StatusCode {
    state.limiter.log_usage(request.feature).await;
    StatusCode::NO_CONTENT
}

// ─── Nutrition ───────────────────────────────────────────────

/// Body stats for a plan. Missing stats are taken from the current profile.
#[derive(Deserialize, Validate)]
pub struct NutritionRequest {
    #[validate(range(max = 14))]
    workouts_per_week: u32,
    /// Units of `weight` and `height`; metric if absent.
    #[serde(default)]
    units: Option<Units>,
    #[validate(range(min = 20.0, max = 1100.0))]
    weight: Option<f64>,
    /// Centimetres, or inches when imperial.
    #[validate(range(min = 0.0, max = 300.0))]
    height: Option<f64>,
    /// Whole feet of an imperial height; `height` then holds the inches.
    #[validate(range(min = 1, max = 8))]
    height_feet: Option<u32>,
    #[validate(range(min = 1, max = 120))]
    age: Option<u32>,
    /// Store the result as the profile's goals.
    #[serde(default)]
    apply: bool,
}

impl NutritionRequest {
    /// Merge the request's stats over the profile's, converted to metric.
    fn to_update(&self) -> ProfileUpdate {
        let imperial = self.units == Some(Units::Imperial);
        ProfileUpdate {
            weight: self
                .weight
                .map(|w| if imperial { units::round1(units::lb_to_kg(w)) } else { w }),
            height: match (imperial, self.height_feet) {
                (true, Some(feet)) => Some(units::round1(units::feet_inches_to_cm(
                    feet,
                    self.height.unwrap_or(0.0),
                ))),
                (true, None) => self.height.map(|h| units::round1(units::inches_to_cm(h))),
                (false, _) => self.height,
            },
            age: self.age,
            ..Default::default()
        }
    }
}

async fn nutrition_plan(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NutritionRequest>,
) -> Result<Json<NutritionPlan>> {
    request.validate()?;

    let mut profile = state.profile_service.snapshot().profile.unwrap_or_default();
    request.to_update().apply_to(&mut profile);

    let plan = calculate_plan(&NutritionInput::from_profile(
        &profile,
        request.workouts_per_week,
    )?);

    if request.apply {
        state.profile_service.update_profile(&plan.to_update()).await?;
        tracing::info!(calories = plan.calories, "Nutrition plan applied to profile");
    }

    Ok(Json(plan))
}

// ─── Charts ──────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CalorieChartRequest {
    range: ChartRange,
    /// Food and exercise entries for up to a year back.
    #[serde(default)]
    entries: Vec<CalorieEntry>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CalorieChartResponse {
    /// The requested range, narrowed when there is too little history.
    pub range: ChartRange,
    pub available_ranges: Vec<ChartRange>,
    pub series: Vec<DayCalories>,
}

async fn calorie_chart(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CalorieChartRequest>,
) -> Json<CalorieChartResponse> {
    let now = state.clock.now();
    let logged_days = intake::distinct_days(&request.entries, now.offset());
    let range = request.range.clamp_to(logged_days);

    Json(CalorieChartResponse {
        range,
        available_ranges: intake::available_ranges(logged_days),
        series: intake::calorie_series(&request.entries, range, now),
    })
}

#[derive(Deserialize)]
pub struct StreakRequest {
    #[serde(default)]
    streak_days: Vec<String>,
}

async fn streak_calendar(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StreakRequest>,
) -> Json<Vec<StreakDay>> {
    Json(intake::streak_week(&request.streak_days, state.clock.now()))
}
