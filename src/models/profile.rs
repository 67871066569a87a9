// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User profile model shared by guest and authenticated users.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Fallback daily targets for authenticated profiles with null goals.
pub const DEFAULT_GOAL_CALORIES: f64 = 2000.0;
pub const DEFAULT_GOAL_PROTEIN: f64 = 100.0;
pub const DEFAULT_GOAL_CARBS: f64 = 250.0;
pub const DEFAULT_GOAL_FATS: f64 = 60.0;
pub const DEFAULT_GOAL_SUGARS: f64 = 30.0;
pub const DEFAULT_GOAL_FIBER: f64 = 25.0;

/// Measurement system chosen during onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

/// Weight goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum Goal {
    #[serde(rename = "lose", alias = "lose_weight")]
    Lose,
    #[serde(rename = "maintain", alias = "maintain_weight")]
    Maintain,
    #[serde(rename = "gain", alias = "gain_weight")]
    Gain,
}

/// Per-user settings and state snapshot.
///
/// Stored in the `profiles` table for authenticated users and under the
/// guest key in local storage for guests. Unknown or missing fields fall
/// back to defaults so older rows and cache entries still load.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(default)]
pub struct Profile {
    // ─── Identity ────────────────────────────────────────────────
    /// Backend user ID (absent for guests)
    pub id: Option<String>,
    /// Derived from which store the profile came from
    #[serde(deserialize_with = "null_as_default")]
    pub is_guest: bool,
    pub full_name: Option<String>,
    /// Last modification (ISO 8601)
    pub updated_at: Option<String>,

    // ─── Physical Attributes ─────────────────────────────────────
    pub gender: Option<String>,
    pub age: Option<u32>,
    /// Height in centimeters
    pub height: Option<f64>,
    /// Weight in kilograms
    pub weight: Option<f64>,
    pub units: Option<Units>,

    // ─── Goals ───────────────────────────────────────────────────
    pub goal: Option<Goal>,
    pub goal_weight: Option<f64>,
    pub starting_weight: Option<f64>,
    /// Target change in kg per week
    pub weekly_rate: Option<f64>,
    pub goal_calories: Option<f64>,
    pub goal_protein: Option<f64>,
    pub goal_carbs: Option<f64>,
    pub goal_fats: Option<f64>,
    pub goal_sugars: Option<f64>,
    pub goal_fiber: Option<f64>,

    // ─── Onboarding ──────────────────────────────────────────────
    #[serde(deserialize_with = "null_as_default")]
    pub onboarding_completed: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub diet_onboarding_completed: bool,

    // ─── Subscription ────────────────────────────────────────────
    #[serde(deserialize_with = "null_as_default")]
    pub is_subscribed: bool,
    pub plan_type: Option<String>,
    pub trial_start_date: Option<String>,
    pub subscription_end_date: Option<String>,

    // ─── Cosmetic ────────────────────────────────────────────────
    pub avatar_color: Option<String>,
    /// "12h" or "24h"
    pub time_format: Option<String>,
}

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl Profile {
    /// Empty guest profile, the starting point for local onboarding.
    pub fn new_guest() -> Self {
        Self {
            is_guest: true,
            units: Some(Units::Metric),
            ..Default::default()
        }
    }

    /// Prepare a backend row for use: fill null nutrition goals with the
    /// defaults and mark it as non-guest.
    pub fn sanitize_remote(mut self) -> Self {
        self.goal_calories.get_or_insert(DEFAULT_GOAL_CALORIES);
        self.goal_protein.get_or_insert(DEFAULT_GOAL_PROTEIN);
        self.goal_carbs.get_or_insert(DEFAULT_GOAL_CARBS);
        self.goal_fats.get_or_insert(DEFAULT_GOAL_FATS);
        self.goal_sugars.get_or_insert(DEFAULT_GOAL_SUGARS);
        self.goal_fiber.get_or_insert(DEFAULT_GOAL_FIBER);
        self.is_guest = false;
        self
    }

    /// Whether this profile belongs to the given backend user.
    pub fn belongs_to(&self, user_id: &str) -> bool {
        !self.is_guest && self.id.as_deref() == Some(user_id)
    }
}

/// Partial profile update from a settings screen or onboarding step.
///
/// Identity fields (`id`, `is_guest`) are not settable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(deny_unknown_fields)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 100))]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 20))]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 120))]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 50.0, max = 300.0))]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 20.0, max = 500.0))]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<Units>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<Goal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 20.0, max = 500.0))]
    pub goal_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 20.0, max = 500.0))]
    pub starting_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 2.0))]
    pub weekly_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 10000.0))]
    pub goal_calories: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub goal_protein: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub goal_carbs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub goal_fats: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub goal_sugars: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub goal_fiber: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onboarding_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diet_onboarding_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 20))]
    pub avatar_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 8))]
    pub time_format: Option<String>,
}

impl ProfileUpdate {
    /// Merge the set fields into `profile`, leaving the rest untouched.
    pub fn apply_to(&self, profile: &mut Profile) {
        macro_rules! merge {
            ($($field:ident),* $(,)?) => {
                $(
                    if let Some(value) = &self.$field {
                        profile.$field = Some(value.clone());
                    }
                )*
            };
        }

        merge!(
            full_name,
            gender,
            age,
            height,
            weight,
            units,
            goal,
            goal_weight,
            starting_weight,
            weekly_rate,
            goal_calories,
            goal_protein,
            goal_carbs,
            goal_fats,
            goal_sugars,
            goal_fiber,
            avatar_color,
            time_format,
        );

        if let Some(done) = self.onboarding_completed {
            profile.onboarding_completed = done;
        }
        if let Some(done) = self.diet_onboarding_completed {
            profile.diet_onboarding_completed = done;
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
