// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! AI usage metering model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// AI-backed feature subject to metering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum AiFeature {
    FoodScan,
    ManualFoodScan,
    ExerciseAi,
    DietPlan,
    AiSuggestions,
    WeightLog,
}

impl AiFeature {
    pub const ALL: [AiFeature; 6] = [
        AiFeature::FoodScan,
        AiFeature::ManualFoodScan,
        AiFeature::ExerciseAi,
        AiFeature::DietPlan,
        AiFeature::AiSuggestions,
        AiFeature::WeightLog,
    ];

    /// Value stored in the `feature` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            AiFeature::FoodScan => "food_scan",
            AiFeature::ManualFoodScan => "manual_food_scan",
            AiFeature::ExerciseAi => "exercise_ai",
            AiFeature::DietPlan => "diet_plan",
            AiFeature::AiSuggestions => "ai_suggestions",
            AiFeature::WeightLog => "weight_log",
        }
    }

    /// Weight logging is free for everyone and never recorded.
    pub fn is_metered(&self) -> bool {
        !matches!(self, AiFeature::WeightLog)
    }
}

impl std::fmt::Display for AiFeature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quota window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum TimeFrame {
    /// Since local midnight
    #[default]
    Daily,
    /// Trailing 7×24h, not a calendar week
    Weekly,
}

/// Row inserted into `ai_usage_logs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUsageLog {
    pub user_id: String,
    pub feature: AiFeature,
    pub created_at: DateTime<Utc>,
}
