// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Daily nutrition targets from body stats and goal.
//!
//! Mifflin-St Jeor BMR, scaled by an activity multiplier, then shifted by
//! the weekly rate (1 kg of body fat ≈ 7700 kcal).

use crate::error::AppError;
use crate::models::{Goal, Profile, ProfileUpdate};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const KCAL_PER_KG: f64 = 7700.0;
/// Floor for weight-loss plans.
const MIN_SAFE_CALORIES: f64 = 1200.0;

const PROTEIN_RATIO: f64 = 0.30;
const CARB_RATIO: f64 = 0.35;
const FAT_RATIO: f64 = 0.35;
const SUGAR_RATIO: f64 = 0.10;
const FIBER_PER_1000_KCAL: f64 = 14.0;

const KCAL_PER_G_PROTEIN: f64 = 4.0;
const KCAL_PER_G_CARB: f64 = 4.0;
const KCAL_PER_G_FAT: f64 = 9.0;

/// Inputs in metric units.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NutritionInput {
    pub weight_kg: f64,
    pub height_cm: f64,
    pub age: u32,
    pub gender: Option<String>,
    pub workouts_per_week: u32,
    pub goal: Goal,
    /// kg per week
    pub weekly_rate: f64,
}

impl NutritionInput {
    /// Build from a profile; weight, height and age must be set.
    pub fn from_profile(profile: &Profile, workouts_per_week: u32) -> Result<Self, AppError> {
        let missing = |field: &str| AppError::BadRequest(format!("Profile has no {}", field));
        Ok(Self {
            weight_kg: profile.weight.ok_or_else(|| missing("weight"))?,
            height_cm: profile.height.ok_or_else(|| missing("height"))?,
            age: profile.age.ok_or_else(|| missing("age"))?,
            gender: profile.gender.clone(),
            workouts_per_week,
            goal: profile.goal.unwrap_or(Goal::Maintain),
            weekly_rate: profile.weekly_rate.unwrap_or(0.0),
        })
    }
}

/// Daily targets, rounded to whole units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct NutritionPlan {
    pub calories: u32,
    pub protein: u32,
    pub carbs: u32,
    pub fats: u32,
    pub sugars: u32,
    pub fiber: u32,
}

impl NutritionPlan {
    /// Profile update that sets these targets as goals.
    pub fn to_update(&self) -> ProfileUpdate {
        ProfileUpdate {
            goal_calories: Some(f64::from(self.calories)),
            goal_protein: Some(f64::from(self.protein)),
            goal_carbs: Some(f64::from(self.carbs)),
            goal_fats: Some(f64::from(self.fats)),
            goal_sugars: Some(f64::from(self.sugars)),
            goal_fiber: Some(f64::from(self.fiber)),
            ..Default::default()
        }
    }
}

fn activity_multiplier(workouts_per_week: u32) -> f64 {
    match workouts_per_week {
        6.. => 1.725,
        4..=5 => 1.55,
        2..=3 => 1.375,
        _ => 1.2,
    }
}

fn grams(calories: f64, ratio: f64, kcal_per_gram: f64) -> u32 {
    (calories * ratio / kcal_per_gram).round() as u32
}

pub fn calculate_plan(input: &NutritionInput) -> NutritionPlan {
    let mut bmr = 10.0 * input.weight_kg + 6.25 * input.height_cm - 5.0 * f64::from(input.age);
    let female = input
        .gender
        .as_deref()
        .is_some_and(|g| g.eq_ignore_ascii_case("female"));
    bmr += if female { -161.0 } else { 5.0 };

    let tdee = (bmr * activity_multiplier(input.workouts_per_week)).round();
    let daily_delta = (input.weekly_rate * KCAL_PER_KG / 7.0).round();

    let calories = match input.goal {
        Goal::Lose => (tdee - daily_delta).max(MIN_SAFE_CALORIES),
        Goal::Maintain => tdee,
        Goal::Gain => tdee + daily_delta,
    };

    NutritionPlan {
        calories: calories.round() as u32,
        protein: grams(calories, PROTEIN_RATIO, KCAL_PER_G_PROTEIN),
        carbs: grams(calories, CARB_RATIO, KCAL_PER_G_CARB),
        fats: grams(calories, FAT_RATIO, KCAL_PER_G_FAT),
        sugars: grams(calories, SUGAR_RATIO, KCAL_PER_G_CARB),
        fiber: (calories / 1000.0 * FIBER_PER_1000_KCAL).round() as u32,
    }
}
