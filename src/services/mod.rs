// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod auth;
pub mod intake;
pub mod limiter;
pub mod nutrition;
pub mod profile;

pub use auth::{AuthBackend, AuthClient, GoTrueClient, SharedSession};
pub use limiter::{DenyReason, LimitDecision, LimitPrompt, UsageLimiter};
pub use nutrition::{calculate_plan, NutritionInput, NutritionPlan};
pub use profile::{ProfileService, ProfileSnapshot};
