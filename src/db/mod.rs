// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Remote data layer (Supabase REST) and its in-memory counterpart.

pub mod memory;
pub mod supabase;

pub use memory::MemoryDb;
pub use supabase::SupabaseDb;

use crate::error::AppError;
use crate::models::{AiFeature, NewUsageLog, Profile, ProfileUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Table names as constants.
pub mod tables {
    pub const PROFILES: &str = "profiles";
    pub const AI_USAGE_LOGS: &str = "ai_usage_logs";
}

/// Remote profile rows, keyed by user ID.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch the row for `user_id`, if there is one.
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError>;

    /// Create or partially update the row for `user_id`.
    async fn upsert_profile(&self, user_id: &str, update: &ProfileUpdate)
        -> Result<(), AppError>;
}

/// Append-only AI usage log.
#[async_trait]
pub trait UsageLogStore: Send + Sync {
    async fn insert_usage(&self, entry: &NewUsageLog) -> Result<(), AppError>;

    /// Number of rows for `user_id`/`feature` with `created_at >= since`.
    async fn count_usage(
        &self,
        user_id: &str,
        feature: AiFeature,
        since: DateTime<Utc>,
    ) -> Result<u64, AppError>;
}
