// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process implementation of the remote stores.
//!
//! Used by tests and by offline runs of the bridge.

use crate::db::{ProfileStore, UsageLogStore};
use crate::error::AppError;
use crate::models::{AiFeature, NewUsageLog, Profile, ProfileUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryDb {
    profiles: DashMap<String, Profile>,
    usage: Mutex<Vec<NewUsageLog>>,
    profile_reads: AtomicUsize,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace a profile row.
    pub fn put_profile(&self, user_id: &str, profile: Profile) {
        self.profiles.insert(user_id.to_string(), profile);
    }

    /// Number of `get_profile` calls served so far.
    pub fn profile_reads(&self) -> usize {
        self.profile_reads.load(Ordering::SeqCst)
    }

    /// Snapshot of all logged usage rows.
    pub fn usage_rows(&self) -> Vec<NewUsageLog> {
        self.usage.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ProfileStore for MemoryDb {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError> {
        self.profile_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.profiles.get(user_id).map(|p| p.value().clone()))
    }

    async fn upsert_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<(), AppError> {
        let mut entry = self.profiles.entry(user_id.to_string()).or_insert_with(|| Profile {
            id: Some(user_id.to_string()),
            ..Default::default()
        });
        update.apply_to(&mut *entry);
        entry.updated_at = Some(crate::time_utils::format_utc_rfc3339(Utc::now()));
        Ok(())
    }
}

#[async_trait]
impl UsageLogStore for MemoryDb {
    async fn insert_usage(&self, entry: &NewUsageLog) -> Result<(), AppError> {
        self.usage
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry.clone());
        Ok(())
    }

    async fn count_usage(
        &self,
        user_id: &str,
        feature: AiFeature,
        since: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let count = self
            .usage
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|row| row.user_id == user_id && row.feature == feature)
            .filter(|row| row.created_at >= since)
            .count();
        Ok(count as u64)
    }
}
