// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-device key-value storage.
//!
//! Holds:
//! - The guest profile singleton
//! - A cached copy of each signed-in user's last known profile
//! - The persisted auth session

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::AppError;
use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

const MAX_CONCURRENT_REMOVALS: usize = 16;

/// Storage key names as constants.
pub mod keys {
    /// Guest profile written at the end of local onboarding
    pub const GUEST_PROFILE: &str = "local_profile";
    /// Prefix of the per-user remote profile cache
    pub const PROFILE_CACHE_PREFIX: &str = "profile_cache_";
    /// Session persisted by the auth client
    pub const AUTH_SESSION: &str = "auth_session";

    pub fn profile_cache(user_id: &str) -> String {
        format!("{}{}", PROFILE_CACHE_PREFIX, user_id)
    }
}

/// Raw string key-value store. Each call touches a single key.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), AppError>;
    async fn remove(&self, key: &str) -> Result<(), AppError>;
    async fn keys(&self) -> Result<Vec<String>, AppError>;
}

/// Typed JSON access over a [`LocalStore`].
///
/// Storage failures are logged and reported as "absent" so that a broken
/// device store degrades to a cold start instead of an error.
#[derive(Clone)]
pub struct LocalStorage {
    store: Arc<dyn LocalStore>,
}

impl LocalStorage {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// Read and decode a JSON value.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(value) => value?,
            Err(e) => {
                tracing::warn!(key, error = %e, "Error reading from local storage");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding unreadable local storage entry");
                None
            }
        }
    }

    /// Encode and write a JSON value.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to encode local storage entry");
                return;
            }
        };

        if let Err(e) = self.store.set(key, &raw).await {
            tracing::warn!(key, error = %e, "Error writing to local storage");
        }
    }

    pub async fn remove(&self, key: &str) {
        if let Err(e) = self.store.remove(key).await {
            tracing::warn!(key, error = %e, "Error removing from local storage");
        }
    }

    /// Remove every key starting with `prefix`. Returns how many were removed.
    pub async fn remove_prefixed(&self, prefix: &str) -> usize {
        let matching: Vec<String> = match self.store.keys().await {
            Ok(keys) => keys.into_iter().filter(|k| k.starts_with(prefix)).collect(),
            Err(e) => {
                tracing::warn!(prefix, error = %e, "Error listing local storage keys");
                return 0;
            }
        };

        let store = &self.store;
        stream::iter(matching)
            .map(|key| async move {
                match store.remove(&key).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "Error removing from local storage");
                        false
                    }
                }
            })
            .buffer_unordered(MAX_CONCURRENT_REMOVALS)
            .filter(|removed| std::future::ready(*removed))
            .count()
            .await
    }
}
