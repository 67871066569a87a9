// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default bound on a single remote profile fetch.
pub const DEFAULT_PROFILE_FETCH_TIMEOUT_MS: u64 = 4000;
/// Default deadline after which `loading` is cleared no matter what.
pub const DEFAULT_LOADING_DEADLINE_MS: u64 = 3000;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Supabase project URL, e.g. `https://xyz.supabase.co`
    pub supabase_url: String,
    /// Supabase anon (public) API key
    pub supabase_anon_key: String,
    /// Shared secret the app shell presents to the local bridge
    pub bridge_token: String,
    /// Directory backing local persistent storage
    pub storage_dir: PathBuf,
    /// Bridge port (loopback only)
    pub port: u16,
    /// Upper bound for one remote profile fetch
    pub profile_fetch_timeout: Duration,
    /// Safety deadline for the initial `loading` flag
    pub loading_deadline: Duration,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test_anon_key".to_string(),
            bridge_token: "test_bridge_token".to_string(),
            storage_dir: PathBuf::from("target/test-storage"),
            port: 8787,
            profile_fetch_timeout: Duration::from_millis(DEFAULT_PROFILE_FETCH_TIMEOUT_MS),
            loading_deadline: Duration::from_millis(DEFAULT_LOADING_DEADLINE_MS),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            supabase_url: env::var("SUPABASE_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("SUPABASE_URL"))?,
            supabase_anon_key: env::var("SUPABASE_ANON_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("SUPABASE_ANON_KEY"))?,
            bridge_token: env::var("BRIDGE_TOKEN")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("BRIDGE_TOKEN"))?,
            storage_dir: env::var("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8787".to_string())
                .parse()
                .unwrap_or(8787),
            profile_fetch_timeout: millis_var(
                "PROFILE_FETCH_TIMEOUT_MS",
                DEFAULT_PROFILE_FETCH_TIMEOUT_MS,
            )?,
            loading_deadline: millis_var("LOADING_DEADLINE_MS", DEFAULT_LOADING_DEADLINE_MS)?,
        })
    }
}

fn millis_var(name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(Duration::from_millis(default)),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("SUPABASE_URL", "https://example.supabase.co/");
        env::set_var("SUPABASE_ANON_KEY", " anon ");
        env::set_var("BRIDGE_TOKEN", "bridge");
        env::set_var("LOADING_DEADLINE_MS", "2500");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.supabase_url, "https://example.supabase.co");
        assert_eq!(config.supabase_anon_key, "anon");
        assert_eq!(config.port, 8787);
        assert_eq!(config.loading_deadline, Duration::from_millis(2500));
        assert_eq!(
            config.profile_fetch_timeout,
            Duration::from_millis(DEFAULT_PROFILE_FETCH_TIMEOUT_MS)
        );
    }
}
