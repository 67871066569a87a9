// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Calorie tracker core: profile reconciliation and AI usage limits
//!
//! This crate keeps one consistent view of who the user is (guest or
//! signed in) and which profile applies, decides whether AI-backed
//! features may run, and serves both to the app shell over a local
//! HTTP bridge.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod storage;
pub mod time_utils;
pub mod units;

use config::Config;
use services::{AuthBackend, ProfileService, UsageLimiter};
use std::sync::Arc;
use time_utils::Clock;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub auth: Arc<dyn AuthBackend>,
    pub profile_service: ProfileService,
    pub limiter: UsageLimiter,
    /// Device-local "now" for day bucketing.
    pub clock: Arc<dyn Clock>,
}
