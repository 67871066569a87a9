// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! AI usage limiting.
//!
//! Decides whether an AI-backed feature may run for the current caller and
//! records metered usage. Callers fall into one of four tiers:
//!
//! | Tier                    | weight_log | limit > 50   | metered feature |
//! |-------------------------|------------|--------------|-----------------|
//! | Subscribed              | allow      | allow        | allow           |
//! | Guest                   | allow      | deny premium | deny premium    |
//! | Free registered         | allow      | deny premium | quota count     |
//! | No user                 | allow      | deny         | deny            |

use crate::db::UsageLogStore;
use crate::models::{AiFeature, NewUsageLog, TimeFrame};
use crate::services::profile::{ProfileService, ProfileSnapshot};
use crate::time_utils::{start_of_day, Clock};
use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Limits above this mean "premium only" rather than a real quota.
pub const PREMIUM_ONLY_LIMIT_THRESHOLD: u32 = 50;

/// Capacity of the prompt channel.
const PROMPT_CAPACITY: usize = 16;

/// Why a check was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DenyReason {
    /// Guest profile: needs an account and a subscription
    AccountRequired,
    /// Nobody is signed in and there is no guest profile
    NotSignedIn,
    /// Free account asking for a subscriber-only feature
    PremiumOnly,
    /// Free account over its quota for the window
    QuotaExceeded { limit: u32, time_frame: TimeFrame },
    /// Usage could not be counted
    CheckFailed,
}

impl DenyReason {
    /// UI prompt to show for this denial, if any.
    pub fn prompt(&self) -> Option<LimitPrompt> {
        match *self {
            DenyReason::AccountRequired | DenyReason::PremiumOnly => Some(LimitPrompt::Premium),
            DenyReason::QuotaExceeded { limit, time_frame } => {
                Some(LimitPrompt::Quota { limit, time_frame })
            }
            DenyReason::NotSignedIn | DenyReason::CheckFailed => None,
        }
    }
}

/// Outcome of [`UsageLimiter::check_limit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitDecision {
    Allowed,
    Denied(DenyReason),
}

impl LimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, LimitDecision::Allowed)
    }

    pub fn reason(&self) -> Option<DenyReason> {
        match self {
            LimitDecision::Allowed => None,
            LimitDecision::Denied(reason) => Some(*reason),
        }
    }
}

/// Request to show the upgrade or quota drawer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LimitPrompt {
    Premium,
    Quota { limit: u32, time_frame: TimeFrame },
}

/// Who is asking.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CallerTier {
    Subscribed { user_id: Option<String> },
    Guest,
    Free { user_id: String },
    Anonymous,
}

impl CallerTier {
    fn classify(snapshot: &ProfileSnapshot) -> Self {
        let user_id = snapshot.user.as_ref().map(|u| u.id.clone());
        match (&snapshot.profile, user_id) {
            (Some(p), user_id) if p.is_subscribed => CallerTier::Subscribed { user_id },
            (Some(p), _) if p.is_guest => CallerTier::Guest,
            (_, Some(user_id)) => CallerTier::Free { user_id },
            (_, None) => CallerTier::Anonymous,
        }
    }

    /// Backend user to attribute usage to.
    fn user_id(&self) -> Option<&str> {
        match self {
            CallerTier::Subscribed { user_id } => user_id.as_deref(),
            CallerTier::Free { user_id } => Some(user_id),
            CallerTier::Guest | CallerTier::Anonymous => None,
        }
    }
}

/// Start of the counting window for `time_frame` at `now`.
///
/// Daily is the local calendar day; weekly is the trailing 7×24h.
pub fn window_start(now: DateTime<FixedOffset>, time_frame: TimeFrame) -> DateTime<Utc> {
    match time_frame {
        TimeFrame::Daily => start_of_day(now).with_timezone(&Utc),
        TimeFrame::Weekly => (now - Duration::days(7)).with_timezone(&Utc),
    }
}

/// Usage limiter for AI-backed features.
#[derive(Clone)]
pub struct UsageLimiter {
    profiles: ProfileService,
    log: Arc<dyn UsageLogStore>,
    clock: Arc<dyn Clock>,
    prompts: broadcast::Sender<LimitPrompt>,
}

impl UsageLimiter {
    pub fn new(profiles: ProfileService, log: Arc<dyn UsageLogStore>, clock: Arc<dyn Clock>) -> Self {
        let (prompts, _) = broadcast::channel(PROMPT_CAPACITY);
        Self {
            profiles,
            log,
            clock,
            prompts,
        }
    }

    /// Prompts raised by denied checks, for the UI to display.
    pub fn prompts(&self) -> broadcast::Receiver<LimitPrompt> {
        self.prompts.subscribe()
    }

    /// Decide whether `feature` may run now.
    ///
    /// Denials that carry a prompt also publish it on [`Self::prompts`].
    pub async fn check_limit(
        &self,
        feature: AiFeature,
        limit: u32,
        time_frame: TimeFrame,
    ) -> LimitDecision {
        let decision = self.decide(feature, limit, time_frame).await;

        if let LimitDecision::Denied(reason) = decision {
            tracing::info!(%feature, limit, ?time_frame, ?reason, "AI usage denied");
            if let Some(prompt) = reason.prompt() {
                // No UI listening is fine.
                let _ = self.prompts.send(prompt);
            }
        }

        decision
    }

    async fn decide(&self, feature: AiFeature, limit: u32, time_frame: TimeFrame) -> LimitDecision {
        if !feature.is_metered() {
            return LimitDecision::Allowed;
        }

        let user_id = match CallerTier::classify(&self.profiles.snapshot()) {
            CallerTier::Subscribed { .. } => return LimitDecision::Allowed,
            CallerTier::Guest => return LimitDecision::Denied(DenyReason::AccountRequired),
            CallerTier::Anonymous => return LimitDecision::Denied(DenyReason::NotSignedIn),
            CallerTier::Free { user_id } => user_id,
        };

        if limit > PREMIUM_ONLY_LIMIT_THRESHOLD {
            return LimitDecision::Denied(DenyReason::PremiumOnly);
        }

        let since = window_start(self.clock.now(), time_frame);
        let count = match self.log.count_usage(&user_id, feature, since).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(%feature, user_id = %user_id, error = %e, "Failed to count AI usage");
                return LimitDecision::Denied(DenyReason::CheckFailed);
            }
        };

        tracing::debug!(%feature, user_id = %user_id, count, limit, "AI usage counted");
        if count >= u64::from(limit) {
            return LimitDecision::Denied(DenyReason::QuotaExceeded { limit, time_frame });
        }
        LimitDecision::Allowed
    }

    /// Record one use of `feature` for the current user.
    ///
    /// Skipped for weight logging, guests and when nobody is signed in.
    /// Failures are logged only.
    pub async fn log_usage(&self, feature: AiFeature) {
        if !feature.is_metered() {
            return;
        }

        let tier = CallerTier::classify(&self.profiles.snapshot());
        let Some(user_id) = tier.user_id() else {
            tracing::debug!(%feature, "No account to attribute usage to, not logging");
            return;
        };

        let entry = NewUsageLog {
            user_id: user_id.to_string(),
            feature,
            created_at: self.clock.now_utc(),
        };

        if let Err(e) = self.log.insert_usage(&entry).await {
            tracing::warn!(%feature, user_id = %entry.user_id, error = %e, "Error logging AI usage");
        }
    }
}
