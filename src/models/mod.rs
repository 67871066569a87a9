// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod profile;
pub mod session;
pub mod usage;

pub use profile::{Goal, Profile, ProfileUpdate, Units};
pub use session::{AuthEvent, AuthStateChange, AuthUser, Session};
pub use usage::{AiFeature, NewUsageLog, TimeFrame};
