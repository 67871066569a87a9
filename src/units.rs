// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Body measurement conversions.
//!
//! Profiles store metric values; imperial input is converted on the way in.

pub const KG_PER_LB: f64 = 0.453_592_37;
pub const CM_PER_INCH: f64 = 2.54;
const INCHES_PER_FOOT: f64 = 12.0;

pub fn lb_to_kg(lb: f64) -> f64 {
    lb * KG_PER_LB
}

pub fn inches_to_cm(inches: f64) -> f64 {
    inches * CM_PER_INCH
}

pub fn feet_inches_to_cm(feet: u32, inches: f64) -> f64 {
    inches_to_cm(f64::from(feet) * INCHES_PER_FOOT + inches)
}

/// Round to one decimal place for display and storage.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
