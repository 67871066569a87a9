// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Day bucketing for intake charts, the streak week and intake history.
//!
//! Entries are timestamped in UTC and bucketed by the calendar day they
//! fall on in the viewer's offset. Days are keyed as `yyyy-MM-dd`.

use crate::time_utils::start_of_day;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// Distinct logged days needed before the 30-day range is offered.
const MONTH_RANGE_MIN_DAYS: usize = 8;
/// Distinct logged days needed before the 1-year range is offered.
const YEAR_RANGE_MIN_DAYS: usize = 31;

const STREAK_WEEK_DAYS: i64 = 7;

pub fn day_key(day: NaiveDate) -> String {
    day.format(DAY_KEY_FORMAT).to_string()
}

/// Calendar day of `at` as seen from `offset`.
pub fn local_day(at: DateTime<Utc>, offset: &FixedOffset) -> NaiveDate {
    at.with_timezone(offset).date_naive()
}

/// Chart time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum ChartRange {
    #[serde(rename = "7D")]
    Week,
    #[serde(rename = "30D")]
    Month,
    #[serde(rename = "1Y")]
    Year,
}

impl ChartRange {
    pub const ALL: [ChartRange; 3] = [ChartRange::Week, ChartRange::Month, ChartRange::Year];

    pub fn days(self) -> u32 {
        match self {
            ChartRange::Week => 7,
            ChartRange::Month => 30,
            ChartRange::Year => 365,
        }
    }

    /// Local midnight of the oldest day in the range ending today.
    pub fn start(self, now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        start_of_day(now - Duration::days(i64::from(self.days()) - 1))
    }

    fn min_distinct_days(self) -> usize {
        match self {
            ChartRange::Week => 0,
            ChartRange::Month => MONTH_RANGE_MIN_DAYS,
            ChartRange::Year => YEAR_RANGE_MIN_DAYS,
        }
    }

    /// Whether there is enough history to make this range worth showing.
    pub fn is_available(self, distinct_days: usize) -> bool {
        distinct_days >= self.min_distinct_days()
    }

    /// `self` if available, otherwise the widest range that is.
    pub fn clamp_to(self, distinct_days: usize) -> ChartRange {
        if self.is_available(distinct_days) {
            return self;
        }
        ChartRange::ALL
            .into_iter()
            .filter(|r| r.days() < self.days() && r.is_available(distinct_days))
            .max_by_key(|r| r.days())
            .unwrap_or(ChartRange::Week)
    }
}

/// Ranges offered for a history with `distinct_days` logged days.
pub fn available_ranges(distinct_days: usize) -> Vec<ChartRange> {
    ChartRange::ALL
        .into_iter()
        .filter(|r| r.is_available(distinct_days))
        .collect()
}

/// A food (calories eaten) or exercise (calories burned) entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CalorieEntry {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub calories: Option<f64>,
}

/// Number of distinct local days with at least one entry.
pub fn distinct_days(entries: &[CalorieEntry], offset: &FixedOffset) -> usize {
    entries
        .iter()
        .map(|e| local_day(e.created_at, offset))
        .collect::<HashSet<_>>()
        .len()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DayCalories {
    pub day: String,
    pub calories: f64,
}

/// One point per day of `range`, oldest first, with empty days as zero.
pub fn calorie_series(
    entries: &[CalorieEntry],
    range: ChartRange,
    now: DateTime<FixedOffset>,
) -> Vec<DayCalories> {
    let offset = *now.offset();
    let start = range.start(now).with_timezone(&Utc);

    let mut totals: HashMap<NaiveDate, f64> = HashMap::new();
    for entry in entries.iter().filter(|e| e.created_at >= start) {
        *totals.entry(local_day(entry.created_at, &offset)).or_default() +=
            entry.calories.unwrap_or(0.0);
    }

    let today = now.date_naive();
    (0..i64::from(range.days()))
        .rev()
        .map(|back| {
            let day = today - Duration::days(back);
            DayCalories {
                day: day_key(day),
                calories: totals.get(&day).copied().unwrap_or(0.0),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StreakDay {
    pub day: String,
    pub in_streak: bool,
    pub is_today: bool,
}

/// The seven days ending today, oldest first, marked against `streak_days`
/// (day keys).
pub fn streak_week(streak_days: &[String], now: DateTime<FixedOffset>) -> Vec<StreakDay> {
    let streak: HashSet<&str> = streak_days.iter().map(String::as_str).collect();
    let today = now.date_naive();

    (0..STREAK_WEEK_DAYS)
        .rev()
        .map(|back| {
            let key = day_key(today - Duration::days(back));
            StreakDay {
                in_streak: streak.contains(key.as_str()),
                is_today: back == 0,
                day: key,
            }
        })
        .collect()
}

/// Macro totals for one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyIntake {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fats: f64,
}

impl DailyIntake {
    pub fn add(&mut self, other: &DailyIntake) {
        self.calories += other.calories;
        self.protein += other.protein;
        self.carbs += other.carbs;
        self.fats += other.fats;
    }
}

/// Per-day intake totals keyed by day key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntakeHistory(BTreeMap<String, DailyIntake>);

impl IntakeHistory {
    /// Add `intake` to the day containing `now`.
    pub fn record(&mut self, now: DateTime<FixedOffset>, intake: &DailyIntake) {
        self.0
            .entry(day_key(now.date_naive()))
            .or_default()
            .add(intake);
    }

    /// Totals for `day`; zero when nothing was logged.
    pub fn for_day(&self, day: NaiveDate) -> DailyIntake {
        self.0.get(&day_key(day)).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2026-05-20T10:00:00-05:00").unwrap()
    }

    fn entry(at: &str, calories: f64) -> CalorieEntry {
        CalorieEntry {
            created_at: DateTime::parse_from_rfc3339(at).unwrap().with_timezone(&Utc),
            calories: Some(calories),
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DAY_KEY_FORMAT).unwrap()
    }

    #[test]
    fn test_range_start_is_local_midnight() {
        assert_eq!(
            ChartRange::Week.start(now()).to_rfc3339(),
            "2026-05-14T00:00:00-05:00"
        );
        assert_eq!(
            ChartRange::Month.start(now()).to_rfc3339(),
            "2026-04-21T00:00:00-05:00"
        );
        assert_eq!(
            ChartRange::Year.start(now()).to_rfc3339(),
            "2025-05-21T00:00:00-05:00"
        );
    }

    #[test]
    fn test_ranges_unlock_with_history() {
        assert_eq!(available_ranges(0), vec![ChartRange::Week]);
        assert_eq!(available_ranges(7), vec![ChartRange::Week]);
        assert_eq!(available_ranges(8), vec![ChartRange::Week, ChartRange::Month]);
        assert_eq!(available_ranges(30), vec![ChartRange::Week, ChartRange::Month]);
        assert_eq!(available_ranges(31), ChartRange::ALL.to_vec());

        assert_eq!(ChartRange::Year.clamp_to(10), ChartRange::Month);
        assert_eq!(ChartRange::Year.clamp_to(3), ChartRange::Week);
        assert_eq!(ChartRange::Month.clamp_to(3), ChartRange::Week);
        assert_eq!(ChartRange::Month.clamp_to(40), ChartRange::Month);
    }

    #[test]
    fn test_calorie_series_buckets_by_local_day() {
        let entries = [
            entry("2026-05-20T14:00:00Z", 500.0),
            entry("2026-05-20T16:30:00Z", 250.0),
            // 03:00 UTC on the 20th is still the 19th at -05:00.
            entry("2026-05-20T03:00:00Z", 300.0),
            // Before the window.
            entry("2026-05-13T12:00:00Z", 900.0),
            CalorieEntry {
                created_at: DateTime::parse_from_rfc3339("2026-05-15T12:00:00Z")
                    .unwrap()
                    .with_timezone(&Utc),
                calories: None,
            },
        ];

        let series = calorie_series(&entries, ChartRange::Week, now());

        let days: Vec<&str> = series.iter().map(|d| d.day.as_str()).collect();
        assert_eq!(
            days,
            [
                "2026-05-14",
                "2026-05-15",
                "2026-05-16",
                "2026-05-17",
                "2026-05-18",
                "2026-05-19",
                "2026-05-20"
            ]
        );
        let calories: Vec<f64> = series.iter().map(|d| d.calories).collect();
        assert_eq!(calories, [0.0, 0.0, 0.0, 0.0, 0.0, 300.0, 750.0]);
    }

    #[test]
    fn test_calorie_series_has_one_point_per_day() {
        assert_eq!(calorie_series(&[], ChartRange::Month, now()).len(), 30);
        let year = calorie_series(&[], ChartRange::Year, now());
        assert_eq!(year.len(), 365);
        assert_eq!(year[0].day, "2025-05-21");
        assert_eq!(year[364].day, "2026-05-20");
    }

    #[test]
    fn test_distinct_days_uses_viewer_offset() {
        let entries = [
            entry("2026-05-20T03:00:00Z", 1.0),
            entry("2026-05-20T14:00:00Z", 1.0),
        ];
        assert_eq!(distinct_days(&entries, now().offset()), 2);
        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(distinct_days(&entries, &utc), 1);
    }

    #[test]
    fn test_streak_week_ends_today() {
        let streak = ["2026-05-18".to_string(), "2026-05-20".to_string(), "2026-04-01".to_string()];

        let week = streak_week(&streak, now());

        assert_eq!(week.len(), 7);
        assert_eq!(week[0].day, "2026-05-14");
        let marked: Vec<bool> = week.iter().map(|d| d.in_streak).collect();
        assert_eq!(marked, [false, false, false, false, true, false, true]);
        assert!(week[6].is_today);
        assert_eq!(week.iter().filter(|d| d.is_today).count(), 1);
    }

    #[test]
    fn test_intake_history_accumulates_per_day() {
        let mut history = IntakeHistory::default();
        let meal = DailyIntake {
            calories: 400.0,
            protein: 30.0,
            carbs: 40.0,
            fats: 12.0,
        };
        history.record(now(), &meal);
        history.record(now(), &meal);
        history.record(now() + Duration::days(1), &meal);

        let today = history.for_day(day("2026-05-20"));
        assert_eq!(today.calories, 800.0);
        assert_eq!(today.fats, 24.0);
        assert_eq!(history.for_day(day("2026-05-21")), meal);
        assert_eq!(history.for_day(day("2026-05-19")), DailyIntake::default());

        let json = serde_json::to_value(&history).unwrap();
        assert_eq!(json["2026-05-20"]["protein"], 60.0);
    }
}
