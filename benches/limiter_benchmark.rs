use calorie_tracker::models::{Goal, Profile, TimeFrame};
use calorie_tracker::services::limiter::window_start;
use calorie_tracker::services::{calculate_plan, NutritionInput};
use chrono::DateTime;
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn benchmark_window_start(c: &mut Criterion) {
    let now = DateTime::parse_from_rfc3339("2026-05-20T23:59:00-07:00").expect("valid timestamp");

    let mut group = c.benchmark_group("usage_windows");

    group.bench_function("daily", |b| {
        b.iter(|| window_start(black_box(now), TimeFrame::Daily))
    });

    group.bench_function("weekly", |b| {
        b.iter(|| window_start(black_box(now), TimeFrame::Weekly))
    });

    group.finish();
}

fn benchmark_profile_row(c: &mut Criterion) {
    // Typical backend row with unset goals
    let row = r#"{
        "id": "3f1c2d9a-0b7e-4c55-9e0a-2f7d1b6c8e41",
        "full_name": "Ana",
        "gender": "female",
        "age": 34,
        "height": 165.0,
        "weight": 62.5,
        "units": "metric",
        "goal": "lose_weight",
        "weekly_rate": 0.5,
        "goal_calories": null,
        "goal_protein": null,
        "onboarding_completed": true,
        "is_subscribed": null
    }"#;

    let mut group = c.benchmark_group("profile");

    group.bench_function("parse_and_sanitize", |b| {
        b.iter(|| {
            let profile: Profile = serde_json::from_str(black_box(row)).expect("valid row");
            profile.sanitize_remote()
        })
    });

    let input = NutritionInput {
        weight_kg: 62.5,
        height_cm: 165.0,
        age: 34,
        gender: Some("female".to_string()),
        workouts_per_week: 4,
        goal: Goal::Lose,
        weekly_rate: 0.5,
    };

    group.bench_function("calculate_plan", |b| {
        b.iter(|| calculate_plan(black_box(&input)))
    });

    group.finish();
}

criterion_group!(benches, benchmark_window_start, benchmark_profile_row);
criterion_main!(benches);
