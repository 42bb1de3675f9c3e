use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use stride_coach::services::activity::normalize_activity;
use stride_coach::services::pace::format_pace;
use stride_coach::services::strava::StravaActivity;

/// A 10 km run with heart rate and ten kilometre splits.
fn ten_k_run() -> StravaActivity {
    let splits: Vec<_> = (1..=10)
        .map(|i| {
            serde_json::json!({
                "split": i,
                "distance": 1000.0,
                "moving_time": 290 + i,
                "average_speed": 1000.0 / (290.0 + i as f64),
                "elevation_difference": (i as f64) - 5.0,
                "average_heartrate": 150.0 + i as f64 * 1.3
            })
        })
        .collect();

    serde_json::from_value(serde_json::json!({
        "id": 16906743520u64,
        "name": "Sunday Long Run",
        "description": "Negative split, felt strong",
        "start_date": "2025-05-04T07:15:00Z",
        "distance": 10012.4,
        "moving_time": 2965,
        "average_speed": 3.377,
        "has_heartrate": true,
        "average_heartrate": 157.2,
        "max_heartrate": 178.0,
        "splits_metric": splits
    }))
    .expect("Failed to build fixture")
}

fn benchmark_pace(c: &mut Criterion) {
    let mut group = c.benchmark_group("pace");

    group.bench_function("format_pace", |b| {
        b.iter(|| format_pace(black_box(3.377)))
    });

    group.bench_function("format_pace_carry", |b| {
        b.iter(|| format_pace(black_box(1000.0 / 300.0)))
    });

    group.finish();
}

fn benchmark_normalize(c: &mut Criterion) {
    let detail = ten_k_run();

    c.bench_function("normalize_10k_activity", |b| {
        b.iter(|| normalize_activity(black_box(&detail)))
    });
}

criterion_group!(benches, benchmark_pace, benchmark_normalize);
criterion_main!(benches);
