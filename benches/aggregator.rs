use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{json, Value};

use security_report::core::analyze;
use security_report::models::AnalyticsConfig;

const ROWS: usize = 50_000;

fn synthetic_rows() -> Vec<Value> {
    let actions = [
        "legitimate",
        "legitimate",
        "legitimate",
        "geo_blocked",
        "path_blocked",
        "bot_blocked",
        "bot_allowed",
    ];
    let countries = ["US", "RU", "CN", "BR", "DE", "IN", "VN", "NL"];

    (0..ROWS)
        .map(|i| {
            json!({
                "timestamp": format!("2026-09-{:02}T{:02}:{:02}:00Z", i % 30 + 1, i % 24, i % 60),
                "ip": format!("203.0.{}.{}", i % 17, i % 251),
                "country": countries[i % countries.len()],
                "action": actions[i % actions.len()],
                "response_time_ms": (i % 400) as f64,
            })
        })
        .collect()
}

fn aggregator_benchmark(c: &mut Criterion) {
    let rows = synthetic_rows();
    let config = AnalyticsConfig::default();

    c.bench_function("analyze_50k_rows", |b| {
        b.iter(|| analyze(black_box(rows.clone()), black_box(&config)))
    });
}

criterion_group!(benches, aggregator_benchmark);
criterion_main!(benches);
