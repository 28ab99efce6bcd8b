use std::collections::HashMap;

use stats_terminal::stat_normalizer::{
    InversionPolicy, MetricBoundary, normalize, normalize_value,
};

const EPS: f64 = 1e-9;

fn boundaries(entries: &[(&str, f64, f64, f64)]) -> HashMap<String, MetricBoundary> {
    entries
        .iter()
        .map(|(k, min, avg, max)| (k.to_string(), MetricBoundary::new(*min, *avg, *max)))
        .collect()
}

fn never(_: &str) -> bool {
    false
}

#[test]
fn values_above_max_clamp_to_one() {
    let b = boundaries(&[("avg_kills", 0.0, 5.0, 10.0)]);
    let out = normalize([("avg_kills", 12.0)], &b, never);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].key, "avg_kills");
    assert_eq!(out[0].value, 1.0);
}

#[test]
fn values_below_min_clamp_to_zero() {
    let b = boundaries(&[("avg_kills", 0.0, 5.0, 10.0)]);
    let out = normalize([("avg_kills", -3.0)], &b, never);
    assert_eq!(out[0].value, 0.0);
}

#[test]
fn inverted_metric_is_flipped() {
    let b = boundaries(&[("avg_deaths", 0.0, 5.0, 10.0)]);
    let policy = InversionPolicy::default();
    let out = normalize([("avg_deaths", 7.0)], &b, |k| policy.is_inverted(k));
    assert!((out[0].value - 0.3).abs() < EPS, "got {}", out[0].value);
    assert_eq!(out[0].label, "Deaths (inverted)");
}

#[test]
fn degenerate_range_maps_to_midpoint() {
    let b = MetricBoundary::new(4.0, 4.0, 4.0);
    assert_eq!(normalize_value(4.0, &b), Some(0.5));
    assert_eq!(normalize_value(-100.0, &b), Some(0.5));
    assert_eq!(normalize_value(100.0, &b), Some(0.5));

    let map = boundaries(&[("avg_deaths", 4.0, 4.0, 4.0)]);
    let out = normalize([("avg_deaths", 9.0)], &map, |_| true);
    assert_eq!(out[0].value, 0.5);
}

#[test]
fn output_stays_in_unit_range() {
    let b = MetricBoundary::new(-2.5, 0.0, 7.5);
    for raw in [-1e9, -2.5, -1.0, 0.0, 3.3, 7.5, 1e9] {
        let v = normalize_value(raw, &b).expect("finite input");
        assert!((0.0..=1.0).contains(&v), "{raw} -> {v}");
    }
}

#[test]
fn normalizing_is_idempotent() {
    let b = boundaries(&[("avg_kills", 2.0, 6.0, 14.0), ("avg_kda", 0.5, 1.0, 3.0)]);
    let stats = [("avg_kills", 9.0), ("avg_kda", 0.1)];
    let first = normalize(stats, &b, never);
    let second = normalize(stats, &b, never);
    assert_eq!(first, second);
}

#[test]
fn keys_without_boundaries_are_skipped() {
    let b = boundaries(&[("avg_kills", 0.0, 5.0, 10.0)]);
    let out = normalize([("avg_assists", 3.0), ("avg_kills", 5.0)], &b, never);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].key, "avg_kills");
    assert_eq!(out[0].value, 0.5);
}

#[test]
fn output_follows_input_order() {
    let b = boundaries(&[
        ("avg_kills", 0.0, 5.0, 10.0),
        ("avg_deaths", 0.0, 5.0, 10.0),
        ("avg_assists", 0.0, 5.0, 10.0),
    ]);
    let out = normalize(
        [("avg_assists", 1.0), ("avg_kills", 2.0), ("avg_deaths", 3.0)],
        &b,
        never,
    );
    let keys: Vec<&str> = out.iter().map(|p| p.key.as_str()).collect();
    assert_eq!(keys, ["avg_assists", "avg_kills", "avg_deaths"]);
}

#[test]
fn non_finite_inputs_are_excluded() {
    let b = boundaries(&[("avg_kills", 0.0, 5.0, 10.0), ("avg_kda", f64::NAN, 1.0, 2.0)]);
    let out = normalize(
        [("avg_kills", f64::NAN), ("avg_kda", 1.0)],
        &b,
        never,
    );
    assert!(out.is_empty());
}

#[test]
fn policy_from_env_style_list() {
    let policy = InversionPolicy::parse("avg_deaths avg_damage_taken");
    assert!(policy.is_inverted("avg_damage_taken"));
    assert!(!policy.is_inverted("avg_kills"));
}
