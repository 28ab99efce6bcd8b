use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::api::ComparisonReport;

pub const DEFAULT_INVERTED_METRICS: &[&str] = &["avg_deaths"];

/// The min/avg/max envelope of one metric across a comparison cohort.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricBoundary {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

impl MetricBoundary {
    pub fn new(min: f64, avg: f64, max: f64) -> Self {
        Self { min, avg, max }
    }

    fn is_usable(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPoint {
    pub key: String,
    pub label: String,
    pub value: f64,
}

pub type NormalizedSeries = Vec<NormalizedPoint>;

/// Metrics where a smaller raw value is the better one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InversionPolicy {
    keys: HashSet<String>,
}

impl Default for InversionPolicy {
    fn default() -> Self {
        Self::from_keys(DEFAULT_INVERTED_METRICS.iter().copied())
    }
}

impl InversionPolicy {
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keys: keys
                .into_iter()
                .map(|k| k.as_ref().trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Parses a comma/semicolon/space separated key list.
    pub fn parse(raw: &str) -> Self {
        Self::from_keys(raw.split([',', ';', ' ']))
    }

    pub fn is_inverted(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}

/// Scales one raw value into `[0, 1]` against its boundary.
///
/// Returns `None` for inputs that cannot be placed on the axis (non-finite raw
/// value, non-finite or inverted boundary).
pub fn normalize_value(raw: f64, boundary: &MetricBoundary) -> Option<f64> {
    if !raw.is_finite() || !boundary.is_usable() {
        return None;
    }
    if boundary.max == boundary.min {
        return Some(0.5);
    }
    let clamped = raw.clamp(boundary.min, boundary.max);
    let span = boundary.max - boundary.min;
    if span.is_finite() {
        return Some((clamped - boundary.min) / span);
    }
    // Bounds near f64::MAX overflow the span; halving keeps it finite.
    let half_span = boundary.max / 2.0 - boundary.min / 2.0;
    Some(((clamped / 2.0 - boundary.min / 2.0) / half_span).clamp(0.0, 1.0))
}

/// Normalizes a subject's stats against cohort boundaries.
///
/// Output follows the iteration order of `stats`, restricted to keys with a
/// usable boundary, so a player series and a group series built from the
/// same key order line up axis by axis.
pub fn normalize<'a, I, P>(
    stats: I,
    boundaries: &HashMap<String, MetricBoundary>,
    inverted: P,
) -> NormalizedSeries
where
    I: IntoIterator<Item = (&'a str, f64)>,
    P: Fn(&str) -> bool,
{
    let mut out = Vec::new();
    for (key, raw) in stats {
        let Some(boundary) = boundaries.get(key) else {
            continue;
        };
        let Some(mut value) = normalize_value(raw, boundary) else {
            continue;
        };
        let flip = inverted(key);
        if flip {
            value = 1.0 - value;
        }
        out.push(NormalizedPoint {
            key: key.to_string(),
            label: metric_label(key, flip),
            value,
        });
    }
    out
}

/// `avg_kills_per_round` -> `Kills Per Round`.
pub fn metric_label(key: &str, inverted: bool) -> String {
    let base = key.replace("avg_", "");
    let words: Vec<String> = base
        .split('_')
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect();
    let label = words.join(" ");
    if inverted {
        format!("{label} (inverted)")
    } else {
        label
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Player vs. cohort series ready for a two-dataset chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonChart {
    pub player_label: String,
    pub group_label: String,
    pub player: NormalizedSeries,
    pub group: NormalizedSeries,
}

impl ComparisonChart {
    pub fn labels(&self) -> Vec<&str> {
        self.player.iter().map(|p| p.label.as_str()).collect()
    }
}

pub fn comparison_chart(report: &ComparisonReport, policy: &InversionPolicy) -> Option<ComparisonChart> {
    let target = &report.target_player;
    let boundaries = report.comparison_group.stats_boundaries.as_ref()?;
    if target.stats.is_empty() || boundaries.is_empty() {
        return None;
    }

    // A key is only charted when both series can place it, so axes stay aligned.
    let keys: Vec<(&str, f64, f64)> = target
        .stats
        .iter()
        .filter_map(|(key, raw)| {
            let raw = (*raw)?;
            let boundary = boundaries.get(key)?;
            normalize_value(raw, boundary)?;
            normalize_value(boundary.avg, boundary)?;
            Some((key.as_str(), raw, boundary.avg))
        })
        .collect();
    if keys.is_empty() {
        return None;
    }

    let inverted = |k: &str| policy.is_inverted(k);
    let player = normalize(keys.iter().map(|(k, raw, _)| (*k, *raw)), boundaries, inverted);
    let group = normalize(keys.iter().map(|(k, _, avg)| (*k, *avg)), boundaries, inverted);

    let matches = target
        .matches_analyzed
        .map(|n| n.to_string())
        .unwrap_or_else(|| "?".to_string());
    let group_rank = report
        .comparison_group
        .rank
        .clone()
        .unwrap_or_else(|| "N/A".to_string());
    let player_count = report.comparison_group.player_count.unwrap_or(0);

    Some(ComparisonChart {
        player_label: format!("{} (Last {matches})", target.username),
        group_label: format!("Avg. Rank: {group_rank} ({player_count} players)"),
        player,
        group,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_strip_prefix_and_title_case() {
        assert_eq!(metric_label("avg_kills", false), "Kills");
        assert_eq!(metric_label("avg_damage_dealt", false), "Damage Dealt");
        assert_eq!(metric_label("avg_deaths", true), "Deaths (inverted)");
        assert_eq!(metric_label("win_rate", false), "Win Rate");
    }

    #[test]
    fn policy_parses_lists() {
        let policy = InversionPolicy::parse("avg_deaths, avg_damage_taken;;");
        assert!(policy.is_inverted("avg_deaths"));
        assert!(policy.is_inverted("avg_damage_taken"));
        assert!(!policy.is_inverted("avg_kills"));
        assert!(InversionPolicy::default().is_inverted("avg_deaths"));
    }

    #[test]
    fn huge_span_still_scales() {
        let b = MetricBoundary::new(-1e308, 0.0, 1e308);
        assert_eq!(normalize_value(1e308, &b), Some(1.0));
        assert_eq!(normalize_value(-1e308, &b), Some(0.0));
        assert_eq!(normalize_value(0.0, &b), Some(0.5));
    }

    #[test]
    fn inverted_boundary_is_excluded() {
        let b = MetricBoundary::new(10.0, 5.0, 0.0);
        assert_eq!(normalize_value(3.0, &b), None);
        let nan = MetricBoundary::new(f64::NAN, 1.0, 2.0);
        assert_eq!(normalize_value(1.0, &nan), None);
    }
}
