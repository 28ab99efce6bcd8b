use std::collections::HashMap;

use serde_json::Value;

use crate::api::{AnalysisDetails, ScatterPoint};

pub const NOISE_CLUSTER: i64 = -1;

#[derive(Debug, Clone, PartialEq)]
pub struct DbscanParams {
    pub game: String,
    pub eps: f64,
    pub min_samples: u32,
    pub min_matches: u32,
}

impl DbscanParams {
    pub fn new(game: &str) -> Self {
        Self {
            game: game.to_string(),
            eps: 1.5,
            min_samples: 5,
            min_matches: 5,
        }
    }

    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("game_name", self.game.clone()),
            ("eps", self.eps.to_string()),
            ("min_samples", self.min_samples.to_string()),
            ("min_matches", self.min_matches.to_string()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSeries {
    pub cluster: i64,
    pub label: String,
    pub points: Vec<(f64, f64)>,
    pub usernames: Vec<String>,
}

impl ClusterSeries {
    pub fn is_noise(&self) -> bool {
        self.cluster == NOISE_CLUSTER
    }
}

pub fn cluster_label(cluster: i64, count: usize) -> String {
    if cluster == NOISE_CLUSTER {
        format!("Noise ({count})")
    } else {
        format!("Cluster {cluster} ({count})")
    }
}

/// One scatter series per cluster id, ascending (noise first).
pub fn cluster_series(points: &[ScatterPoint]) -> Vec<ClusterSeries> {
    let mut ids: Vec<i64> = points.iter().map(|p| p.cluster).collect();
    ids.sort_unstable();
    ids.dedup();

    ids.into_iter()
        .map(|cluster| {
            let members: Vec<&ScatterPoint> = points.iter().filter(|p| p.cluster == cluster).collect();
            ClusterSeries {
                cluster,
                label: cluster_label(cluster, members.len()),
                points: members.iter().map(|p| (p.x, p.y)).collect(),
                usernames: members
                    .iter()
                    .map(|p| p.username.clone().unwrap_or_default())
                    .collect(),
            }
        })
        .collect()
}

/// `[min, max]` over all points on one axis, padded so single points stay visible.
pub fn axis_bounds(series: &[ClusterSeries], pick: impl Fn(&(f64, f64)) -> f64) -> [f64; 2] {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for p in series.iter().flat_map(|s| s.points.iter()) {
        let v = pick(p);
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if !lo.is_finite() || !hi.is_finite() {
        return [0.0, 1.0];
    }
    let pad = ((hi - lo) * 0.05).max(0.5);
    [lo - pad, hi + pad]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    pub key: String,
    pub label: String,
}

impl TableColumn {
    fn new(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
        }
    }
}

pub fn table_columns(details: Option<&AnalysisDetails>) -> Vec<TableColumn> {
    let mut cols = vec![
        TableColumn::new("player_id", "DB ID"),
        TableColumn::new("puuid", "PUUID"),
        TableColumn::new("username", "Username"),
    ];
    match details.filter(|d| !d.features_used.is_empty()) {
        Some(d) => cols.extend(
            d.features_used
                .iter()
                .map(|f| TableColumn::new(f, &feature_label(f))),
        ),
        None => cols.extend([
            TableColumn::new("avg_kills", "Avg Kills"),
            TableColumn::new("avg_deaths", "Avg Deaths"),
            TableColumn::new("avg_kda", "Avg KDA"),
        ]),
    }
    cols
}

fn feature_label(feature: &str) -> String {
    feature
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn format_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if f.is_finite() => format!("{f:.2}"),
            _ => "-".to_string(),
        },
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

/// How many rows of each cluster's player table are revealed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterPaging {
    page_size: usize,
    visible: HashMap<i64, usize>,
}

impl ClusterPaging {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            visible: HashMap::new(),
        }
    }

    pub fn reset<I: IntoIterator<Item = i64>>(&mut self, clusters: I) {
        self.visible = clusters.into_iter().map(|c| (c, self.page_size)).collect();
    }

    pub fn visible(&self, cluster: i64) -> usize {
        self.visible.get(&cluster).copied().unwrap_or(self.page_size)
    }

    pub fn show_more(&mut self, cluster: i64) {
        let next = self.visible(cluster) + self.page_size;
        self.visible.insert(cluster, next);
    }

    /// Rows the next "show more" would reveal; 0 when the table is complete.
    pub fn remaining(&self, cluster: i64, total: usize) -> usize {
        total.saturating_sub(self.visible(cluster)).min(self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_labels_are_title_cased() {
        assert_eq!(feature_label("avg_kda"), "Avg Kda");
        assert_eq!(feature_label("headshot_rate"), "Headshot Rate");
    }

    #[test]
    fn axis_bounds_pad_single_points() {
        let series = vec![ClusterSeries {
            cluster: 0,
            label: cluster_label(0, 1),
            points: vec![(2.0, 3.0)],
            usernames: vec!["a".to_string()],
        }];
        assert_eq!(axis_bounds(&series, |p| p.0), [1.5, 2.5]);
        assert_eq!(axis_bounds(&[], |p| p.1), [0.0, 1.0]);
    }
}
