use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::comparison::{ComparisonRequest, SearchBy};
use crate::dbscan::DbscanParams;
use crate::http_client::get_text;
use crate::query_cache::{Page, QueryIdentity, QueryKind};
use crate::settings::Settings;
use crate::stat_normalizer::MetricBoundary;

const PLAYERS_PATH: &str = "/api/players/";
const MATCHES_PATH: &str = "/api/matches/";
const PLAYER_HISTORY_PATH: &str = "/api/players/match-history/";
const DBSCAN_PATH: &str = "/api/stats/dbscan-analysis/";
const COMPARISON_PATH: &str = "/api/stats/player-comparison/";
const GAMES_PATH: &str = "/api/available-games/";

/// A paginated list request, minus the page cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub kind: QueryKind,
    pub game: String,
    pub player_puuid: Option<String>,
}

impl ListQuery {
    pub fn players(game: &str) -> Self {
        Self {
            kind: QueryKind::Players,
            game: game.to_string(),
            player_puuid: None,
        }
    }

    pub fn matches(game: &str) -> Self {
        Self {
            kind: QueryKind::Matches,
            game: game.to_string(),
            player_puuid: None,
        }
    }

    pub fn player_history(game: &str, puuid: &str) -> Self {
        Self {
            kind: QueryKind::PlayerHistory,
            game: game.to_string(),
            player_puuid: Some(puuid.trim().to_string()),
        }
    }

    pub fn identity(&self) -> QueryIdentity {
        let scope = match (&self.kind, &self.player_puuid) {
            (QueryKind::PlayerHistory, Some(puuid)) => format!("{}/{puuid}", self.game),
            _ => self.game.clone(),
        };
        QueryIdentity::new(self.kind, scope)
    }

    pub fn path(&self) -> &'static str {
        match self.kind {
            QueryKind::Players => PLAYERS_PATH,
            QueryKind::Matches => MATCHES_PATH,
            QueryKind::PlayerHistory => PLAYER_HISTORY_PATH,
        }
    }

    pub fn params(&self, limit: usize, offset: usize) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(4);
        if let Some(puuid) = &self.player_puuid {
            params.push(("player_puuid", puuid.clone()));
        }
        params.push(("game_name", self.game.clone()));
        params.push(("limit", limit.to_string()));
        params.push(("offset", offset.to_string()));
        params
    }
}

pub fn fetch_list_page(settings: &Settings, query: &ListQuery, offset: usize) -> Result<Page<Value>> {
    let params = query.params(settings.page_size, offset);
    let body = get_text(settings, query.path(), &params)
        .with_context(|| format!("list {} at offset {offset}", query.path()))?;
    parse_page_json(&body)
}

/// Accepts the paginated envelope `{results, next}`, a bare array (one page,
/// nothing more) or an empty/`null` body.
pub fn parse_page_json(raw: &str) -> Result<Page<Value>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Page::empty());
    }
    let root: Value = serde_json::from_str(trimmed).context("invalid list json")?;
    match root {
        Value::Array(items) => Ok(Page {
            items,
            has_more: false,
        }),
        Value::Object(mut obj) => {
            let items = match obj.remove("results") {
                Some(Value::Array(items)) => items,
                Some(Value::Null) | None => {
                    return Err(anyhow!("list payload has no results array"));
                }
                Some(other) => return Err(anyhow!("results is not an array: {other}")),
            };
            let has_more = obj.get("next").is_some_and(|next| !next.is_null());
            Ok(Page { items, has_more })
        }
        other => Err(anyhow!("unexpected list payload: {other}")),
    }
}

/// Single-record lookups offered next to the list views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupRequest {
    PlayerByPuuid { puuid: String },
    PlayerByUsername { username: String },
    MatchByGameMatchId { game_match_id: String },
    PlayerMatchStats { player_puuid: String, game_match_id: String },
}

impl LookupRequest {
    pub fn path(&self) -> &'static str {
        match self {
            LookupRequest::PlayerByPuuid { .. } => "/api/players/by_puuid/",
            LookupRequest::PlayerByUsername { .. } => "/api/players/by_username/",
            LookupRequest::MatchByGameMatchId { .. } => "/api/matches/by_game_match_id/",
            LookupRequest::PlayerMatchStats { .. } => "/api/player-match-stats/by_identifiers/",
        }
    }

    pub fn params(&self, game: &str) -> Vec<(&'static str, String)> {
        let mut params = match self {
            LookupRequest::PlayerByPuuid { puuid } => vec![("puuid", puuid.clone())],
            LookupRequest::PlayerByUsername { username } => vec![("username", username.clone())],
            LookupRequest::MatchByGameMatchId { game_match_id } => {
                vec![("game_match_id", game_match_id.clone())]
            }
            LookupRequest::PlayerMatchStats {
                player_puuid,
                game_match_id,
            } => vec![
                ("player_puuid", player_puuid.clone()),
                ("game_match_id", game_match_id.clone()),
            ],
        };
        params.push(("game_name", game.to_string()));
        params
    }

    pub fn describe(&self) -> String {
        match self {
            LookupRequest::PlayerByPuuid { puuid } => format!("player puuid={puuid}"),
            LookupRequest::PlayerByUsername { username } => format!("player username={username}"),
            LookupRequest::MatchByGameMatchId { game_match_id } => format!("match id={game_match_id}"),
            LookupRequest::PlayerMatchStats {
                player_puuid,
                game_match_id,
            } => format!("stats puuid={player_puuid} match={game_match_id}"),
        }
    }
}

pub fn fetch_lookup(settings: &Settings, game: &str, request: &LookupRequest) -> Result<Value> {
    let body = get_text(settings, request.path(), &request.params(game))
        .with_context(|| format!("lookup {}", request.describe()))?;
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(trimmed).context("invalid lookup json")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOption {
    pub value: String,
    pub label: String,
}

pub fn fetch_available_games(settings: &Settings) -> Result<Vec<GameOption>> {
    let body = get_text(settings, GAMES_PATH, &[]).context("available games")?;
    parse_games_json(&body)
}

pub fn parse_games_json(raw: &str) -> Result<Vec<GameOption>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed).context("invalid available games json")
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
    pub cluster: i64,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AnalysisDetails {
    #[serde(default)]
    pub game_name: Option<String>,
    #[serde(default)]
    pub eps: Option<Value>,
    #[serde(default)]
    pub min_samples: Option<Value>,
    #[serde(default)]
    pub min_matches_per_player: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub total_players_analyzed: u64,
    #[serde(default)]
    pub clusters_found: u64,
    #[serde(default)]
    pub noise_points: u64,
    #[serde(default)]
    pub features_used: Vec<String>,
    #[serde(default)]
    pub x_axis_label: Option<String>,
    #[serde(default)]
    pub y_axis_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DbscanReport {
    pub scatter_plot_data: Vec<ScatterPoint>,
    pub analysis_details: Option<AnalysisDetails>,
    /// Cluster id -> player rows, ascending by id (noise `-1` first).
    pub clustered_players: Vec<(i64, Vec<Value>)>,
}

#[derive(Debug, Deserialize)]
struct DbscanResponse {
    #[serde(default)]
    scatter_plot_data: Vec<RawScatterPoint>,
    #[serde(default)]
    analysis_details: Option<AnalysisDetails>,
    #[serde(default)]
    clustered_players: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct RawScatterPoint {
    x: Option<f64>,
    y: Option<f64>,
    cluster: Option<i64>,
    #[serde(default)]
    username: Option<String>,
}

pub fn fetch_dbscan(settings: &Settings, params: &DbscanParams) -> Result<DbscanReport> {
    let body = get_text(settings, DBSCAN_PATH, &params.query_params()).context("dbscan analysis")?;
    parse_dbscan_json(&body)
}

pub fn parse_dbscan_json(raw: &str) -> Result<DbscanReport> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(DbscanReport {
            scatter_plot_data: Vec::new(),
            analysis_details: None,
            clustered_players: Vec::new(),
        });
    }
    let resp: DbscanResponse = serde_json::from_str(trimmed).context("invalid dbscan json")?;

    let scatter_plot_data = resp
        .scatter_plot_data
        .into_iter()
        .filter_map(|p| {
            Some(ScatterPoint {
                x: p.x.filter(|v| v.is_finite())?,
                y: p.y.filter(|v| v.is_finite())?,
                cluster: p.cluster?,
                username: p.username,
            })
        })
        .collect();

    let mut clustered_players: Vec<(i64, Vec<Value>)> = resp
        .clustered_players
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(id, rows)| {
            let id = id.trim().parse::<i64>().ok()?;
            let rows = match rows {
                Value::Array(rows) => rows,
                _ => Vec::new(),
            };
            Some((id, rows))
        })
        .collect();
    clustered_players.sort_by_key(|(id, _)| *id);

    Ok(DbscanReport {
        scatter_plot_data,
        analysis_details: resp.analysis_details,
        clustered_players,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetPlayer {
    pub id: Option<Value>,
    pub username: String,
    pub rank: Option<String>,
    pub matches_analyzed: Option<u32>,
    /// Metric key -> raw value, in the order the server sent them.
    pub stats: Vec<(String, Option<f64>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonGroup {
    pub rank: Option<String>,
    pub player_count: Option<u32>,
    pub stats_boundaries: Option<HashMap<String, MetricBoundary>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonReport {
    pub target_player: TargetPlayer,
    pub comparison_group: ComparisonGroup,
    pub available_ranks: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ComparisonResponse {
    target_player: RawTargetPlayer,
    #[serde(default)]
    comparison_group: Option<RawComparisonGroup>,
    #[serde(default)]
    available_ranks: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawTargetPlayer {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    rank: Option<String>,
    #[serde(default)]
    matches_analyzed: Option<u32>,
    #[serde(default)]
    stats: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct RawComparisonGroup {
    #[serde(default)]
    rank: Option<String>,
    #[serde(default)]
    player_count: Option<u32>,
    #[serde(default)]
    stats_boundaries: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct RawBoundary {
    min: Option<f64>,
    avg: Option<f64>,
    max: Option<f64>,
}

pub fn fetch_player_comparison(settings: &Settings, request: &ComparisonRequest) -> Result<ComparisonReport> {
    let mut params = vec![("game_name", request.game.clone())];
    match request.search_by {
        SearchBy::Puuid => params.push(("puuid", request.identifier.clone())),
        SearchBy::Username => params.push(("username", request.identifier.clone())),
    }
    params.push(("comparison_rank", request.rank.clone().unwrap_or_default()));
    let body = get_text(settings, COMPARISON_PATH, &params)
        .with_context(|| format!("player comparison for {}", request.identifier))?;
    parse_comparison_json(&body)
}

pub fn parse_comparison_json(raw: &str) -> Result<ComparisonReport> {
    let resp: ComparisonResponse =
        serde_json::from_str(raw.trim()).context("invalid player comparison json")?;

    let stats = resp
        .target_player
        .stats
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| {
            let value = value.as_f64().filter(|v| v.is_finite());
            (key, value)
        })
        .collect();

    let group = resp.comparison_group.unwrap_or(RawComparisonGroup {
        rank: None,
        player_count: None,
        stats_boundaries: None,
    });
    let stats_boundaries = group.stats_boundaries.map(|raw| {
        raw.into_iter()
            .filter_map(|(key, value)| {
                let b: RawBoundary = serde_json::from_value(value).ok()?;
                Some((key, MetricBoundary::new(b.min?, b.avg?, b.max?)))
            })
            .collect::<HashMap<_, _>>()
    });

    let available_ranks = resp
        .available_ranks
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect();

    Ok(ComparisonReport {
        target_player: TargetPlayer {
            id: resp.target_player.id,
            username: resp
                .target_player
                .username
                .unwrap_or_else(|| "Unknown".to_string()),
            rank: resp.target_player.rank.filter(|r| !r.trim().is_empty()),
            matches_analyzed: resp.target_player.matches_analyzed,
            stats,
        },
        comparison_group: ComparisonGroup {
            rank: group.rank,
            player_count: group.player_count,
            stats_boundaries,
        },
        available_ranks,
    })
}
