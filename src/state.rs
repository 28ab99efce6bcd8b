use std::collections::VecDeque;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;

use crate::api::{ComparisonReport, DbscanReport, GameOption, ListQuery, LookupRequest};
use crate::comparison::{ComparisonRequest, ComparisonTracker, SearchBy};
use crate::csv_import::{FileErrors, ImportForm, ImportOutcome};
use crate::dbscan::{ClusterPaging, ClusterSeries, DbscanParams, cluster_series};
use crate::query_cache::{FetchTicket, Outcome, Page, QueryCache, QueryKind};
use crate::settings::Settings;
use crate::stat_normalizer::{ComparisonChart, InversionPolicy, comparison_chart};

const MAX_LOGS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Browser,
    Clusters,
    Compare,
    Upload,
}

/// Free-text inputs the dashboard asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    HistoryPuuid,
    LookupPuuid,
    LookupUsername,
    LookupMatchId,
    StatsIdentifiers,
    ComparePlayer,
    Eps,
    MinSamples,
    MinMatches,
    UploadGame,
    UploadPlayersFile,
    UploadMatchesFile,
    UploadStatsFile,
}

impl PromptKind {
    pub fn title(self) -> &'static str {
        match self {
            PromptKind::HistoryPuuid => "Match history: player PUUID",
            PromptKind::LookupPuuid => "Find player by PUUID",
            PromptKind::LookupUsername => "Find player by username",
            PromptKind::LookupMatchId => "Find match by game match id",
            PromptKind::StatsIdentifiers => "Player match stats: <puuid> <game match id>",
            PromptKind::ComparePlayer => "Player to compare",
            PromptKind::Eps => "DBSCAN eps",
            PromptKind::MinSamples => "DBSCAN min samples",
            PromptKind::MinMatches => "Min matches per player",
            PromptKind::UploadGame => "Game name for import",
            PromptKind::UploadPlayersFile => "players CSV path",
            PromptKind::UploadMatchesFile => "matches CSV path",
            PromptKind::UploadStatsFile => "stats CSV path",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrowserState {
    pub list: QueryCache<Value>,
    /// Query behind the live list, kept so "load more" can continue it.
    pub query: Option<ListQuery>,
    pub lookup: Option<Value>,
    pub lookup_pending: Option<LookupRequest>,
    pub error: Option<String>,
    pub selected: usize,
    pub history_puuid: String,
}

#[derive(Debug, Clone)]
pub struct ClusterState {
    pub params: DbscanParams,
    pub requested: Option<DbscanParams>,
    pub report: Option<DbscanReport>,
    pub series: Vec<ClusterSeries>,
    pub paging: ClusterPaging,
    pub error: Option<String>,
    pub selected: usize,
}

impl ClusterState {
    pub fn is_loading(&self) -> bool {
        self.requested.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct CompareState {
    pub search_by: SearchBy,
    pub identifier: String,
    pub tracker: ComparisonTracker,
    pub report: Option<ComparisonReport>,
    pub chart: Option<ComparisonChart>,
    pub policy: InversionPolicy,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UploadState {
    pub form: ImportForm,
    pub loading: bool,
    pub message: Option<String>,
    pub error: Option<String>,
    pub file_errors: Vec<FileErrors>,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub screen: Screen,
    pub games: Vec<GameOption>,
    pub game_selected: usize,
    pub games_loading: bool,
    pub games_error: Option<String>,
    pub default_game: String,
    pub browser: BrowserState,
    pub clusters: ClusterState,
    pub compare: CompareState,
    pub upload: UploadState,
    pub logs: VecDeque<String>,
    pub help_overlay: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}

impl AppState {
    pub fn new(settings: &Settings) -> Self {
        Self {
            screen: Screen::Browser,
            games: Vec::new(),
            game_selected: 0,
            games_loading: true,
            games_error: None,
            default_game: settings.default_game.clone(),
            browser: BrowserState {
                list: QueryCache::new(),
                query: None,
                lookup: None,
                lookup_pending: None,
                error: None,
                selected: 0,
                history_puuid: String::new(),
            },
            clusters: ClusterState {
                params: DbscanParams::new(&settings.default_game),
                requested: None,
                report: None,
                series: Vec::new(),
                paging: ClusterPaging::new(settings.cluster_page_size),
                error: None,
                selected: 0,
            },
            compare: CompareState {
                search_by: SearchBy::Puuid,
                identifier: String::new(),
                tracker: ComparisonTracker::new(),
                report: None,
                chart: None,
                policy: settings.inverted_metrics.clone(),
                error: None,
            },
            upload: UploadState::default(),
            logs: VecDeque::new(),
            help_overlay: false,
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn current_game(&self) -> String {
        self.games
            .get(self.game_selected)
            .map(|g| g.value.clone())
            .unwrap_or_else(|| self.default_game.clone())
    }

    pub fn current_game_label(&self) -> String {
        self.games
            .get(self.game_selected)
            .map(|g| g.label.clone())
            .unwrap_or_else(|| self.default_game.clone())
    }

    pub fn cycle_game(&mut self) {
        if self.games.is_empty() {
            return;
        }
        self.game_selected = (self.game_selected + 1) % self.games.len();
        self.retarget_clusters();
    }

    /// Points the cluster view at the selected game. An analysis for another
    /// game, loaded or in flight, is dropped so the view reruns.
    fn retarget_clusters(&mut self) {
        let game = self.current_game();
        if self.clusters.params.game == game {
            return;
        }
        self.clusters.params.game = game;
        self.clusters.report = None;
        self.clusters.series.clear();
        self.clusters.requested = None;
        self.clusters.error = None;
        self.clusters.selected = 0;
    }

    /// Starts a list fetch. `load_more` continues the live list when it is the
    /// same query, otherwise the list restarts from offset 0.
    pub fn request_list(&mut self, query: ListQuery, load_more: bool) -> Option<ProviderCommand> {
        let identity = query.identity();
        let same_query = self.browser.list.identity() == Some(&identity);
        if load_more && !(same_query && self.browser.list.can_load_more()) {
            return None;
        }
        if self.browser.list.is_loading() && same_query {
            return None;
        }
        let offset = if load_more { self.browser.list.next_offset() } else { 0 };
        let ticket = self.browser.list.begin(identity, offset);
        if offset == 0 {
            self.browser.selected = 0;
        }
        self.browser.query = Some(query.clone());
        self.browser.lookup = None;
        self.browser.lookup_pending = None;
        self.browser.error = None;
        Some(ProviderCommand::FetchPage { query, ticket })
    }

    pub fn load_more(&mut self) -> Option<ProviderCommand> {
        let query = self.browser.query.clone()?;
        self.request_list(query, true)
    }

    pub fn request_history(&mut self, puuid: &str) -> Option<ProviderCommand> {
        let puuid = puuid.trim();
        if puuid.is_empty() {
            self.browser.error = Some("Enter a player PUUID to load match history".to_string());
            self.browser.list.clear();
            self.browser.query = None;
            return None;
        }
        self.browser.history_puuid = puuid.to_string();
        let query = ListQuery::player_history(&self.current_game(), puuid);
        self.request_list(query, false)
    }

    /// A single-record lookup replaces whatever list was showing.
    pub fn request_lookup(&mut self, request: LookupRequest) -> ProviderCommand {
        self.browser.list.clear();
        self.browser.query = None;
        self.browser.lookup = None;
        self.browser.error = None;
        self.browser.lookup_pending = Some(request.clone());
        ProviderCommand::Lookup {
            game: self.current_game(),
            request,
        }
    }

    pub fn request_dbscan(&mut self) -> Option<ProviderCommand> {
        if self.games_loading || self.clusters.params.game.trim().is_empty() {
            return None;
        }
        let params = self.clusters.params.clone();
        self.clusters.requested = Some(params.clone());
        self.clusters.report = None;
        self.clusters.series.clear();
        self.clusters.error = None;
        self.clusters.selected = 0;
        Some(ProviderCommand::RunDbscan(params))
    }

    pub fn submit_comparison(&mut self) -> Option<ProviderCommand> {
        let game = self.current_game();
        let rank = self.compare.tracker.selected_rank().map(str::to_string);
        let request = self.compare.tracker.submit(
            &game,
            self.compare.search_by,
            &self.compare.identifier,
            rank.as_deref(),
        )?;
        self.compare.report = None;
        self.compare.chart = None;
        self.compare.error = None;
        Some(ProviderCommand::Compare(request))
    }

    /// Steps through the loaded report's rank list; a new rank refetches.
    pub fn cycle_comparison_rank(&mut self, forward: bool) -> Option<ProviderCommand> {
        let report = self.compare.report.as_ref()?;
        let ranks = &report.available_ranks;
        if ranks.is_empty() {
            return None;
        }
        let current = self.compare.tracker.selected_rank();
        let idx = current.and_then(|r| ranks.iter().position(|x| x == r));
        let next = match (idx, forward) {
            (None, _) => 0,
            (Some(i), true) => (i + 1) % ranks.len(),
            (Some(i), false) => (i + ranks.len() - 1) % ranks.len(),
        };
        let rank = ranks[next].clone();
        let request = self.compare.tracker.select_rank(&rank)?;
        self.compare.error = None;
        Some(ProviderCommand::Compare(request))
    }

    pub fn submit_upload(&mut self) -> Option<ProviderCommand> {
        self.upload.message = None;
        self.upload.file_errors.clear();
        if let Err(err) = self.upload.form.validate() {
            self.upload.error = Some(err.to_string());
            return None;
        }
        self.upload.error = None;
        self.upload.loading = true;
        Some(ProviderCommand::ImportCsv(self.upload.form.clone()))
    }

    /// Applies a submitted prompt value; returns the request to send, if any.
    pub fn apply_prompt(&mut self, kind: PromptKind, raw: &str) -> Option<ProviderCommand> {
        let value = raw.trim();
        match kind {
            PromptKind::HistoryPuuid => self.request_history(value),
            PromptKind::LookupPuuid => non_empty(value).map(|v| {
                self.request_lookup(LookupRequest::PlayerByPuuid {
                    puuid: v.to_string(),
                })
            }),
            PromptKind::LookupUsername => non_empty(value).map(|v| {
                self.request_lookup(LookupRequest::PlayerByUsername {
                    username: v.to_string(),
                })
            }),
            PromptKind::LookupMatchId => non_empty(value).map(|v| {
                self.request_lookup(LookupRequest::MatchByGameMatchId {
                    game_match_id: v.to_string(),
                })
            }),
            PromptKind::StatsIdentifiers => {
                let parts: Vec<&str> = value.split_whitespace().collect();
                let [puuid, match_id] = parts.as_slice() else {
                    self.browser.error = Some("Expected: <player puuid> <game match id>".to_string());
                    return None;
                };
                Some(self.request_lookup(LookupRequest::PlayerMatchStats {
                    player_puuid: puuid.to_string(),
                    game_match_id: match_id.to_string(),
                }))
            }
            PromptKind::ComparePlayer => {
                self.compare.identifier = value.to_string();
                self.submit_comparison()
            }
            PromptKind::Eps => match value.parse::<f64>() {
                Ok(eps) if eps.is_finite() && eps > 0.0 => {
                    self.clusters.params.eps = eps;
                    self.request_dbscan()
                }
                _ => {
                    self.clusters.error = Some(format!("Invalid eps: {value}"));
                    None
                }
            },
            PromptKind::MinSamples | PromptKind::MinMatches => match value.parse::<u32>() {
                Ok(n) if n > 0 => {
                    if kind == PromptKind::MinSamples {
                        self.clusters.params.min_samples = n;
                    } else {
                        self.clusters.params.min_matches = n;
                    }
                    self.request_dbscan()
                }
                _ => {
                    self.clusters.error = Some(format!("Invalid number: {value}"));
                    None
                }
            },
            PromptKind::UploadGame => {
                self.upload.form.game_name = value.to_string();
                None
            }
            PromptKind::UploadPlayersFile => {
                self.upload.form.players_csv = non_empty(value).map(PathBuf::from);
                None
            }
            PromptKind::UploadMatchesFile => {
                self.upload.form.matches_csv = non_empty(value).map(PathBuf::from);
                None
            }
            PromptKind::UploadStatsFile => {
                self.upload.form.stats_csv = non_empty(value).map(PathBuf::from);
                None
            }
        }
    }

    pub fn select_next(&mut self) {
        match self.screen {
            Screen::Browser => {
                let len = self.browser.list.items().len();
                if len > 0 && self.browser.selected + 1 < len {
                    self.browser.selected += 1;
                }
            }
            Screen::Clusters => {
                let len = self
                    .clusters
                    .report
                    .as_ref()
                    .map(|r| r.clustered_players.len())
                    .unwrap_or(0);
                if len > 0 && self.clusters.selected + 1 < len {
                    self.clusters.selected += 1;
                }
            }
            Screen::Compare | Screen::Upload => {}
        }
    }

    pub fn select_prev(&mut self) {
        match self.screen {
            Screen::Browser => self.browser.selected = self.browser.selected.saturating_sub(1),
            Screen::Clusters => self.clusters.selected = self.clusters.selected.saturating_sub(1),
            Screen::Compare | Screen::Upload => {}
        }
    }

    /// Reveals the next page of rows for the highlighted cluster.
    pub fn show_more_cluster(&mut self) {
        let Some(report) = self.clusters.report.as_ref() else {
            return;
        };
        let Some((cluster, rows)) = report.clustered_players.get(self.clusters.selected) else {
            return;
        };
        if self.clusters.paging.remaining(*cluster, rows.len()) > 0 {
            let cluster = *cluster;
            self.clusters.paging.show_more(cluster);
        }
    }
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() { None } else { Some(value) }
}

#[derive(Debug, Clone)]
pub enum Delta {
    SetGames(Vec<GameOption>),
    GamesFailed(String),
    PageLoaded {
        ticket: FetchTicket,
        page: Page<Value>,
    },
    PageFailed {
        ticket: FetchTicket,
        error: String,
    },
    LookupLoaded {
        request: LookupRequest,
        result: Value,
    },
    LookupFailed {
        request: LookupRequest,
        error: String,
    },
    DbscanLoaded {
        params: DbscanParams,
        report: DbscanReport,
    },
    DbscanFailed {
        params: DbscanParams,
        error: String,
    },
    ComparisonLoaded {
        request: ComparisonRequest,
        report: ComparisonReport,
    },
    ComparisonFailed {
        request: ComparisonRequest,
        error: String,
    },
    ImportFinished(ImportOutcome),
    ImportFailed(String),
    Log(String),
}

#[derive(Debug, Clone)]
pub enum ProviderCommand {
    FetchGames,
    FetchPage {
        query: ListQuery,
        ticket: FetchTicket,
    },
    Lookup {
        game: String,
        request: LookupRequest,
    },
    RunDbscan(DbscanParams),
    Compare(ComparisonRequest),
    ImportCsv(ImportForm),
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::SetGames(games) => {
            state.games_loading = false;
            state.games_error = None;
            let wanted = state.current_game();
            state.games = games;
            state.game_selected = state
                .games
                .iter()
                .position(|g| g.value == wanted)
                .unwrap_or(0);
            state.retarget_clusters();
        }
        Delta::GamesFailed(err) => {
            state.games_loading = false;
            state.games_error = Some(err.clone());
            state.push_log(format!("[WARN] Games list: {err}"));
        }
        Delta::PageLoaded { ticket, page } => {
            let count = page.items.len();
            if let Ok(Outcome::Applied) = state.browser.list.complete::<String>(&ticket, Ok(page)) {
                state.push_log(format!(
                    "[INFO] {} +{count} (total {})",
                    kind_label(ticket.identity.kind),
                    state.browser.list.cursor()
                ));
            }
        }
        Delta::PageFailed { ticket, error } => {
            if let Err(err) = state.browser.list.complete::<String>(&ticket, Err(error)) {
                state.browser.query = None;
                state.browser.selected = 0;
                state.push_log(format!("[ERROR] {err}"));
                state.browser.error = Some(err);
            }
        }
        Delta::LookupLoaded { request, result } => {
            if state.browser.lookup_pending.as_ref() != Some(&request) {
                return;
            }
            state.browser.lookup_pending = None;
            state.browser.lookup = Some(result);
        }
        Delta::LookupFailed { request, error } => {
            if state.browser.lookup_pending.as_ref() != Some(&request) {
                return;
            }
            state.browser.lookup_pending = None;
            state.push_log(format!("[ERROR] {error}"));
            state.browser.error = Some(error);
        }
        Delta::DbscanLoaded { params, report } => {
            if state.clusters.requested.as_ref() != Some(&params) {
                // Parameters changed while this analysis was running.
                return;
            }
            state.clusters.requested = None;
            state.clusters.series = cluster_series(&report.scatter_plot_data);
            state
                .clusters
                .paging
                .reset(report.clustered_players.iter().map(|(id, _)| *id));
            state.clusters.selected = 0;
            state.clusters.report = Some(report);
        }
        Delta::DbscanFailed { params, error } => {
            if state.clusters.requested.as_ref() != Some(&params) {
                return;
            }
            state.clusters.requested = None;
            state.clusters.report = None;
            state.clusters.series.clear();
            state.push_log(format!("[ERROR] {error}"));
            state.clusters.error = Some(error);
        }
        Delta::ComparisonLoaded { request, report } => {
            if !state.compare.tracker.accept(&request, &report) {
                return;
            }
            state.compare.chart = comparison_chart(&report, &state.compare.policy);
            state.compare.report = Some(report);
            state.compare.error = None;
        }
        Delta::ComparisonFailed { request, error } => {
            if !state.compare.tracker.reject(&request) {
                return;
            }
            state.compare.report = None;
            state.compare.chart = None;
            state.push_log(format!("[ERROR] {error}"));
            state.compare.error = Some(error);
        }
        Delta::ImportFinished(outcome) => {
            state.upload.loading = false;
            match outcome {
                ImportOutcome::Accepted { message } => {
                    state.push_log(format!("[INFO] Import: {message}"));
                    state.upload.message = Some(message);
                    state.upload.error = None;
                    state.upload.file_errors.clear();
                    state.upload.form = ImportForm::default();
                }
                ImportOutcome::Rejected { error, files } => {
                    state.push_log(format!("[WARN] Import rejected: {error}"));
                    state.upload.error = Some(error);
                    state.upload.file_errors = files;
                }
            }
        }
        Delta::ImportFailed(err) => {
            state.upload.loading = false;
            state.push_log(format!("[ERROR] Import: {err}"));
            state.upload.error = Some(err);
        }
        Delta::Log(msg) => state.push_log(msg),
    }
}

pub fn kind_label(kind: QueryKind) -> &'static str {
    match kind {
        QueryKind::Players => "Players",
        QueryKind::Matches => "Matches",
        QueryKind::PlayerHistory => "Match history",
    }
}

/// Display lines for one list row.
pub fn list_item_lines(kind: QueryKind, item: &Value) -> Vec<String> {
    match kind {
        QueryKind::Players => vec![
            format!(
                "{} | PUUID: {}",
                text_or_na(item, "username"),
                text_or_na(item, "puuid")
            ),
            format!(
                "Game: {} | Rank: {}",
                game_display(item),
                text_or_na(item, "rank")
            ),
        ],
        QueryKind::Matches => vec![
            format!(
                "Match {} | {}",
                text_or_na(item, "game_match_id"),
                game_display(item)
            ),
            format!(
                "Map: {} | Mode: {} | {} | Ranked: {}",
                text_or_na(item, "map_name"),
                text_or_na(item, "game_mode"),
                timestamp_display(item.get("match_timestamp")),
                ranked_display(item.get("is_ranked"))
            ),
        ],
        QueryKind::PlayerHistory => {
            let Some(info) = item.get("match_info").filter(|v| v.is_object()) else {
                return vec!["No match info for this entry".to_string()];
            };
            let result = if item.get("won_match").and_then(Value::as_bool).unwrap_or(false) {
                "Win"
            } else {
                "Loss"
            };
            let kda = item
                .get("kda")
                .and_then(Value::as_f64)
                .map(|v| format!("{v:.2}"))
                .unwrap_or_else(|| "N/A".to_string());
            vec![
                format!(
                    "Match {} | {} | {}",
                    text_or_na(info, "game_match_id"),
                    text_or_na(info, "map_name"),
                    timestamp_display(info.get("match_timestamp"))
                ),
                format!(
                    "{result} | K/D/A {}/{}/{} (KDA {kda}) | Damage {}",
                    text_or_na(item, "kills"),
                    text_or_na(item, "deaths"),
                    text_or_na(item, "assists"),
                    text_or_na(item, "damage_dealt")
                ),
            ]
        }
    }
}

fn text_or_na(item: &Value, key: &str) -> String {
    match item.get(key) {
        None | Some(Value::Null) => "N/A".to_string(),
        Some(Value::String(s)) if s.is_empty() => "N/A".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn game_display(item: &Value) -> String {
    let code = text_or_na(item, "game_name");
    match item.get("game_name_display").and_then(Value::as_str) {
        Some(label) => format!("{label} ({code})"),
        None => code,
    }
}

fn ranked_display(value: Option<&Value>) -> &'static str {
    match value.and_then(Value::as_bool) {
        Some(true) => "Yes",
        Some(false) => "No",
        None => "N/A",
    }
}

pub fn timestamp_display(value: Option<&Value>) -> String {
    let Some(raw) = value.and_then(Value::as_str).map(str::trim) else {
        return "N/A".to_string();
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format("%Y-%m-%d %H:%M").to_string();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return dt.format("%Y-%m-%d %H:%M").to_string();
    }
    raw.to_string()
}
