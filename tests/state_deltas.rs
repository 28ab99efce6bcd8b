use std::collections::HashMap;

use serde_json::json;
use stats_terminal::api::{
    ComparisonGroup, ComparisonReport, DbscanReport, GameOption, ListQuery, LookupRequest,
    TargetPlayer,
};
use stats_terminal::fake_feed::{demo_games, demo_page};
use stats_terminal::query_cache::Page;
use stats_terminal::settings::Settings;
use stats_terminal::stat_normalizer::MetricBoundary;
use stats_terminal::state::{AppState, Delta, ProviderCommand, Screen, apply_delta};

fn ready_state() -> AppState {
    let mut state = AppState::new(&Settings::default());
    apply_delta(&mut state, Delta::SetGames(demo_games()));
    state
}

fn rows(n: usize) -> Vec<serde_json::Value> {
    (0..n).map(|i| json!({"id": i, "username": format!("p{i}")})).collect()
}

fn fetch_ticket(cmd: Option<ProviderCommand>) -> stats_terminal::query_cache::FetchTicket {
    match cmd {
        Some(ProviderCommand::FetchPage { ticket, .. }) => ticket,
        other => panic!("expected a page fetch, got {other:?}"),
    }
}

fn report(rank: Option<&str>, ranks: &[&str]) -> ComparisonReport {
    let mut boundaries = HashMap::new();
    boundaries.insert("avg_kills".to_string(), MetricBoundary::new(0.0, 5.0, 10.0));
    boundaries.insert("avg_deaths".to_string(), MetricBoundary::new(0.0, 5.0, 10.0));
    ComparisonReport {
        target_player: TargetPlayer {
            id: Some(json!(7)),
            username: "Aster".to_string(),
            rank: rank.map(str::to_string),
            matches_analyzed: Some(20),
            stats: vec![
                ("avg_kills".to_string(), Some(12.0)),
                ("avg_deaths".to_string(), Some(7.0)),
            ],
        },
        comparison_group: ComparisonGroup {
            rank: rank.map(str::to_string),
            player_count: Some(10),
            stats_boundaries: Some(boundaries),
        },
        available_ranks: ranks.iter().map(|r| r.to_string()).collect(),
    }
}

#[test]
fn games_list_keeps_the_configured_default() {
    let mut state = AppState::new(&Settings {
        default_game: "pubg".to_string(),
        ..Settings::default()
    });
    assert!(state.games_loading);
    apply_delta(
        &mut state,
        Delta::SetGames(vec![
            GameOption {
                value: "valorant".to_string(),
                label: "Valorant".to_string(),
            },
            GameOption {
                value: "pubg".to_string(),
                label: "PUBG".to_string(),
            },
        ]),
    );
    assert!(!state.games_loading);
    assert_eq!(state.current_game(), "pubg");
    assert_eq!(state.clusters.params.game, "pubg");
}

#[test]
fn load_more_appends_pages() {
    let mut state = ready_state();
    let first = fetch_ticket(state.request_list(ListQuery::players("valorant"), false));
    assert_eq!(first.offset, 0);
    apply_delta(
        &mut state,
        Delta::PageLoaded {
            ticket: first,
            page: Page {
                items: rows(10),
                has_more: true,
            },
        },
    );
    assert!(state.browser.list.can_load_more());

    let second = fetch_ticket(state.load_more());
    assert_eq!(second.offset, 10);
    // A second click while loading does nothing.
    assert!(state.load_more().is_none());
    apply_delta(
        &mut state,
        Delta::PageLoaded {
            ticket: second,
            page: Page {
                items: rows(5),
                has_more: false,
            },
        },
    );
    assert_eq!(state.browser.list.items().len(), 15);
    assert!(!state.browser.list.has_more());
    assert!(state.load_more().is_none());
}

#[test]
fn switching_lists_discards_the_late_page() {
    let mut state = ready_state();
    let players = fetch_ticket(state.request_list(ListQuery::players("valorant"), false));
    let matches = fetch_ticket(state.request_list(ListQuery::matches("valorant"), false));

    apply_delta(
        &mut state,
        Delta::PageLoaded {
            ticket: matches,
            page: Page {
                items: rows(3),
                has_more: false,
            },
        },
    );
    apply_delta(
        &mut state,
        Delta::PageLoaded {
            ticket: players,
            page: Page {
                items: rows(10),
                has_more: true,
            },
        },
    );
    assert_eq!(state.browser.list.items().len(), 3);
    assert_eq!(
        state.browser.list.identity(),
        Some(&ListQuery::matches("valorant").identity())
    );
}

#[test]
fn page_failure_clears_the_list() {
    let mut state = ready_state();
    let first = fetch_ticket(state.request_list(ListQuery::players("valorant"), false));
    apply_delta(
        &mut state,
        Delta::PageLoaded {
            ticket: first,
            page: Page {
                items: rows(10),
                has_more: true,
            },
        },
    );
    let second = fetch_ticket(state.load_more());
    apply_delta(
        &mut state,
        Delta::PageFailed {
            ticket: second,
            error: "http 500: server exploded".to_string(),
        },
    );
    assert!(state.browser.list.items().is_empty());
    assert!(!state.browser.list.has_more());
    assert_eq!(
        state.browser.error.as_deref(),
        Some("http 500: server exploded")
    );
    assert!(state.logs.iter().any(|l| l.starts_with("[ERROR]")));
}

#[test]
fn stale_failure_is_ignored() {
    let mut state = ready_state();
    let old = fetch_ticket(state.request_list(ListQuery::players("valorant"), false));
    let current = fetch_ticket(state.request_list(ListQuery::players("pubg"), false));
    apply_delta(
        &mut state,
        Delta::PageLoaded {
            ticket: current,
            page: Page {
                items: rows(4),
                has_more: false,
            },
        },
    );
    apply_delta(
        &mut state,
        Delta::PageFailed {
            ticket: old,
            error: "timeout".to_string(),
        },
    );
    assert_eq!(state.browser.list.items().len(), 4);
    assert!(state.browser.error.is_none());
}

#[test]
fn history_needs_a_puuid() {
    let mut state = ready_state();
    assert!(state.request_history("   ").is_none());
    assert!(state.browser.error.is_some());

    let ticket = fetch_ticket(state.request_history("valorant-puuid-001"));
    assert_eq!(ticket.identity, ListQuery::player_history("valorant", "valorant-puuid-001").identity());
}

#[test]
fn late_lookup_is_dropped() {
    let mut state = ready_state();
    let first = LookupRequest::PlayerByPuuid {
        puuid: "a".to_string(),
    };
    let second = LookupRequest::PlayerByUsername {
        username: "b".to_string(),
    };
    state.request_lookup(first.clone());
    state.request_lookup(second.clone());

    apply_delta(
        &mut state,
        Delta::LookupLoaded {
            request: first,
            result: json!({"puuid": "a"}),
        },
    );
    assert!(state.browser.lookup.is_none());
    apply_delta(
        &mut state,
        Delta::LookupLoaded {
            request: second,
            result: json!({"username": "b"}),
        },
    );
    assert_eq!(state.browser.lookup, Some(json!({"username": "b"})));
    assert!(state.browser.lookup_pending.is_none());
}

#[test]
fn dbscan_result_for_old_params_is_ignored() {
    let mut state = ready_state();
    state.screen = Screen::Clusters;
    let Some(ProviderCommand::RunDbscan(old)) = state.request_dbscan() else {
        panic!("expected a dbscan request");
    };
    let Some(ProviderCommand::RunDbscan(current)) = state.apply_prompt(stats_terminal::state::PromptKind::Eps, "2.5") else {
        panic!("eps change should rerun the analysis");
    };
    assert_eq!(current.eps, 2.5);

    let empty = DbscanReport {
        scatter_plot_data: Vec::new(),
        analysis_details: None,
        clustered_players: vec![(0, vec![json!({"username": "x"})])],
    };
    apply_delta(
        &mut state,
        Delta::DbscanLoaded {
            params: old,
            report: empty.clone(),
        },
    );
    assert!(state.clusters.report.is_none());
    assert!(state.clusters.is_loading());

    apply_delta(
        &mut state,
        Delta::DbscanLoaded {
            params: current,
            report: empty,
        },
    );
    assert!(state.clusters.report.is_some());
    assert!(!state.clusters.is_loading());
}

#[test]
fn dbscan_waits_for_games() {
    let mut state = AppState::new(&Settings::default());
    assert!(state.request_dbscan().is_none());
}

#[test]
fn invalid_eps_is_rejected() {
    let mut state = ready_state();
    assert!(state.apply_prompt(stats_terminal::state::PromptKind::Eps, "-1").is_none());
    assert!(state.clusters.error.is_some());
    assert_eq!(state.clusters.params.eps, 1.5);
}

#[test]
fn comparison_adopts_player_rank_then_cycles() {
    let mut state = ready_state();
    state.compare.identifier = "valorant-puuid-001".to_string();
    let Some(ProviderCommand::Compare(first)) = state.submit_comparison() else {
        panic!("expected a comparison request");
    };
    assert_eq!(first.rank, None);

    apply_delta(
        &mut state,
        Delta::ComparisonLoaded {
            request: first,
            report: report(Some("Gold"), &["Silver", "Gold", "Platinum"]),
        },
    );
    assert_eq!(state.compare.tracker.selected_rank(), Some("Gold"));
    let chart = state.compare.chart.as_ref().expect("chart");
    assert_eq!(chart.player[0].value, 1.0);
    assert!((chart.player[1].value - 0.3).abs() < 1e-9);

    let Some(ProviderCommand::Compare(next)) = state.cycle_comparison_rank(true) else {
        panic!("rank change should refetch");
    };
    assert_eq!(next.rank.as_deref(), Some("Platinum"));
    assert!(state.compare.tracker.is_loading());
}

#[test]
fn superseded_comparison_is_dropped() {
    let mut state = ready_state();
    state.compare.identifier = "first".to_string();
    let Some(ProviderCommand::Compare(first)) = state.submit_comparison() else {
        panic!("expected a comparison request");
    };
    state.compare.identifier = "second".to_string();
    let Some(ProviderCommand::Compare(second)) = state.submit_comparison() else {
        panic!("expected a comparison request");
    };

    apply_delta(
        &mut state,
        Delta::ComparisonFailed {
            request: first,
            error: "http 404: Player not found".to_string(),
        },
    );
    assert!(state.compare.error.is_none());
    assert!(state.compare.tracker.is_loading());

    apply_delta(
        &mut state,
        Delta::ComparisonLoaded {
            request: second,
            report: report(Some("Silver"), &["Silver"]),
        },
    );
    assert!(state.compare.report.is_some());
    assert!(!state.compare.tracker.is_loading());
}

#[test]
fn empty_identifier_does_not_submit() {
    let mut state = ready_state();
    assert!(state.submit_comparison().is_none());
}

#[test]
fn upload_requires_game_and_file() {
    let mut state = ready_state();
    assert!(state.submit_upload().is_none());
    assert!(state.upload.error.is_some());

    state.apply_prompt(stats_terminal::state::PromptKind::UploadGame, " Valorant ");
    assert!(state.submit_upload().is_none());

    state.apply_prompt(stats_terminal::state::PromptKind::UploadPlayersFile, "players.csv");
    let Some(ProviderCommand::ImportCsv(form)) = state.submit_upload() else {
        panic!("complete form should submit");
    };
    assert_eq!(form.validate().expect("valid form"), "valorant");
    assert!(state.upload.loading);
}

#[test]
fn demo_pages_walk_to_the_end() {
    let query = ListQuery::matches("valorant");
    let mut offset = 0;
    let mut seen = 0;
    loop {
        let page = demo_page(&query, offset, 10).expect("demo page");
        seen += page.items.len();
        offset += page.items.len();
        if !page.has_more {
            break;
        }
    }
    assert_eq!(seen, 23);
    assert!(demo_page(&ListQuery::players("chess"), 0, 10).is_err());
}

#[test]
fn rows_render_with_fallbacks() {
    use stats_terminal::query_cache::QueryKind;
    use stats_terminal::state::list_item_lines;

    let lines = list_item_lines(
        QueryKind::Matches,
        &json!({"game_match_id": "m-1", "game_name": "valorant", "match_timestamp": "2024-05-01T18:30:00Z", "is_ranked": true}),
    );
    assert_eq!(lines[0], "Match m-1 | valorant");
    assert_eq!(lines[1], "Map: N/A | Mode: N/A | 2024-05-01 18:30 | Ranked: Yes");

    let history = list_item_lines(QueryKind::PlayerHistory, &json!({"kills": 3}));
    assert_eq!(history, ["No match info for this entry"]);
}

#[test]
fn changing_game_drops_the_previous_analysis() {
    let mut state = ready_state();
    state.screen = Screen::Clusters;
    let Some(ProviderCommand::RunDbscan(valorant)) = state.request_dbscan() else {
        panic!("expected a dbscan request");
    };
    apply_delta(
        &mut state,
        Delta::DbscanLoaded {
            params: valorant,
            report: DbscanReport {
                scatter_plot_data: Vec::new(),
                analysis_details: None,
                clustered_players: Vec::new(),
            },
        },
    );
    assert!(state.clusters.report.is_some());

    state.screen = Screen::Browser;
    state.cycle_game();
    assert_eq!(state.clusters.params.game, "pubg");
    assert!(state.clusters.report.is_none());
    assert!(state.clusters.series.is_empty());
    assert!(!state.clusters.is_loading());

    // Back on the cluster view, the next request targets the new game.
    state.screen = Screen::Clusters;
    let Some(ProviderCommand::RunDbscan(pubg)) = state.request_dbscan() else {
        panic!("expected a dbscan request for the new game");
    };
    assert_eq!(pubg.game, "pubg");
}

#[test]
fn in_flight_analysis_for_old_game_is_ignored() {
    let mut state = ready_state();
    let Some(ProviderCommand::RunDbscan(valorant)) = state.request_dbscan() else {
        panic!("expected a dbscan request");
    };
    state.cycle_game();
    assert!(!state.clusters.is_loading());

    apply_delta(
        &mut state,
        Delta::DbscanLoaded {
            params: valorant,
            report: DbscanReport {
                scatter_plot_data: Vec::new(),
                analysis_details: None,
                clustered_players: vec![(0, vec![json!({"username": "old"})])],
            },
        },
    );
    assert!(state.clusters.report.is_none());
}

#[test]
fn only_applied_pages_are_logged() {
    let mut state = ready_state();
    let stale = fetch_ticket(state.request_list(ListQuery::players("valorant"), false));
    let current = fetch_ticket(state.request_list(ListQuery::matches("valorant"), false));
    let logs_before = state.logs.len();

    apply_delta(
        &mut state,
        Delta::PageLoaded {
            ticket: stale,
            page: Page {
                items: rows(10),
                has_more: true,
            },
        },
    );
    assert_eq!(state.logs.len(), logs_before);

    apply_delta(
        &mut state,
        Delta::PageLoaded {
            ticket: current,
            page: Page {
                items: rows(2),
                has_more: false,
            },
        },
    );
    assert_eq!(state.logs.len(), logs_before + 1);
    assert_eq!(state.logs.back().map(String::as_str), Some("[INFO] Matches +2 (total 2)"));
}
