use std::fs;
use std::path::PathBuf;

use reqwest::StatusCode;
use stats_terminal::api::{
    ListQuery, parse_comparison_json, parse_dbscan_json, parse_games_json, parse_page_json,
};
use stats_terminal::csv_import::{ImportOutcome, parse_import_response};
use stats_terminal::dbscan::{cluster_series, table_columns};
use stats_terminal::http_client::server_error_message;
use stats_terminal::query_cache::QueryKind;
use stats_terminal::stat_normalizer::{InversionPolicy, comparison_chart};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[test]
fn parses_paginated_envelope() {
    let page = parse_page_json(&read_fixture("players_page.json")).expect("fixture should parse");
    assert_eq!(page.items.len(), 3);
    assert!(page.has_more);
    assert_eq!(page.items[0]["puuid"], "p-001");

    let last = parse_page_json(&read_fixture("players_last_page.json")).expect("fixture should parse");
    assert_eq!(last.items.len(), 2);
    assert!(!last.has_more);
}

#[test]
fn bare_array_is_a_single_page() {
    let page = parse_page_json(r#"[{"id": 1}, {"id": 2}]"#).expect("array should parse");
    assert_eq!(page.items.len(), 2);
    assert!(!page.has_more);
}

#[test]
fn null_or_empty_body_is_an_empty_page() {
    for raw in ["", "  ", "null"] {
        let page = parse_page_json(raw).expect("empty body should parse");
        assert!(page.items.is_empty());
        assert!(!page.has_more);
    }
}

#[test]
fn malformed_list_payloads_are_errors() {
    assert!(parse_page_json("{not json").is_err());
    assert!(parse_page_json(r#"{"next": null}"#).is_err());
    assert!(parse_page_json("42").is_err());
}

#[test]
fn list_query_identity_scopes_by_game_and_player() {
    let players = ListQuery::players("valorant");
    assert_eq!(players.identity().kind, QueryKind::Players);
    assert_ne!(players.identity(), ListQuery::players("pubg").identity());
    assert_ne!(players.identity(), ListQuery::matches("valorant").identity());

    let a = ListQuery::player_history("valorant", "p-001").identity();
    let b = ListQuery::player_history("valorant", "p-002").identity();
    assert_ne!(a, b);

    let params = players.params(10, 20);
    assert!(params.contains(&("limit", "10".to_string())));
    assert!(params.contains(&("offset", "20".to_string())));
    assert!(params.contains(&("game_name", "valorant".to_string())));
}

#[test]
fn parses_games_fixture() {
    let games = parse_games_json(&read_fixture("games.json")).expect("fixture should parse");
    assert_eq!(games.len(), 2);
    assert_eq!(games[1].value, "pubg");
    assert_eq!(games[1].label, "PUBG");
    assert!(parse_games_json("").expect("empty ok").is_empty());
}

#[test]
fn parses_dbscan_fixture() {
    let report = parse_dbscan_json(&read_fixture("dbscan.json")).expect("fixture should parse");
    // The point without an x coordinate is dropped.
    assert_eq!(report.scatter_plot_data.len(), 4);

    let ids: Vec<i64> = report.clustered_players.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, [-1, 0, 1]);
    assert_eq!(report.clustered_players[1].1.len(), 2);

    let details = report.analysis_details.as_ref().expect("details");
    assert_eq!(details.total_players_analyzed, 4);
    assert_eq!(details.noise_points, 1);
    assert_eq!(details.x_axis_label.as_deref(), Some("PCA Component 1"));

    let series = cluster_series(&report.scatter_plot_data);
    let labels: Vec<&str> = series.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, ["Noise (1)", "Cluster 0 (2)", "Cluster 1 (1)"]);
    assert!(series[0].is_noise());

    let columns: Vec<String> = table_columns(Some(details))
        .into_iter()
        .map(|c| c.label)
        .collect();
    assert_eq!(
        columns,
        ["DB ID", "PUUID", "Username", "Avg Kills", "Avg Deaths", "Avg Damage Dealt"]
    );
}

#[test]
fn parses_comparison_fixture_in_server_order() {
    let report = parse_comparison_json(&read_fixture("comparison.json")).expect("fixture should parse");
    let keys: Vec<&str> = report
        .target_player
        .stats
        .iter()
        .map(|(k, _)| k.as_str())
        .collect();
    assert_eq!(
        keys,
        ["avg_kills", "avg_deaths", "avg_assists", "avg_headshots", "avg_damage_dealt"]
    );
    assert_eq!(report.target_player.stats[3].1, None);
    assert_eq!(report.available_ranks, ["Silver", "Gold", "Platinum"]);

    let boundaries = report
        .comparison_group
        .stats_boundaries
        .as_ref()
        .expect("boundaries");
    // Missing avg makes the boundary unusable.
    assert!(!boundaries.contains_key("avg_damage_dealt"));
    assert_eq!(boundaries.len(), 4);
}

#[test]
fn comparison_chart_aligns_both_series() {
    let report = parse_comparison_json(&read_fixture("comparison.json")).expect("fixture should parse");
    let chart = comparison_chart(&report, &InversionPolicy::default()).expect("chart");

    assert_eq!(chart.labels(), ["Kills", "Deaths (inverted)", "Assists"]);
    let player: Vec<f64> = chart.player.iter().map(|p| p.value).collect();
    let group: Vec<f64> = chart.group.iter().map(|p| p.value).collect();
    assert_eq!(player[0], 1.0);
    assert!((player[1] - 0.3).abs() < 1e-9);
    assert_eq!(player[2], 0.0);
    assert_eq!(group[0], 0.5);
    assert!((group[1] - 0.5).abs() < 1e-9);
    assert!((group[2] - 0.4).abs() < 1e-9);

    assert_eq!(chart.player_label, "Aster (Last 20)");
    assert_eq!(chart.group_label, "Avg. Rank: Gold (42 players)");
}

#[test]
fn comparison_without_group_has_no_chart() {
    let raw = r#"{"target_player": {"username": "Solo", "stats": {"avg_kills": 3}}, "available_ranks": []}"#;
    let report = parse_comparison_json(raw).expect("should parse");
    assert!(report.comparison_group.stats_boundaries.is_none());
    assert!(comparison_chart(&report, &InversionPolicy::default()).is_none());
}

#[test]
fn parses_import_row_errors() {
    let outcome = parse_import_response(false, &read_fixture("import_errors.json"));
    let ImportOutcome::Rejected { error, files } = outcome else {
        panic!("expected a rejected import");
    };
    assert_eq!(error, "Some rows could not be imported");
    assert_eq!(files.len(), 2);

    let players = files.iter().find(|f| f.file == "players_csv").expect("players errors");
    assert_eq!(players.rows.len(), 2);
    assert_eq!(players.rows[0].row_number, Some(3));
    assert!(players.rows[0].errors.contains("This field is required."));
    assert!(players.rows[0].data.is_some());
    assert_eq!(players.rows[1].data, None);

    let matches = files.iter().find(|f| f.file == "matches_csv").expect("matches errors");
    assert!(matches.rows.is_empty());
    assert_eq!(matches.note.as_deref(), Some("file has no header row"));
}

#[test]
fn import_defaults_when_body_is_not_json() {
    assert_eq!(
        parse_import_response(true, "<html>ok</html>"),
        ImportOutcome::Accepted {
            message: "Files uploaded and processed".to_string()
        }
    );
    assert_eq!(
        parse_import_response(false, ""),
        ImportOutcome::Rejected {
            error: "Upload failed".to_string(),
            files: Vec::new()
        }
    );
}

#[test]
fn server_errors_prefer_detail_fields() {
    assert_eq!(
        server_error_message(StatusCode::NOT_FOUND, r#"{"detail": "Player not found"}"#),
        "http 404: Player not found"
    );
    assert_eq!(
        server_error_message(StatusCode::BAD_REQUEST, r#"{"error": "game_name is required"}"#),
        "http 400: game_name is required"
    );
}
