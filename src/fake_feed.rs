use std::sync::mpsc::{Receiver, Sender};
use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Value, json};

use crate::api::{self, ComparisonReport, DbscanReport, GameOption, ListQuery, LookupRequest};
use crate::comparison::{ComparisonRequest, SearchBy};
use crate::csv_import::{ImportForm, ImportOutcome};
use crate::dbscan::DbscanParams;
use crate::query_cache::{Page, QueryKind};
use crate::state::{Delta, ProviderCommand};

const DEMO_GAMES: &[(&str, &str)] = &[("valorant", "Valorant"), ("pubg", "PUBG"), ("cs2", "CS2")];
const DEMO_RANKS: &[&str] = &["Silver", "Gold", "Platinum", "Diamond"];
const DEMO_PLAYERS: usize = 37;
const DEMO_MATCHES: usize = 23;
const DEMO_HISTORY: usize = 12;
const LATENCY: Duration = Duration::from_millis(150);

/// Offline provider: answers every command from a seeded synthetic dataset.
pub fn spawn_fake_provider(page_size: usize, tx: Sender<Delta>, cmd_rx: Receiver<ProviderCommand>) {
    thread::spawn(move || {
        let _ = tx.send(Delta::Log("[INFO] Demo data provider active".to_string()));
        for cmd in cmd_rx {
            thread::sleep(LATENCY);
            let delta = run_command(page_size, cmd);
            if tx.send(delta).is_err() {
                break;
            }
        }
    });
}

fn run_command(page_size: usize, cmd: ProviderCommand) -> Delta {
    match cmd {
        ProviderCommand::FetchGames => Delta::SetGames(demo_games()),
        ProviderCommand::FetchPage { query, ticket } => match demo_page(&query, ticket.offset, page_size) {
            Ok(page) => Delta::PageLoaded { ticket, page },
            Err(err) => Delta::PageFailed {
                ticket,
                error: err.to_string(),
            },
        },
        ProviderCommand::Lookup { game, request } => match demo_lookup(&game, &request) {
            Ok(result) => Delta::LookupLoaded { request, result },
            Err(err) => Delta::LookupFailed {
                request,
                error: err.to_string(),
            },
        },
        ProviderCommand::RunDbscan(params) => match demo_dbscan(&params) {
            Ok(report) => Delta::DbscanLoaded { params, report },
            Err(err) => Delta::DbscanFailed {
                params,
                error: err.to_string(),
            },
        },
        ProviderCommand::Compare(request) => match demo_comparison(&request) {
            Ok(report) => Delta::ComparisonLoaded { request, report },
            Err(err) => Delta::ComparisonFailed {
                request,
                error: err.to_string(),
            },
        },
        ProviderCommand::ImportCsv(form) => match demo_import(&form) {
            Ok(outcome) => Delta::ImportFinished(outcome),
            Err(err) => Delta::ImportFailed(err.to_string()),
        },
    }
}

pub fn demo_games() -> Vec<GameOption> {
    DEMO_GAMES
        .iter()
        .map(|(value, label)| GameOption {
            value: value.to_string(),
            label: label.to_string(),
        })
        .collect()
}

fn game_label(game: &str) -> Result<&'static str> {
    DEMO_GAMES
        .iter()
        .find(|(value, _)| *value == game)
        .map(|(_, label)| *label)
        .ok_or_else(|| anyhow!("http 400: unknown game '{game}'"))
}

fn seed_for(parts: &[&str]) -> u64 {
    // FNV-1a over the parts keeps every demo record stable across runs.
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for part in parts {
        for byte in part.bytes().chain(std::iter::once(0xff)) {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
    }
    hash
}

fn demo_player(game: &str, idx: usize) -> Value {
    let mut rng = StdRng::seed_from_u64(seed_for(&[game, "player", &idx.to_string()]));
    json!({
        "id": idx + 1,
        "puuid": format!("{game}-puuid-{idx:03}"),
        "username": format!("{game}_player_{idx:02}"),
        "game_name": game,
        "game_name_display": game_label(game).unwrap_or(game),
        "rank": DEMO_RANKS[rng.gen_range(0..DEMO_RANKS.len())],
    })
}

fn demo_match(game: &str, idx: usize) -> Value {
    let mut rng = StdRng::seed_from_u64(seed_for(&[game, "match", &idx.to_string()]));
    let maps = ["Ascent", "Bind", "Haven", "Erangel", "Mirage"];
    json!({
        "id": idx + 1,
        "game_match_id": format!("{game}-m-{idx:04}"),
        "game_name": game,
        "game_name_display": game_label(game).unwrap_or(game),
        "map_name": maps[rng.gen_range(0..maps.len())],
        "game_mode": if rng.gen_bool(0.7) { "competitive" } else { "casual" },
        "match_timestamp": format!("2024-05-{:02}T{:02}:{:02}:00Z", 1 + idx % 28, rng.gen_range(0..24), rng.gen_range(0..60)),
        "is_ranked": rng.gen_bool(0.6),
    })
}

fn demo_history_entry(game: &str, puuid: &str, idx: usize) -> Value {
    let mut rng = StdRng::seed_from_u64(seed_for(&[game, puuid, &idx.to_string()]));
    let kills: u32 = rng.gen_range(3..30);
    let deaths: u32 = rng.gen_range(1..25);
    let assists: u32 = rng.gen_range(0..15);
    json!({
        "id": idx + 1,
        "game_name": game,
        "match_info": demo_match(game, idx),
        "won_match": rng.gen_bool(0.5),
        "kills": kills,
        "deaths": deaths,
        "assists": assists,
        "kda": f64::from(kills + assists) / f64::from(deaths.max(1)),
        "damage_dealt": rng.gen_range(800..4500),
        "headshot_rate": rng.gen_range(5.0..45.0),
    })
}

pub fn demo_page(query: &ListQuery, offset: usize, page_size: usize) -> Result<Page<Value>> {
    let game = query.game.as_str();
    game_label(game)?;
    let total = match query.kind {
        QueryKind::Players => DEMO_PLAYERS,
        QueryKind::Matches => DEMO_MATCHES,
        QueryKind::PlayerHistory => DEMO_HISTORY,
    };
    let end = (offset + page_size).min(total);
    let items = (offset.min(end)..end)
        .map(|idx| match query.kind {
            QueryKind::Players => demo_player(game, idx),
            QueryKind::Matches => demo_match(game, idx),
            QueryKind::PlayerHistory => {
                demo_history_entry(game, query.player_puuid.as_deref().unwrap_or_default(), idx)
            }
        })
        .collect();
    Ok(Page {
        items,
        has_more: end < total,
    })
}

fn find_player(game: &str, puuid: Option<&str>, username: Option<&str>) -> Result<(usize, Value)> {
    (0..DEMO_PLAYERS)
        .map(|idx| (idx, demo_player(game, idx)))
        .find(|(_, p)| {
            puuid.is_some_and(|id| p["puuid"] == id) || username.is_some_and(|name| p["username"] == name)
        })
        .ok_or_else(|| anyhow!("http 404: Player not found"))
}

fn demo_lookup(game: &str, request: &LookupRequest) -> Result<Value> {
    game_label(game)?;
    match request {
        LookupRequest::PlayerByPuuid { puuid } => Ok(find_player(game, Some(puuid.as_str()), None)?.1),
        LookupRequest::PlayerByUsername { username } => Ok(find_player(game, None, Some(username.as_str()))?.1),
        LookupRequest::MatchByGameMatchId { game_match_id } => (0..DEMO_MATCHES)
            .map(|idx| demo_match(game, idx))
            .find(|m| m["game_match_id"] == game_match_id.as_str())
            .ok_or_else(|| anyhow!("http 404: Match not found")),
        LookupRequest::PlayerMatchStats {
            player_puuid,
            game_match_id,
        } => {
            find_player(game, Some(player_puuid.as_str()), None)?;
            (0..DEMO_HISTORY)
                .map(|idx| demo_history_entry(game, player_puuid, idx))
                .find(|e| e["match_info"]["game_match_id"] == game_match_id.as_str())
                .ok_or_else(|| anyhow!("http 404: No stats for this player in that match"))
        }
    }
}

fn demo_dbscan(params: &DbscanParams) -> Result<DbscanReport> {
    game_label(&params.game)?;
    let mut rng = StdRng::seed_from_u64(seed_for(&[&params.game, "dbscan", &params.eps.to_string()]));
    let centers = [(18.0, 1.4), (12.0, 0.9), (24.0, 2.1)];
    let mut scatter = Vec::new();
    let mut clusters: Vec<(i64, Vec<Value>)> = Vec::new();

    for idx in 0..DEMO_PLAYERS {
        let player = demo_player(&params.game, idx);
        let noise = rng.gen_bool(0.12);
        let cluster: i64 = if noise { -1 } else { (idx % centers.len()) as i64 };
        let (cx, cy) = centers[idx % centers.len()];
        let spread = if noise { 8.0 } else { params.eps.max(0.1) };
        let x = cx + rng.gen_range(-spread..spread);
        let y = (cy + rng.gen_range(-spread..spread) / 10.0_f64).max(0.0);
        scatter.push(json!({"x": x, "y": y, "cluster": cluster, "username": player["username"]}));
        let row = json!({
            "player_id": idx + 1,
            "puuid": player["puuid"],
            "username": player["username"],
            "avg_kills": x,
            "avg_kda": y,
        });
        match clusters.iter_mut().find(|(id, _)| *id == cluster) {
            Some((_, rows)) => rows.push(row),
            None => clusters.push((cluster, vec![row])),
        }
    }

    let noise_points = clusters
        .iter()
        .find(|(id, _)| *id == -1)
        .map(|(_, rows)| rows.len())
        .unwrap_or(0);
    let clustered: serde_json::Map<String, Value> = clusters
        .into_iter()
        .map(|(id, rows)| (id.to_string(), Value::Array(rows)))
        .collect();
    let raw = json!({
        "scatter_plot_data": scatter,
        "analysis_details": {
            "game_name": params.game,
            "eps": params.eps,
            "min_samples": params.min_samples,
            "min_matches_per_player": params.min_matches,
            "total_players_analyzed": DEMO_PLAYERS,
            "clusters_found": centers.len(),
            "noise_points": noise_points,
            "features_used": ["avg_kills", "avg_kda"],
            "x_axis_label": "Avg Kills",
            "y_axis_label": "Avg KDA",
        },
        "clustered_players": clustered,
    });
    api::parse_dbscan_json(&raw.to_string())
}

fn demo_comparison(request: &ComparisonRequest) -> Result<ComparisonReport> {
    game_label(&request.game)?;
    let (puuid, username) = match request.search_by {
        SearchBy::Puuid => (Some(request.identifier.as_str()), None),
        SearchBy::Username => (None, Some(request.identifier.as_str())),
    };
    let (idx, player) = find_player(&request.game, puuid, username)?;
    let own_rank = player["rank"].as_str().unwrap_or(DEMO_RANKS[0]).to_string();
    let rank = request.rank.clone().unwrap_or_else(|| own_rank.clone());
    let tier = DEMO_RANKS.iter().position(|r| *r == rank).unwrap_or(0) as f64;

    let mut rng = StdRng::seed_from_u64(seed_for(&[&request.game, "compare", &idx.to_string()]));
    let metrics = [
        ("avg_kills", 10.0 + tier * 2.5),
        ("avg_deaths", 14.0 - tier),
        ("avg_assists", 4.0 + tier),
        ("avg_kda", 1.0 + tier * 0.3),
        ("avg_headshot_rate", 12.0 + tier * 4.0),
    ];
    let mut stats = serde_json::Map::new();
    let mut boundaries = serde_json::Map::new();
    for (key, avg) in metrics {
        let spread = avg * 0.6;
        stats.insert(key.to_string(), json!(avg + rng.gen_range(-spread..spread)));
        boundaries.insert(
            key.to_string(),
            json!({"min": avg - spread * 0.8, "avg": avg, "max": avg + spread * 0.8}),
        );
    }
    let raw = json!({
        "target_player": {
            "id": idx + 1,
            "username": player["username"],
            "rank": own_rank,
            "matches_analyzed": 20,
            "stats": stats,
        },
        "comparison_group": {
            "rank": rank,
            "player_count": 40 + (tier as u32) * 7,
            "stats_boundaries": boundaries,
        },
        "available_ranks": DEMO_RANKS,
    });
    api::parse_comparison_json(&raw.to_string())
}

fn demo_import(form: &ImportForm) -> Result<ImportOutcome> {
    let game = form.validate()?;
    let missing: Vec<String> = form
        .files()
        .filter(|(_, path)| !path.exists())
        .map(|(field, path)| format!("{field}: {}", path.display()))
        .collect();
    if !missing.is_empty() {
        return Err(anyhow!("files not found: {}", missing.join(", ")));
    }
    Ok(ImportOutcome::Accepted {
        message: format!(
            "Demo mode: {} file(s) accepted for {game}",
            form.files().count()
        ),
    })
}
