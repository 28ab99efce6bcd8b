use anyhow::{Context, Result, anyhow};

use stats_terminal::api;
use stats_terminal::comparison::{ComparisonTracker, SearchBy};
use stats_terminal::settings::Settings;
use stats_terminal::stat_normalizer::comparison_chart;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    let settings = Settings::from_env();

    let mut game = settings.default_game.clone();
    let mut search_by = SearchBy::Puuid;
    let mut identifier = String::new();
    let mut rank: Option<String> = None;
    for arg in std::env::args().skip(1) {
        if let Some(rest) = arg.strip_prefix("--game=") {
            game = rest.trim().to_lowercase();
        } else if let Some(rest) = arg.strip_prefix("--username=") {
            search_by = SearchBy::Username;
            identifier = rest.trim().to_string();
        } else if let Some(rest) = arg.strip_prefix("--puuid=") {
            search_by = SearchBy::Puuid;
            identifier = rest.trim().to_string();
        } else if let Some(rest) = arg.strip_prefix("--rank=") {
            rank = Some(rest.trim().to_string()).filter(|r| !r.is_empty());
        }
    }

    let mut tracker = ComparisonTracker::new();
    let request = tracker
        .submit(&game, search_by, &identifier, rank.as_deref())
        .ok_or_else(|| anyhow!("pass --puuid=<id> or --username=<name>"))?;
    let report = api::fetch_player_comparison(&settings, &request)
        .with_context(|| format!("compare {} {identifier}", search_by.label()))?;
    tracker.accept(&request, &report);

    let target = &report.target_player;
    println!(
        "{} | rank {} | comparing against {}",
        target.username,
        target.rank.as_deref().unwrap_or("N/A"),
        tracker.selected_rank().unwrap_or("N/A")
    );
    if !report.available_ranks.is_empty() {
        println!("Available ranks: {}", report.available_ranks.join(", "));
    }

    let Some(chart) = comparison_chart(&report, &settings.inverted_metrics) else {
        println!("No comparable stats (pick a rank with --rank=<rank>).");
        return Ok(());
    };

    println!("{:<28} {:>10} {:>10}", "metric", "player", "cohort");
    for (player, group) in chart.player.iter().zip(chart.group.iter()) {
        println!("{:<28} {:>10.3} {:>10.3}", player.label, player.value, group.value);
    }
    println!("{} vs {}", chart.player_label, chart.group_label);
    Ok(())
}
