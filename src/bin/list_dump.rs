use anyhow::{Context, Result, anyhow};

use stats_terminal::api::{self, ListQuery};
use stats_terminal::fake_feed;
use stats_terminal::query_cache::QueryCache;
use stats_terminal::settings::Settings;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    let settings = Settings::from_env();

    let mut kind = "players".to_string();
    let mut game = settings.default_game.clone();
    let mut puuid: Option<String> = None;
    for arg in std::env::args().skip(1) {
        if let Some(rest) = arg.strip_prefix("--kind=") {
            kind = rest.trim().to_lowercase();
        } else if let Some(rest) = arg.strip_prefix("--game=") {
            game = rest.trim().to_lowercase();
        } else if let Some(rest) = arg.strip_prefix("--puuid=") {
            puuid = Some(rest.trim().to_string());
        }
    }

    let query = match kind.as_str() {
        "players" => ListQuery::players(&game),
        "matches" => ListQuery::matches(&game),
        "history" => {
            let puuid = puuid.ok_or_else(|| anyhow!("--kind=history needs --puuid=<player puuid>"))?;
            ListQuery::player_history(&game, &puuid)
        }
        other => return Err(anyhow!("unknown list kind: {other}")),
    };

    let mut cache = QueryCache::new();
    let mut offset = 0;
    let mut pages = 0usize;
    loop {
        let (items, has_more) = cache
            .fetch_page(query.identity(), offset, |_, offset| {
                if settings.demo {
                    fake_feed::demo_page(&query, offset, settings.page_size)
                } else {
                    api::fetch_list_page(&settings, &query, offset)
                }
            })
            .with_context(|| format!("fetch {kind} at offset {offset}"))?;
        pages += 1;
        eprintln!("page {pages}: {} items total", items.len());
        if !has_more {
            break;
        }
        offset = cache.next_offset();
    }

    for item in cache.items() {
        println!("{item}");
    }
    eprintln!("Done: {} {kind} in {pages} pages", cache.cursor());
    Ok(())
}
