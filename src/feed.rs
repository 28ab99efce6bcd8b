use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};
use std::thread;

use crate::api;
use crate::csv_import;
use crate::settings::Settings;
use crate::state::{Delta, ProviderCommand};

/// Serves UI commands against the stats API. Each command runs on its own
/// worker thread so a slow analysis never blocks list paging; results come
/// back as deltas and the UI decides whether they are still wanted.
pub fn spawn_provider(settings: Settings, tx: Sender<Delta>, cmd_rx: Receiver<ProviderCommand>) {
    let settings = Arc::new(settings);
    thread::spawn(move || {
        for cmd in cmd_rx {
            let settings = Arc::clone(&settings);
            let tx = tx.clone();
            thread::spawn(move || {
                let delta = run_command(&settings, cmd);
                let _ = tx.send(delta);
            });
        }
    });
}

fn run_command(settings: &Settings, cmd: ProviderCommand) -> Delta {
    match cmd {
        ProviderCommand::FetchGames => match api::fetch_available_games(settings) {
            Ok(games) => Delta::SetGames(games),
            Err(err) => Delta::GamesFailed(format!("{err:#}")),
        },
        ProviderCommand::FetchPage { query, ticket } => {
            match api::fetch_list_page(settings, &query, ticket.offset) {
                Ok(page) => Delta::PageLoaded { ticket, page },
                Err(err) => Delta::PageFailed {
                    ticket,
                    error: format!("{err:#}"),
                },
            }
        }
        ProviderCommand::Lookup { game, request } => {
            match api::fetch_lookup(settings, &game, &request) {
                Ok(result) => Delta::LookupLoaded { request, result },
                Err(err) => Delta::LookupFailed {
                    request,
                    error: format!("{err:#}"),
                },
            }
        }
        ProviderCommand::RunDbscan(params) => match api::fetch_dbscan(settings, &params) {
            Ok(report) => Delta::DbscanLoaded { params, report },
            Err(err) => Delta::DbscanFailed {
                params,
                error: format!("{err:#}"),
            },
        },
        ProviderCommand::Compare(request) => {
            match api::fetch_player_comparison(settings, &request) {
                Ok(report) => Delta::ComparisonLoaded { request, report },
                Err(err) => Delta::ComparisonFailed {
                    request,
                    error: format!("{err:#}"),
                },
            }
        }
        ProviderCommand::ImportCsv(form) => match csv_import::submit_import(settings, &form) {
            Ok(outcome) => Delta::ImportFinished(outcome),
            Err(err) => Delta::ImportFailed(format!("{err:#}")),
        },
    }
}
