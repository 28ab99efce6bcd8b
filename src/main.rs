use std::io;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::widgets::{
    Axis, Bar, BarChart, BarGroup, Block, Borders, Chart, Clear, Dataset, GraphType, Paragraph, Row,
    Table, Wrap,
};

use stats_terminal::api::ListQuery;
use stats_terminal::dbscan::{axis_bounds, format_cell, table_columns};
use stats_terminal::settings::Settings;
use stats_terminal::state::{
    self, AppState, PromptKind, ProviderCommand, Screen, apply_delta, kind_label, list_item_lines,
};
use stats_terminal::{fake_feed, feed};

const CLUSTER_COLORS: [Color; 6] = [
    Color::LightRed,
    Color::LightBlue,
    Color::Yellow,
    Color::Cyan,
    Color::Magenta,
    Color::LightGreen,
];

struct Prompt {
    kind: PromptKind,
    buffer: String,
}

struct App {
    state: AppState,
    should_quit: bool,
    cmd_tx: Option<mpsc::Sender<ProviderCommand>>,
    prompt: Option<Prompt>,
}

impl App {
    fn new(settings: &Settings, cmd_tx: Option<mpsc::Sender<ProviderCommand>>) -> Self {
        Self {
            state: AppState::new(settings),
            should_quit: false,
            cmd_tx,
            prompt: None,
        }
    }

    fn send(&mut self, cmd: Option<ProviderCommand>) {
        let Some(cmd) = cmd else {
            return;
        };
        let Some(tx) = &self.cmd_tx else {
            self.state.push_log("[INFO] Provider unavailable");
            return;
        };
        if tx.send(cmd).is_err() {
            self.state.push_log("[WARN] Provider request failed");
        }
    }

    fn open_prompt(&mut self, kind: PromptKind) {
        let buffer = match kind {
            PromptKind::HistoryPuuid => self.state.browser.history_puuid.clone(),
            PromptKind::ComparePlayer => self.state.compare.identifier.clone(),
            PromptKind::Eps => self.state.clusters.params.eps.to_string(),
            PromptKind::MinSamples => self.state.clusters.params.min_samples.to_string(),
            PromptKind::MinMatches => self.state.clusters.params.min_matches.to_string(),
            PromptKind::UploadGame => self.state.upload.form.game_name.clone(),
            _ => String::new(),
        };
        self.prompt = Some(Prompt { kind, buffer });
    }

    fn on_prompt_key(&mut self, key: KeyEvent) {
        let Some(prompt) = self.prompt.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Esc => self.prompt = None,
            KeyCode::Enter => {
                if let Some(prompt) = self.prompt.take() {
                    let cmd = self.state.apply_prompt(prompt.kind, &prompt.buffer);
                    self.send(cmd);
                }
            }
            KeyCode::Backspace => {
                prompt.buffer.pop();
            }
            KeyCode::Char(c) => prompt.buffer.push(c),
            _ => {}
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if self.prompt.is_some() {
            self.on_prompt_key(key);
            return;
        }
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            KeyCode::Esc => self.state.help_overlay = false,
            KeyCode::Char('1') => self.state.screen = Screen::Browser,
            KeyCode::Char('2') => self.state.screen = Screen::Clusters,
            KeyCode::Char('3') => self.state.screen = Screen::Compare,
            KeyCode::Char('4') => self.state.screen = Screen::Upload,
            KeyCode::Char('g') => {
                self.state.cycle_game();
                self.state
                    .push_log(format!("[INFO] Game: {}", self.state.current_game_label()));
            }
            KeyCode::Char('j') | KeyCode::Down => self.state.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.state.select_prev(),
            _ => match self.state.screen {
                Screen::Browser => self.on_browser_key(key),
                Screen::Clusters => self.on_clusters_key(key),
                Screen::Compare => self.on_compare_key(key),
                Screen::Upload => self.on_upload_key(key),
            },
        }
    }

    fn on_browser_key(&mut self, key: KeyEvent) {
        let game = self.state.current_game();
        match key.code {
            KeyCode::Char('p') => {
                let cmd = self.state.request_list(ListQuery::players(&game), false);
                self.send(cmd);
            }
            KeyCode::Char('m') => {
                let cmd = self.state.request_list(ListQuery::matches(&game), false);
                self.send(cmd);
            }
            KeyCode::Char('n') => {
                let cmd = self.state.load_more();
                self.send(cmd);
            }
            KeyCode::Char('h') => self.open_prompt(PromptKind::HistoryPuuid),
            KeyCode::Char('f') => self.open_prompt(PromptKind::LookupPuuid),
            KeyCode::Char('u') => self.open_prompt(PromptKind::LookupUsername),
            KeyCode::Char('x') => self.open_prompt(PromptKind::LookupMatchId),
            KeyCode::Char('s') => self.open_prompt(PromptKind::StatsIdentifiers),
            _ => {}
        }
    }

    fn on_clusters_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter | KeyCode::Char('r') => {
                let cmd = self.state.request_dbscan();
                self.send(cmd);
            }
            KeyCode::Char('e') => self.open_prompt(PromptKind::Eps),
            KeyCode::Char('s') => self.open_prompt(PromptKind::MinSamples),
            KeyCode::Char('m') => self.open_prompt(PromptKind::MinMatches),
            KeyCode::Char('n') => self.state.show_more_cluster(),
            _ => {}
        }
    }

    fn on_compare_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter | KeyCode::Char('/') => self.open_prompt(PromptKind::ComparePlayer),
            KeyCode::Char('t') => self.state.compare.search_by = self.state.compare.search_by.toggle(),
            KeyCode::Char(']') | KeyCode::Right => {
                let cmd = self.state.cycle_comparison_rank(true);
                self.send(cmd);
            }
            KeyCode::Char('[') | KeyCode::Left => {
                let cmd = self.state.cycle_comparison_rank(false);
                self.send(cmd);
            }
            _ => {}
        }
    }

    fn on_upload_key(&mut self, key: KeyEvent) {
        if self.state.upload.loading {
            return;
        }
        match key.code {
            KeyCode::Char('a') => self.open_prompt(PromptKind::UploadGame),
            KeyCode::Char('p') => self.open_prompt(PromptKind::UploadPlayersFile),
            KeyCode::Char('m') => self.open_prompt(PromptKind::UploadMatchesFile),
            KeyCode::Char('s') => self.open_prompt(PromptKind::UploadStatsFile),
            KeyCode::Enter => {
                let cmd = self.state.submit_upload();
                self.send(cmd);
            }
            _ => {}
        }
    }

    /// The cluster view runs its analysis as soon as it is shown with nothing loaded.
    fn maybe_start_analysis(&mut self) {
        let clusters = &self.state.clusters;
        if self.state.screen != Screen::Clusters
            || clusters.report.is_some()
            || clusters.is_loading()
            || clusters.error.is_some()
        {
            return;
        }
        let cmd = self.state.request_dbscan();
        self.send(cmd);
    }
}

fn main() -> io::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    let settings = Settings::from_env();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    if settings.demo {
        fake_feed::spawn_fake_provider(settings.page_size, tx, cmd_rx);
    } else {
        feed::spawn_provider(settings.clone(), tx, cmd_rx);
    }

    let mut app = App::new(&settings, Some(cmd_tx));
    app.state
        .push_log(format!("[INFO] Stats API: {}", settings.api_base_url));
    app.send(Some(ProviderCommand::FetchGames));
    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<state::Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }

        app.maybe_start_analysis();

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(5),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(&app.state))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    match app.state.screen {
        Screen::Browser => render_browser(frame, chunks[1], &app.state),
        Screen::Clusters => render_clusters(frame, chunks[1], &app.state),
        Screen::Compare => render_compare(frame, chunks[1], &app.state),
        Screen::Upload => render_upload(frame, chunks[1], &app.state),
    }

    let console = Paragraph::new(console_text(&app.state))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, chunks[2]);

    let footer = Paragraph::new(footer_text(&app.state)).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, chunks[3]);

    if let Some(prompt) = &app.prompt {
        render_prompt(frame, frame.size(), prompt);
    }
    if app.state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(state: &AppState) -> String {
    let screen = match state.screen {
        Screen::Browser => "API BROWSER",
        Screen::Clusters => "DBSCAN CLUSTERS",
        Screen::Compare => "PLAYER COMPARISON",
        Screen::Upload => "CSV UPLOAD",
    };
    let game = if state.games_loading {
        "loading games...".to_string()
    } else {
        state.current_game_label()
    };
    let games_note = state
        .games_error
        .as_ref()
        .map(|e| format!(" (games list unavailable: {e})"))
        .unwrap_or_default();
    format!(" STATS TERMINAL | {screen} | Game: {game}{games_note}")
}

fn footer_text(state: &AppState) -> String {
    let screen_keys = match state.screen {
        Screen::Browser => {
            "p Players | m Matches | h History | n Load more | f/u Find player | x Find match | s Match stats"
        }
        Screen::Clusters => "r Run | e Eps | s Min samples | m Min matches | j/k Cluster | n Show more",
        Screen::Compare => "Enter Player | t PUUID/Username | [ ] Rank",
        Screen::Upload => "a Game | p/m/s Files | Enter Upload",
    };
    format!("1-4 Screens | g Game | {screen_keys} | ? Help | q Quit")
}

fn error_line(err: &str) -> Line<'static> {
    Line::from(Span::styled(
        format!("Error: {err}"),
        Style::default().fg(Color::Red),
    ))
}

fn render_browser(frame: &mut Frame, area: Rect, state: &AppState) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(area);
    let browser = &state.browser;

    if let Some(result) = &browser.lookup {
        let text = serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string());
        let panel = Paragraph::new(text)
            .wrap(Wrap { trim: false })
            .block(Block::default().title("Lookup result").borders(Borders::ALL));
        frame.render_widget(panel, sections[0]);
    } else if let Some(err) = &browser.error {
        let panel = Paragraph::new(error_line(err))
            .block(Block::default().title("Results").borders(Borders::ALL));
        frame.render_widget(panel, sections[0]);
    } else {
        render_list(frame, sections[0], state);
    }

    let status = if browser.lookup_pending.is_some() {
        "Loading lookup...".to_string()
    } else if let Some(page) = browser.list.state() {
        let more = if browser.list.is_loading() {
            "loading..."
        } else if browser.list.can_load_more() {
            "more available (n)"
        } else {
            "end of list"
        };
        format!(
            "{}: {} items | {more}",
            kind_label(page.identity.kind),
            page.cursor
        )
    } else {
        "No list loaded".to_string()
    };
    frame.render_widget(
        Paragraph::new(status).style(Style::default().fg(Color::DarkGray)),
        sections[1],
    );
}

fn render_list(frame: &mut Frame, area: Rect, state: &AppState) {
    let browser = &state.browser;
    let title = match (&browser.query, browser.list.identity()) {
        (Some(query), Some(identity)) => match &query.player_puuid {
            Some(puuid) => format!("{} {puuid} ({})", kind_label(identity.kind), state.current_game_label()),
            None => format!("{} ({})", kind_label(identity.kind), state.current_game_label()),
        },
        _ => "Results".to_string(),
    };
    let block = Block::default().title(title).borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let items = browser.list.items();
    let Some(identity) = browser.list.identity() else {
        let hint = Paragraph::new("Press p for players, m for matches, h for a player's match history")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(hint, inner);
        return;
    };
    if items.is_empty() {
        let text = if browser.list.is_loading() {
            "Loading..."
        } else {
            "No data to display"
        };
        frame.render_widget(
            Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
            inner,
        );
        return;
    }

    const ROW_HEIGHT: u16 = 3;
    let visible = (inner.height / ROW_HEIGHT).max(1) as usize;
    let (start, end) = visible_range(browser.selected, items.len(), visible);
    let mut lines: Vec<Line> = Vec::new();
    for idx in start..end {
        let selected = idx == browser.selected;
        let style = if selected {
            Style::default().fg(Color::White).bg(Color::DarkGray)
        } else {
            Style::default()
        };
        let marker = if selected { ">" } else { " " };
        for (n, text) in list_item_lines(identity.kind, &items[idx]).into_iter().enumerate() {
            let prefix = if n == 0 { format!("{marker}{:>4}. ", idx + 1) } else { "       ".to_string() };
            lines.push(Line::from(Span::styled(format!("{prefix}{text}"), style)));
        }
        lines.push(Line::from(""));
    }
    frame.render_widget(Paragraph::new(lines), inner);
}

fn visible_range(selected: usize, total: usize, visible: usize) -> (usize, usize) {
    if total == 0 {
        return (0, 0);
    }
    if total <= visible {
        return (0, total);
    }

    let mut start = selected.saturating_sub(visible / 2);
    if start + visible > total {
        start = total - visible;
    }
    (start, start + visible)
}

fn render_clusters(frame: &mut Frame, area: Rect, state: &AppState) {
    let clusters = &state.clusters;
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(6), Constraint::Percentage(50), Constraint::Min(5)])
        .split(area);

    let params = &clusters.params;
    let mut details = vec![Line::from(format!(
        "Params: game={} eps={} min_samples={} min_matches={}",
        params.game, params.eps, params.min_samples, params.min_matches
    ))];
    if clusters.is_loading() {
        details.push(Line::from("Running analysis..."));
    }
    if let Some(err) = &clusters.error {
        details.push(error_line(err));
    }
    if let Some(d) = clusters.report.as_ref().and_then(|r| r.analysis_details.as_ref()) {
        details.push(Line::from(format!(
            "Players analyzed: {} | Clusters (excl. noise): {} | Noise points: {}",
            d.total_players_analyzed, d.clusters_found, d.noise_points
        )));
        details.push(Line::from(format!("Features: {}", d.features_used.join(", "))));
        if let Some(msg) = &d.message {
            details.push(Line::from(format!("Server: {msg}")));
        }
    }
    frame.render_widget(
        Paragraph::new(details).block(Block::default().title("Analysis").borders(Borders::ALL)),
        rows[0],
    );

    render_scatter(frame, rows[1], state);
    render_cluster_table(frame, rows[2], state);
}

fn render_scatter(frame: &mut Frame, area: Rect, state: &AppState) {
    let clusters = &state.clusters;
    let block = Block::default().title("Scatter").borders(Borders::ALL);
    let Some(report) = &clusters.report else {
        frame.render_widget(block, area);
        return;
    };
    let analyzed = report
        .analysis_details
        .as_ref()
        .map(|d| d.total_players_analyzed)
        .unwrap_or(0);
    if analyzed == 0 || clusters.series.is_empty() {
        let text = if analyzed == 0 {
            "No data to plot (0 players analyzed for these parameters)"
        } else {
            "No scatter data received"
        };
        frame.render_widget(
            Paragraph::new(text)
                .style(Style::default().fg(Color::DarkGray))
                .block(block),
            area,
        );
        return;
    }

    let datasets: Vec<Dataset> = clusters
        .series
        .iter()
        .enumerate()
        .map(|(idx, series)| {
            let color = if series.is_noise() {
                Color::DarkGray
            } else {
                CLUSTER_COLORS[idx % CLUSTER_COLORS.len()]
            };
            Dataset::default()
                .name(series.label.clone())
                .marker(if series.is_noise() { Marker::Dot } else { Marker::Braille })
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(color))
                .data(&series.points)
        })
        .collect();

    let details = report.analysis_details.as_ref();
    let x_title = details
        .and_then(|d| d.x_axis_label.clone())
        .unwrap_or_else(|| "X".to_string());
    let y_title = details
        .and_then(|d| d.y_axis_label.clone())
        .unwrap_or_else(|| "Y".to_string());
    let x_bounds = axis_bounds(&clusters.series, |p| p.0);
    let y_bounds = axis_bounds(&clusters.series, |p| p.1);

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .title(x_title)
                .bounds(x_bounds)
                .labels(axis_labels(x_bounds)),
        )
        .y_axis(
            Axis::default()
                .title(y_title)
                .bounds(y_bounds)
                .labels(axis_labels(y_bounds)),
        );
    frame.render_widget(chart, area);
}

fn axis_labels(bounds: [f64; 2]) -> Vec<Span<'static>> {
    let mid = (bounds[0] + bounds[1]) / 2.0;
    vec![
        Span::raw(format!("{:.1}", bounds[0])),
        Span::raw(format!("{mid:.1}")),
        Span::raw(format!("{:.1}", bounds[1])),
    ]
}

fn render_cluster_table(frame: &mut Frame, area: Rect, state: &AppState) {
    let clusters = &state.clusters;
    let Some(report) = &clusters.report else {
        frame.render_widget(Block::default().title("Players").borders(Borders::ALL), area);
        return;
    };
    let Some((cluster, players)) = report.clustered_players.get(clusters.selected) else {
        frame.render_widget(
            Paragraph::new("No clustered players")
                .style(Style::default().fg(Color::DarkGray))
                .block(Block::default().title("Players").borders(Borders::ALL)),
            area,
        );
        return;
    };

    let columns = table_columns(report.analysis_details.as_ref());
    let shown = clusters.paging.visible(*cluster).min(players.len());
    let remaining = clusters.paging.remaining(*cluster, players.len());
    let group = if *cluster == stats_terminal::dbscan::NOISE_CLUSTER {
        "Noise".to_string()
    } else {
        format!("Cluster {cluster}")
    };
    let more = if remaining > 0 {
        format!(" | n: show {remaining} more")
    } else {
        String::new()
    };
    let title = format!(
        "{group} - {} players ({}/{}){more}",
        players.len(),
        clusters.selected + 1,
        report.clustered_players.len()
    );

    let header = Row::new(columns.iter().map(|c| c.label.clone()).collect::<Vec<_>>())
        .style(Style::default().add_modifier(Modifier::BOLD));
    let rows: Vec<Row> = players
        .iter()
        .take(shown)
        .map(|player| {
            Row::new(
                columns
                    .iter()
                    .map(|c| format_cell(player.get(&c.key)))
                    .collect::<Vec<_>>(),
            )
        })
        .collect();
    let widths: Vec<Constraint> = columns
        .iter()
        .map(|c| match c.key.as_str() {
            "player_id" => Constraint::Length(6),
            "puuid" => Constraint::Length(20),
            "username" => Constraint::Length(18),
            _ => Constraint::Min(8),
        })
        .collect();
    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().title(title).borders(Borders::ALL));
    frame.render_widget(table, area);
}

fn render_compare(frame: &mut Frame, area: Rect, state: &AppState) {
    let compare = &state.compare;
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(34),
            Constraint::Min(30),
            Constraint::Length(34),
        ])
        .split(area);

    let mut left = vec![
        Line::from(format!("Search by: {}", compare.search_by.label())),
        Line::from(format!(
            "Player: {}",
            if compare.identifier.is_empty() { "-" } else { compare.identifier.as_str() }
        )),
        Line::from(""),
    ];
    if compare.tracker.is_loading() {
        left.push(Line::from("Analyzing..."));
    }
    if let Some(err) = &compare.error {
        left.push(error_line(err));
    }
    if let Some(report) = &compare.report {
        let target = &report.target_player;
        left.push(Line::from(Span::styled(
            format!(
                "{} ({})",
                target.username,
                target.rank.clone().unwrap_or_else(|| "N/A".to_string())
            ),
            Style::default().add_modifier(Modifier::BOLD),
        )));
        if let Some(n) = target.matches_analyzed {
            left.push(Line::from(format!("Averages over last {n} matches:")));
        }
        for (key, value) in &target.stats {
            let value = value.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".to_string());
            left.push(Line::from(format!("  {}: {value}", key.replace("avg_", "").replace('_', " "))));
        }
    }
    frame.render_widget(
        Paragraph::new(left)
            .wrap(Wrap { trim: false })
            .block(Block::default().title("Player").borders(Borders::ALL)),
        cols[0],
    );

    render_comparison_chart(frame, cols[1], state);

    let mut right = Vec::new();
    match &compare.report {
        Some(report) => {
            let selected = compare.tracker.selected_rank().unwrap_or("-");
            right.push(Line::from(format!("Comparison rank: {selected}")));
            let ranks = if report.available_ranks.is_empty() {
                "none".to_string()
            } else {
                report.available_ranks.join(", ")
            };
            right.push(Line::from(format!("Available: {ranks}")));
            right.push(Line::from(""));
            match &report.comparison_group.stats_boundaries {
                Some(boundaries) => {
                    right.push(Line::from(format!(
                        "Averages for {} players of rank {}:",
                        report.comparison_group.player_count.unwrap_or(0),
                        report.comparison_group.rank.as_deref().unwrap_or("N/A")
                    )));
                    for (key, _) in &report.target_player.stats {
                        if let Some(b) = boundaries.get(key) {
                            right.push(Line::from(format!(
                                "  {}: {:.2} [{:.2}..{:.2}]",
                                key.replace("avg_", "").replace('_', " "),
                                b.avg,
                                b.min,
                                b.max
                            )));
                        }
                    }
                }
                None => right.push(Line::from("Pick a rank to see cohort stats")),
            }
        }
        None => right.push(Line::from("Press Enter to choose a player")),
    }
    frame.render_widget(
        Paragraph::new(right)
            .wrap(Wrap { trim: false })
            .block(Block::default().title("Rank cohort").borders(Borders::ALL)),
        cols[2],
    );
}

fn render_comparison_chart(frame: &mut Frame, area: Rect, state: &AppState) {
    let compare = &state.compare;
    let block = Block::default()
        .title("Normalized comparison (0-100)")
        .borders(Borders::ALL);
    let Some(chart) = &compare.chart else {
        let text = if compare.tracker.is_loading() {
            "Updating chart..."
        } else {
            "No data for the chart"
        };
        frame.render_widget(
            Paragraph::new(text)
                .style(Style::default().fg(Color::DarkGray))
                .block(block),
            area,
        );
        return;
    };

    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(block.inner(area));
    frame.render_widget(block, area);

    let legend = Line::from(vec![
        Span::styled(format!("■ {}", chart.player_label), Style::default().fg(Color::LightBlue)),
        Span::raw("   "),
        Span::styled(format!("■ {}", chart.group_label), Style::default().fg(Color::LightRed)),
    ]);
    frame.render_widget(Paragraph::new(legend), sections[0]);

    let mut bars = BarChart::default()
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(0)
        .group_gap(1)
        .max(100);
    for (player, group) in chart.player.iter().zip(chart.group.iter()) {
        let player_bar = Bar::default()
            .value(percent(player.value))
            .text_value(format!("{:.2}", player.value))
            .style(Style::default().fg(Color::LightBlue));
        let group_bar = Bar::default()
            .value(percent(group.value))
            .text_value(format!("{:.2}", group.value))
            .style(Style::default().fg(Color::LightRed));
        bars = bars.data(
            BarGroup::default()
                .label(Line::from(player.label.clone()))
                .bars(&[player_bar, group_bar]),
        );
    }
    frame.render_widget(bars, sections[1]);
}

fn percent(value: f64) -> u64 {
    (value.clamp(0.0, 1.0) * 100.0).round() as u64
}

fn render_upload(frame: &mut Frame, area: Rect, state: &AppState) {
    let upload = &state.upload;
    let path_text = |p: &Option<std::path::PathBuf>| {
        p.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    };
    let mut lines = vec![
        Line::from(format!(
            "Game name (a):     {}",
            if upload.form.game_name.is_empty() { "(required)" } else { upload.form.game_name.as_str() }
        )),
        Line::from(format!("Players CSV (p):   {}", path_text(&upload.form.players_csv))),
        Line::from(format!("Matches CSV (m):   {}", path_text(&upload.form.matches_csv))),
        Line::from(format!("Stats CSV (s):     {}", path_text(&upload.form.stats_csv))),
        Line::from(""),
    ];
    if upload.loading {
        lines.push(Line::from("Uploading..."));
    }
    if let Some(msg) = &upload.message {
        lines.push(Line::from(Span::styled(msg.clone(), Style::default().fg(Color::Green))));
    }
    if let Some(err) = &upload.error {
        lines.push(error_line(err));
    }
    if !upload.file_errors.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from("Row errors:"));
        for file in &upload.file_errors {
            lines.push(Line::from(format!("File \"{}\":", file.file)));
            if let Some(note) = &file.note {
                lines.push(Line::from(format!("  {note}")));
            }
            for row in &file.rows {
                let number = row
                    .row_number
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "?".to_string());
                let data = row.data.as_ref().map(|d| format!(" (data: {d})")).unwrap_or_default();
                lines.push(Line::from(format!("  Row {number}: {}{data}", row.errors)));
            }
        }
    }
    frame.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().title("Import CSV").borders(Borders::ALL)),
        area,
    );
}

fn console_text(state: &AppState) -> String {
    if state.logs.is_empty() {
        return "No messages yet".to_string();
    }
    let start = state.logs.len().saturating_sub(3);
    state
        .logs
        .iter()
        .skip(start)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_prompt(frame: &mut Frame, area: Rect, prompt: &Prompt) {
    let popup = centered_rect(60, 20, area);
    frame.render_widget(Clear, popup);
    let text = format!("{}_\n\nEnter submit | Esc cancel", prompt.buffer);
    let widget = Paragraph::new(text)
        .block(Block::default().title(prompt.kind.title()).borders(Borders::ALL));
    frame.render_widget(widget, popup);
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 70, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "Stats Terminal - Help",
        "",
        "Global:",
        "  1/2/3/4      Browser / Clusters / Compare / Upload",
        "  g            Next game",
        "  j/k or ↑/↓   Move",
        "  ?            Toggle help",
        "  q            Quit",
        "",
        "Browser:",
        "  p / m        Players / matches list",
        "  h            Player match history (PUUID)",
        "  n            Load more",
        "  f / u / x    Find player by PUUID / username, match by id",
        "  s            Player stats in a match",
        "",
        "Clusters:",
        "  r            Run analysis",
        "  e / s / m    Edit eps / min samples / min matches",
        "  n            Show more players in the selected cluster",
        "",
        "Compare:",
        "  Enter        Choose player",
        "  t            Search by PUUID or username",
        "  [ / ]        Previous / next comparison rank",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
