use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols;
use ratatui::widgets::{
    Axis, Block, Borders, Cell, Chart, Clear, Dataset, GraphType, Paragraph, Row, Table,
};

use gng_terminal::config::PipelineConfig;
use gng_terminal::model::{GameIndexedRow, PlayerSeasonSummary};
use gng_terminal::roster::{self, RosterEntry, RosterFilter};
use gng_terminal::store::{self, RunRecord};
use gng_terminal::views::{self, ViewMode};

const SERIES_COLORS: [Color; 8] = [
    Color::Cyan,
    Color::Yellow,
    Color::Green,
    Color::Magenta,
    Color::Blue,
    Color::LightRed,
    Color::LightGreen,
    Color::White,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Panel {
    Trajectory,
    Standings,
    Leaderboard,
    Heatmap,
    Summary,
}

impl Panel {
    fn label(self) -> &'static str {
        match self {
            Panel::Trajectory => "Rank trajectory",
            Panel::Standings => "Standings",
            Panel::Leaderboard => "Points leaderboard",
            Panel::Heatmap => "Goals heatmap",
            Panel::Summary => "Season summary",
        }
    }
}

struct App {
    db_path: PathBuf,
    roster_path: Option<PathBuf>,
    games: Vec<GameIndexedRow>,
    summaries: Vec<PlayerSeasonSummary>,
    roster: Vec<RosterEntry>,
    filters: Vec<RosterFilter>,
    filter_idx: usize,
    last_run: Option<RunRecord>,
    modes: Vec<ViewMode>,
    mode_idx: usize,
    panel: Panel,
    scroll: usize,
    status: String,
    help_overlay: bool,
    should_quit: bool,
}

impl App {
    fn new(db_path: PathBuf, roster_path: Option<PathBuf>, mut modes: Vec<ViewMode>) -> Self {
        if modes.is_empty() {
            modes = ViewMode::dashboard_cycle();
        }
        Self {
            db_path,
            roster_path,
            games: Vec::new(),
            summaries: Vec::new(),
            roster: Vec::new(),
            filters: vec![RosterFilter::All],
            filter_idx: 0,
            last_run: None,
            modes,
            mode_idx: 0,
            panel: Panel::Trajectory,
            scroll: 0,
            status: String::new(),
            help_overlay: false,
            should_quit: false,
        }
    }

    fn reload(&mut self) -> Result<()> {
        let conn = store::open_db(&self.db_path)?;
        self.games = store::load_game_indexed(&conn)?;
        self.summaries = store::load_player_summary(&conn)?;
        self.last_run = store::recent_runs(&conn, 1)?.into_iter().next();
        if let Some(path) = &self.roster_path {
            self.roster = roster::load_roster(path)?;
        }
        let current = self.filter().clone();
        self.filters = RosterFilter::cycle(&self.roster);
        self.filter_idx = self.filters.iter().position(|f| *f == current).unwrap_or(0);
        self.status = format!(
            "[INFO] Loaded {} game rows, {} players",
            self.games.len(),
            self.summaries.len()
        );
        Ok(())
    }

    fn mode(&self) -> &ViewMode {
        &self.modes[self.mode_idx % self.modes.len()]
    }

    fn filter(&self) -> &RosterFilter {
        &self.filters[self.filter_idx % self.filters.len()]
    }

    fn on_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('1') => self.show(Panel::Trajectory),
            KeyCode::Char('2') => self.show(Panel::Standings),
            KeyCode::Char('3') => self.show(Panel::Leaderboard),
            KeyCode::Char('4') => self.show(Panel::Heatmap),
            KeyCode::Char('5') => self.show(Panel::Summary),
            KeyCode::Char('m') | KeyCode::Tab => {
                self.mode_idx = (self.mode_idx + 1) % self.modes.len();
                self.scroll = 0;
            }
            KeyCode::Char('M') | KeyCode::BackTab => {
                self.mode_idx = (self.mode_idx + self.modes.len() - 1) % self.modes.len();
                self.scroll = 0;
            }
            KeyCode::Char('f') => {
                self.filter_idx = (self.filter_idx + 1) % self.filters.len();
                self.scroll = 0;
            }
            KeyCode::Char('j') | KeyCode::Down => self.scroll = self.scroll.saturating_add(1),
            KeyCode::Char('k') | KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
            KeyCode::Char('r') => {
                if let Err(err) = self.reload() {
                    self.status = format!("[WARN] Reload failed: {err:#}");
                }
            }
            KeyCode::Char('?') => self.help_overlay = !self.help_overlay,
            _ => {}
        }
    }

    fn show(&mut self, panel: Panel) {
        self.panel = panel;
        self.scroll = 0;
    }
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cfg = PipelineConfig::from_args(&args)?;
    let db_path = cfg
        .resolved_db_path()
        .context("unable to resolve sqlite path")?;

    let mut modes = ViewMode::dashboard_cycle();
    if let Some(raw) = gng_terminal::config::arg_value(&args, "--players") {
        let wanted: Vec<String> = raw
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if !wanted.is_empty() {
            modes.insert(1, ViewMode::SelectPlayers(wanted));
        }
    }

    let mut app = App::new(db_path, cfg.roster_path.clone(), modes);
    app.reload()?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

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

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
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
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(app)).block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    let (games, summaries) = views::filter_view(&app.games, &app.summaries, app.mode());
    if games.is_empty() {
        let empty = Paragraph::new("No game rows for this view (run gng_etl first)")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, chunks[1]);
    } else {
        match app.panel {
            Panel::Trajectory => render_trajectory(frame, chunks[1], &games),
            Panel::Standings => render_standings(frame, chunks[1], &games, app.scroll),
            Panel::Leaderboard => render_leaderboard(frame, chunks[1], &games, app.scroll),
            Panel::Heatmap => render_heatmap(frame, chunks[1], &games, app.scroll),
            Panel::Summary => render_summary(
                frame,
                chunks[1],
                &summaries,
                &app.roster,
                app.filter(),
                app.scroll,
            ),
        }
    }

    let footer = Paragraph::new(footer_text(app)).block(Block::default().borders(Borders::TOP));
    frame.render_widget(footer, chunks[2]);

    if app.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(app: &App) -> String {
    let line1 = format!(
        "  GNG SEASON | {} | {}",
        app.panel.label(),
        app.mode().label()
    );
    let line2 = match &app.last_run {
        Some(run) => format!(
            "  last run #{} {} | {} players x {} games | {}",
            run.run_id, run.finished_at, run.players, run.games_played, run.source
        ),
        None => format!("  no runs logged in {}", app.db_path.display()),
    };
    format!("{line1}\n{line2}")
}

fn footer_text(app: &App) -> String {
    let keys = "1-5 Panels | m/Tab View | f Filter | j/k Scroll | r Reload | ? Help | q Quit";
    if app.status.is_empty() {
        keys.to_string()
    } else {
        format!("{keys}   {}", app.status)
    }
}

fn render_trajectory(frame: &mut Frame, area: Rect, games: &[GameIndexedRow]) {
    let trajectories = views::rank_trajectories(games);
    let max_game = games.iter().map(|g| g.game_index).max().unwrap_or(1) as f64;
    let max_rank = games
        .iter()
        .filter_map(|g| g.cumulative_rank)
        .max()
        .unwrap_or(1) as f64;

    // Ranks are drawn flipped so the leader sits at the top.
    let flip = |rank: u32| max_rank + 1.0 - rank as f64;
    let lines: Vec<(String, Vec<(f64, f64)>)> = trajectories
        .iter()
        .map(|(player, points)| {
            let data = points
                .iter()
                .filter_map(|(game, rank, _)| rank.map(|r| (*game as f64, flip(r))))
                .collect();
            (player.clone(), data)
        })
        .collect();
    let imputed: Vec<(f64, f64)> = trajectories
        .iter()
        .flat_map(|(_, points)| points.iter())
        .filter(|(_, _, is_imputed)| *is_imputed)
        .filter_map(|(game, rank, _)| rank.map(|r| (*game as f64, flip(r))))
        .collect();

    let mut datasets: Vec<Dataset> = lines
        .iter()
        .enumerate()
        .map(|(i, (player, data))| {
            Dataset::default()
                .name(player.clone())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(SERIES_COLORS[i % SERIES_COLORS.len()]))
                .data(data)
        })
        .collect();
    if !imputed.is_empty() {
        datasets.push(
            Dataset::default()
                .name("estimated")
                .marker(symbols::Marker::Block)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(Color::Red))
                .data(&imputed),
        );
    }

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .title("Cumulative rank by game (red = estimated)")
                .borders(Borders::ALL),
        )
        .x_axis(
            Axis::default()
                .title("game")
                .bounds([1.0, max_game.max(2.0)])
                .labels(vec![
                    Span::raw("1"),
                    Span::raw(format!("{}", max_game as u32)),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("rank")
                .bounds([0.5, max_rank + 0.5])
                .labels(vec![
                    Span::raw(format!("{}", max_rank as u32)),
                    Span::raw("1"),
                ]),
        );
    frame.render_widget(chart, area);
}

fn fmt_opt(v: Option<f64>, places: usize) -> String {
    v.map(|x| format!("{x:.places$}"))
        .unwrap_or_else(|| "-".to_string())
}

fn fmt_rank(v: Option<u32>) -> String {
    v.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string())
}

fn imputed_style(is_imputed: bool) -> Style {
    if is_imputed {
        Style::default().fg(Color::Red).add_modifier(Modifier::ITALIC)
    } else {
        Style::default()
    }
}

fn render_standings(frame: &mut Frame, area: Rect, games: &[GameIndexedRow], scroll: usize) {
    let changes = views::rank_changes(games);
    let rows: Vec<Row> = views::final_standings(games)
        .into_iter()
        .skip(scroll)
        .map(|s| {
            let change = changes
                .iter()
                .find(|c| c.player == s.player)
                .and_then(|c| c.improvement)
                .map(|d| format!("{d:+}"))
                .unwrap_or_else(|| "-".to_string());
            let marker = if s.is_imputed { "*" } else { "" };
            Row::new(vec![
                Cell::from(fmt_rank(s.cumulative_rank)),
                Cell::from(format!("{}{marker}", s.player)),
                Cell::from(s.game_index.to_string()),
                Cell::from(fmt_opt(s.cumulative_score, 1)),
                Cell::from(fmt_opt(s.cumulative_goals, 1)),
                Cell::from(change),
            ])
            .style(imputed_style(s.is_imputed))
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Min(20),
            Constraint::Length(6),
            Constraint::Length(10),
            Constraint::Length(10),
            Constraint::Length(8),
        ],
    )
    .header(
        Row::new(vec!["Rank", "Player", "Game", "Score", "Goals", "Change"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(
        Block::default()
            .title("Final standings (* = last game estimated)")
            .borders(Borders::ALL),
    );
    frame.render_widget(table, area);
}

fn render_leaderboard(frame: &mut Frame, area: Rect, games: &[GameIndexedRow], scroll: usize) {
    let bubbles = views::bubble_stats(games);
    let rows: Vec<Row> = views::points_leaderboard(games)
        .into_iter()
        .enumerate()
        .skip(scroll)
        .map(|(pos, entry)| {
            let bubble = bubbles.iter().find(|b| b.player == entry.player);
            let estimated = bubble
                .map(|b| format!("{:.2}%", b.imputed_percent))
                .unwrap_or_else(|| "-".to_string());
            let style = match bubble {
                Some(b) if b.imputed_games > 0 => Style::default().fg(Color::Yellow),
                _ => Style::default(),
            };
            Row::new(vec![
                Cell::from((pos + 1).to_string()),
                Cell::from(entry.player),
                Cell::from(format!("{:.1}", entry.total_points)),
                Cell::from(format!("{:.0}", entry.total_goals)),
                Cell::from(estimated),
            ])
            .style(style)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Min(20),
            Constraint::Length(10),
            Constraint::Length(8),
            Constraint::Length(10),
        ],
    )
    .header(
        Row::new(vec!["#", "Player", "Points", "Goals", "Estimated"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().title("Season points").borders(Borders::ALL));
    frame.render_widget(table, area);
}

fn heat_color(value: f64, max: f64) -> Color {
    if max <= 0.0 || value <= 0.0 {
        return Color::Black;
    }
    let level = (value / max * 4.0).ceil() as u8;
    match level {
        0 | 1 => Color::Rgb(40, 60, 120),
        2 => Color::Rgb(60, 110, 170),
        3 => Color::Rgb(110, 170, 210),
        _ => Color::Rgb(200, 230, 250),
    }
}

fn render_heatmap(frame: &mut Frame, area: Rect, games: &[GameIndexedRow], scroll: usize) {
    let heat = views::goals_heatmap(games);
    let max = heat.max_value();
    const CELL: usize = 3;
    const NAME: usize = 14;

    let mut lines: Vec<Line> = Vec::new();
    let mut head = format!("{:<NAME$}", "");
    for g in &heat.game_indices {
        head.push_str(&format!("{g:>CELL$}"));
    }
    lines.push(Line::from(Span::styled(
        head,
        Style::default().add_modifier(Modifier::BOLD),
    )));

    for (row, last) in heat.last_names.iter().enumerate().skip(scroll) {
        let mut spans = vec![Span::raw(format!("{:<NAME$.NAME$}", last))];
        for (col, value) in heat.values[row].iter().enumerate() {
            let mark = if heat.imputed[row][col] { "*" } else { " " };
            let text = format!("{:>2}{mark}", *value as i64);
            spans.push(Span::styled(
                text,
                Style::default()
                    .bg(heat_color(*value, max))
                    .fg(if heat.imputed[row][col] { Color::Red } else { Color::White }),
            ));
        }
        lines.push(Line::from(spans));
    }

    let widget = Paragraph::new(lines).block(
        Block::default()
            .title(format!("Goals per game (max {max:.0}, * = estimated)"))
            .borders(Borders::ALL),
    );
    frame.render_widget(widget, area);
}

fn render_summary(
    frame: &mut Frame,
    area: Rect,
    summaries: &[PlayerSeasonSummary],
    entries: &[RosterEntry],
    filter: &RosterFilter,
    scroll: usize,
) {
    let ranks = views::summary_final_ranks(summaries);
    let mut joined: Vec<(Option<u32>, roster::SummaryWithRoster)> = roster::join_roster(summaries, entries)
        .into_iter()
        .filter(|row| filter.matches(row))
        .map(|row| {
            let rank = ranks
                .iter()
                .find(|(p, _)| *p == row.summary.player)
                .and_then(|(_, r)| *r);
            (rank, row)
        })
        .collect();
    joined.sort_by(|a, b| {
        a.0.unwrap_or(u32::MAX)
            .cmp(&b.0.unwrap_or(u32::MAX))
            .then(a.1.summary.player.cmp(&b.1.summary.player))
    });

    let dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    let rows: Vec<Row> = joined
        .into_iter()
        .skip(scroll)
        .map(|(rank, row)| {
            let s = &row.summary;
            let estimated = s.games_played_total > s.games_played_actual;
            Row::new(vec![
                Cell::from(fmt_rank(rank)),
                Cell::from(s.player.clone()),
                Cell::from(dash(&row.position)),
                Cell::from(dash(&row.height)),
                Cell::from(dash(&row.year)),
                Cell::from(format!("{:.1}", s.overall_score)),
                Cell::from(format!("{:.0}", s.total_goals)),
                Cell::from(format!("{}/{}", s.games_played_actual, s.games_played_total)),
                Cell::from(fmt_opt(s.avg_score_per_game, 2)),
                Cell::from(fmt_opt(s.avg_goals_per_game, 2)),
            ])
            .style(imputed_style(estimated))
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Min(18),
            Constraint::Length(10),
            Constraint::Length(7),
            Constraint::Length(6),
            Constraint::Length(8),
            Constraint::Length(6),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(8),
        ],
    )
    .header(
        Row::new(vec![
            "Rank", "Player", "Pos", "Height", "Year", "Score", "Goals", "Played", "Avg pts",
            "Avg gls",
        ])
        .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(
        Block::default()
            .title(format!("Season summary ({}, f to filter)", filter.label()))
            .borders(Borders::ALL),
    );
    frame.render_widget(table, area);
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "GNG Season - Help",
        "",
        "Panels:",
        "  1            Rank trajectory",
        "  2            Standings",
        "  3            Points leaderboard",
        "  4            Goals heatmap",
        "  5            Season summary",
        "",
        "  m / Tab      Next view (all, top, improved, bottom)",
        "  M / S-Tab    Previous view",
        "  f            Cycle roster filter (position, class year)",
        "  j/k or ↑/↓   Scroll",
        "  r            Reload from database",
        "  ?            Toggle help",
        "  q            Quit",
        "",
        "Red or * marks games with estimated values.",
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
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
