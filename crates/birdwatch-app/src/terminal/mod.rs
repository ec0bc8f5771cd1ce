//! Ratatui dashboard: header, map panel, settings, environment, zones and an
//! event log. Keys become [`OperatorCommand`]s on the command bus; drawing
//! only reads [`DashboardView`]s, so it never waits on the network.

use std::{
    fs,
    io::{self, Stdout},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use birdwatch_core::{ConfigField, FactorField};
use birdwatch_render::render_snapshot;
use crossterm::{
    cursor::{Hide, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::{CrosstermBackend, TestBackend},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
};
use serde::Serialize;
use supports_color::{Stream, on_cached};
use tracing::info;

use crate::command::{CommandSubmit, OperatorCommand};
use crate::orchestrator::{DashboardView, EventKind, Orchestrator};
use crate::remote::RemoteService;
use crate::slot::PushStatus;

mod glyph;

pub use glyph::{CELL_HEIGHT, CELL_WIDTH, GlyphCell, GlyphSurface, terminal_color};

pub const HEADLESS_ENV: &str = "BIRDWATCH_TERMINAL_HEADLESS";
pub const HEADLESS_FRAMES_ENV: &str = "BIRDWATCH_TERMINAL_HEADLESS_FRAMES";
pub const REPORT_ENV: &str = "BIRDWATCH_TERMINAL_REPORT";

pub const DEFAULT_DRAW_MILLIS: u64 = 100;
const IDLE_REDRAW_MILLIS: u64 = 500;
const DEFAULT_HEADLESS_FRAMES: usize = 12;
const MAX_HEADLESS_FRAMES: usize = 360;
const HEADLESS_SIZE: (u16, u16) = (100, 36);

const SPEED_STEP: i64 = 10;
const TEMPERATURE_STEP: f64 = 1.0;
const FOOD_STEP: f64 = 0.1;
const PREDATOR_STEP: f64 = 0.05;

pub struct TerminalDashboard {
    draw_interval: Duration,
}

impl TerminalDashboard {
    pub fn with_draw_interval(draw_interval: Duration) -> Self {
        Self { draw_interval }
    }

    pub fn headless_requested() -> bool {
        std::env::var_os(HEADLESS_ENV).is_some()
    }

    /// Run until the operator quits, or for a fixed number of frames on a
    /// test backend when `BIRDWATCH_TERMINAL_HEADLESS` is set.
    pub async fn run<R: RemoteService>(
        &self,
        orchestrator: Orchestrator<R>,
        submit: CommandSubmit,
    ) -> Result<()> {
        if Self::headless_requested() {
            let report = self
                .run_headless(&orchestrator, headless_frame_budget())
                .await?;
            info!(
                target = "birdwatch::terminal",
                frames = report.frames,
                final_revision = report.final_revision,
                running = report.running,
                sim_time = report.sim_time,
                birds = report.birds,
                predators = report.predators,
                collisions = report.collision_count,
                events = report.events,
                "Terminal headless run completed"
            );
            if let Some(path) = report_file_path_from_env() {
                report.write_json(&path).with_context(|| {
                    format!("failed to write headless report to {}", path.display())
                })?;
            }
            return Ok(());
        }

        let draw_interval = self.draw_interval;
        tokio::task::spawn_blocking(move || run_interactive(orchestrator, submit, draw_interval))
            .await
            .context("terminal thread panicked")??;
        Ok(())
    }

    /// Draw `frames` frames onto a [`TestBackend`], one per draw interval,
    /// while the poll loop keeps running.
    pub async fn run_headless<R: RemoteService>(
        &self,
        orchestrator: &Orchestrator<R>,
        frames: usize,
    ) -> Result<HeadlessReport> {
        let backend = TestBackend::new(HEADLESS_SIZE.0, HEADLESS_SIZE.1);
        let mut terminal = Terminal::new(backend).context("failed to build test backend")?;
        let palette = Palette::new(false);

        for _ in 0..frames {
            tokio::time::sleep(self.draw_interval).await;
            let view = orchestrator.view();
            terminal
                .draw(|frame| draw_dashboard(frame, &view, &palette, false))
                .context("failed to draw headless frame")?;
        }

        let view = orchestrator.view();
        let mut map = GlyphSurface::new(HEADLESS_SIZE.0 / 2, HEADLESS_SIZE.1 / 2);
        render_snapshot(&view.sync.snapshot, &mut map);
        Ok(HeadlessReport::from_view(&view, frames, map.to_lines()))
    }
}

fn run_interactive<R: RemoteService>(
    orchestrator: Orchestrator<R>,
    submit: CommandSubmit,
    draw_interval: Duration,
) -> Result<()> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, Hide).context("failed to enter alternate screen")?;
    let _cleanup = TerminalCleanup;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to build terminal backend")?;

    let mut app = DashboardApp::new(orchestrator, submit);
    let result = run_event_loop(&mut terminal, &mut app, draw_interval);
    terminal.show_cursor().ok();
    result
}

fn run_event_loop<R: RemoteService>(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut DashboardApp<R>,
    draw_interval: Duration,
) -> Result<()> {
    let mut revision = app.orchestrator.subscribe();
    let idle_redraw = Duration::from_millis(IDLE_REDRAW_MILLIS);
    let mut dirty = true;
    let mut last_draw = Instant::now();

    loop {
        if revision.has_changed().unwrap_or(false) {
            revision.borrow_and_update();
            dirty = true;
        }
        if dirty || last_draw.elapsed() >= idle_redraw {
            terminal
                .draw(|frame| app.draw(frame))
                .context("failed to draw dashboard")?;
            last_draw = Instant::now();
            dirty = false;
        }

        if event::poll(draw_interval).context("failed to poll terminal events")? {
            match event::read().context("failed to read terminal event")? {
                Event::Key(key) => {
                    if app.handle_key(key) {
                        break;
                    }
                    dirty = true;
                }
                Event::Resize(..) => dirty = true,
                _ => {}
            }
        }
    }

    Ok(())
}

struct TerminalCleanup;

impl Drop for TerminalCleanup {
    fn drop(&mut self) {
        if let Err(err) = disable_raw_mode() {
            tracing::error!(?err, "failed to disable raw mode");
        }
        let mut stdout = io::stdout();
        if let Err(err) = execute!(stdout, LeaveAlternateScreen, Show) {
            tracing::error!(?err, "failed to leave alternate screen");
        }
    }
}

struct DashboardApp<R> {
    orchestrator: Orchestrator<R>,
    submit: CommandSubmit,
    palette: Palette,
    help_visible: bool,
}

impl<R: RemoteService> DashboardApp<R> {
    fn new(orchestrator: Orchestrator<R>, submit: CommandSubmit) -> Self {
        Self {
            orchestrator,
            submit,
            palette: Palette::detect(),
            help_visible: false,
        }
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let view = self.orchestrator.view();
        draw_dashboard(frame, &view, &self.palette, self.help_visible);
    }

    /// Returns `true` when the operator asked to quit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        match key_action(key) {
            KeyAction::Quit => return true,
            KeyAction::ToggleHelp => self.help_visible = !self.help_visible,
            KeyAction::Command(command) => {
                // A full queue is logged by the submit handle.
                (self.submit)(command);
            }
            KeyAction::Ignore => {}
        }
        false
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeyAction {
    Quit,
    ToggleHelp,
    Command(OperatorCommand),
    Ignore,
}

pub fn key_action(key: KeyEvent) -> KeyAction {
    let zone = |field: FactorField, delta: f64| {
        KeyAction::Command(OperatorCommand::AdjustSelectedZone { field, delta })
    };
    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) | (KeyCode::Char('q'), _) | (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
            KeyAction::Quit
        }
        (KeyCode::Char('?') | KeyCode::Char('h'), _) => KeyAction::ToggleHelp,
        (KeyCode::Char('s'), _) => KeyAction::Command(OperatorCommand::Start),
        (KeyCode::Char('x'), _) => KeyAction::Command(OperatorCommand::Stop),
        (KeyCode::Char('r'), _) => KeyAction::Command(OperatorCommand::Resync),
        (KeyCode::Char('w'), _) => KeyAction::Command(OperatorCommand::SaveRun),
        (KeyCode::Char('l'), _) => KeyAction::Command(OperatorCommand::LoadRun),
        (KeyCode::Char('u'), _) => KeyAction::Command(OperatorCommand::SubmitEnvironment),
        (KeyCode::Char('z'), _) => KeyAction::Command(OperatorCommand::SelectNextZone),
        (KeyCode::Char('+') | KeyCode::Char('='), _) => {
            KeyAction::Command(OperatorCommand::AdjustConfig {
                field: ConfigField::SimulationSpeed,
                delta: SPEED_STEP,
            })
        }
        (KeyCode::Char('-') | KeyCode::Char('_'), _) => {
            KeyAction::Command(OperatorCommand::AdjustConfig {
                field: ConfigField::SimulationSpeed,
                delta: -SPEED_STEP,
            })
        }
        (KeyCode::Char(']'), _) => KeyAction::Command(OperatorCommand::AdjustTimeStep(1)),
        (KeyCode::Char('['), _) => KeyAction::Command(OperatorCommand::AdjustTimeStep(-1)),
        (KeyCode::Char('t'), _) => zone(FactorField::Temperature, -TEMPERATURE_STEP),
        (KeyCode::Char('T'), _) => zone(FactorField::Temperature, TEMPERATURE_STEP),
        (KeyCode::Char('f'), _) => zone(FactorField::FoodAvailability, -FOOD_STEP),
        (KeyCode::Char('F'), _) => zone(FactorField::FoodAvailability, FOOD_STEP),
        (KeyCode::Char('p'), _) => zone(FactorField::PredatorPresence, -PREDATOR_STEP),
        (KeyCode::Char('P'), _) => zone(FactorField::PredatorPresence, PREDATOR_STEP),
        _ => KeyAction::Ignore,
    }
}

/// Draw one full dashboard frame from `view`.
pub fn draw_dashboard(
    frame: &mut Frame<'_>,
    view: &DashboardView,
    palette: &Palette,
    help_visible: bool,
) {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0)])
        .split(frame.area());

    draw_header(frame, outer[0], view, palette);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(outer[1]);

    draw_map(frame, body[0], view, palette);

    let sidebar = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7),
            Constraint::Length(7),
            Constraint::Min(4),
            Constraint::Length(8),
        ])
        .split(body[1]);

    draw_settings(frame, sidebar[0], view, palette);
    draw_environment(frame, sidebar[1], view, palette);
    draw_zones(frame, sidebar[2], view, palette);
    draw_events(frame, sidebar[3], view, palette);

    if help_visible {
        draw_help(frame, palette);
    }
}

fn draw_header(frame: &mut Frame<'_>, area: Rect, view: &DashboardView, palette: &Palette) {
    let snapshot = &view.sync.snapshot;
    let (migrating, resting, searching) = snapshot.bird_states();
    let status = if view.sync.running {
        Span::styled(" RUNNING ", palette.running_style())
    } else {
        Span::styled(" STOPPED ", palette.stopped_style())
    };

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Birdwatch ", palette.header_style()),
            status,
            Span::raw(format!(
                "  t={:<8} collisions {:<6} birds {} ({migrating}/{resting}/{searching})  predators {}  rev {}",
                snapshot.time,
                snapshot.collision_count,
                snapshot.birds.len(),
                snapshot.predators.len(),
                view.sync.revision,
            )),
        ]),
        Line::from(Span::styled(
            format!("{}  world {}", view.backend_url, snapshot.world_size),
            Style::default().fg(Color::Gray),
        )),
    ];
    if let Some(error) = &view.sync.last_error {
        lines.push(Line::from(Span::styled(
            format!("Last error: {error}"),
            Style::default().fg(Color::Red),
        )));
    }

    let header = Paragraph::new(lines).block(Block::default().borders(Borders::ALL));
    frame.render_widget(header, area);
}

fn draw_map(frame: &mut Frame<'_>, area: Rect, view: &DashboardView, palette: &Palette) {
    let snapshot = &view.sync.snapshot;
    let title = format!("World {}×{}", snapshot.world_size, snapshot.world_size);
    let block = Block::default()
        .title(palette.title(title))
        .borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.width < 2 || inner.height < 2 {
        return;
    }

    let mut surface = GlyphSurface::new(inner.width, inner.height);
    render_snapshot(snapshot, &mut surface);

    let mut lines = Vec::with_capacity(usize::from(inner.height));
    for row in 0..surface.rows() {
        let mut spans = Vec::with_capacity(usize::from(inner.width));
        for column in 0..surface.columns() {
            let Some(cell) = surface.cell(column, row) else {
                continue;
            };
            let style = match cell.fg {
                Some(color) => Style::default().fg(terminal_color(color, palette.truecolor)),
                None => Style::default(),
            };
            spans.push(Span::styled(cell.ch.to_string(), style));
        }
        lines.push(Line::from(spans));
    }
    frame.render_widget(Paragraph::new(Text::from(lines)), inner);
}

fn draw_settings(frame: &mut Frame<'_>, area: Rect, view: &DashboardView, palette: &Palette) {
    let config = &view.config.config.local;
    let time_step = view.config.time_step.local.time_step;
    let mut lines = vec![
        Line::from(format!("speed       {:>6} ms   [+/-]", config.simulation_speed)),
        Line::from(format!("world size  {:>6}", config.world_size)),
        Line::from(format!("birds       {:>6}", config.initial_birds)),
        Line::from(format!("time step   {:>6}      [ [/] ]", time_step)),
    ];
    lines.push(push_line("push", &view.config.config.last_push, palette));
    let block = Block::default()
        .title(palette.title("Settings"))
        .borders(Borders::ALL);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_environment(frame: &mut Frame<'_>, area: Rect, view: &DashboardView, palette: &Palette) {
    let factors = &view.environment.factors.local;
    let mut lines = vec![
        Line::from(format!("temperature {:>7.1}", factors.temperature)),
        Line::from(format!("food        {:>7.2}", factors.food_availability)),
        Line::from(format!("predators   {:>7.2}", factors.predator_presence)),
    ];
    lines.push(match &view.last_submitted_factors {
        Some(submitted) => Line::from(Span::styled(
            format!(
                "submitted   {:.1} / {:.2} / {:.2}",
                submitted.temperature, submitted.food_availability, submitted.predator_presence
            ),
            palette.accent_style(),
        )),
        None => Line::from(Span::styled(
            "submitted   never  [u]",
            Style::default().fg(Color::DarkGray),
        )),
    });
    lines.push(push_line("push", &view.environment.zones.last_push, palette));
    let block = Block::default()
        .title(palette.title("Environment"))
        .borders(Borders::ALL);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_zones(frame: &mut Frame<'_>, area: Rect, view: &DashboardView, palette: &Palette) {
    let selected = view.environment.selected_zone;
    let items: Vec<ListItem> = view
        .environment
        .zones
        .local
        .iter()
        .map(|zone| {
            let is_selected = Some(zone.id) == selected;
            let marker = if is_selected { "›" } else { " " };
            let text = format!(
                "{marker} #{:<3} {:>6.1}C food {:.2} pred {:.2}",
                zone.id, zone.temperature, zone.food_availability, zone.predator_presence
            );
            let style = if is_selected {
                palette.accent_style().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(Span::styled(text, style))
        })
        .collect();
    let block = Block::default()
        .title(palette.title("Zones [z t/T f/F p/P]"))
        .borders(Borders::ALL);
    frame.render_widget(List::new(items).block(block), area);
}

fn draw_events(frame: &mut Frame<'_>, area: Rect, view: &DashboardView, palette: &Palette) {
    let events: Vec<ListItem> = view
        .events
        .iter()
        .rev()
        .map(|entry| {
            let text = format!("[t{:>6}] {}", entry.sim_time, entry.message);
            ListItem::new(Span::styled(text, palette.event_style(entry.kind)))
        })
        .collect();
    let block = Block::default()
        .title(palette.title("Recent Events"))
        .borders(Borders::ALL);
    frame.render_widget(List::new(events).block(block), area);
}

fn draw_help(frame: &mut Frame<'_>, palette: &Palette) {
    let size = frame.area();
    let help_width = ((f32::from(size.width) * 0.6).round() as u16).min(size.width);
    let help_height = 15_u16.min(size.height);
    let help_x = size.x + (size.width - help_width) / 2;
    let help_y = size.y + (size.height - help_height) / 2;
    let area = Rect::new(help_x, help_y, help_width, help_height);

    let help_lines = vec![
        Line::from(vec![Span::styled(
            "Controls",
            palette.header_style().add_modifier(Modifier::BOLD),
        )]),
        Line::raw(" s / x    Start / stop the run"),
        Line::raw(" r        Resync from the service"),
        Line::raw(" + / -    Simulation speed (ms per step)"),
        Line::raw(" ] / [    Time step"),
        Line::raw(" z        Select next zone"),
        Line::raw(" t/T f/F p/P  Lower/raise zone temperature, food, predators"),
        Line::raw(" u        Submit environment"),
        Line::raw(" w / l    Save / load run"),
        Line::raw(" ?        Toggle this help"),
        Line::raw(" q        Quit"),
    ];

    let paragraph = Paragraph::new(help_lines).block(
        Block::default()
            .title(palette.title("Help"))
            .borders(Borders::ALL)
            .style(Style::default().bg(Color::Black).fg(Color::White)),
    );
    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

fn push_line(label: &str, status: &PushStatus, palette: &Palette) -> Line<'static> {
    let (text, style) = match status {
        PushStatus::Never => ("not pushed".to_owned(), Style::default().fg(Color::DarkGray)),
        PushStatus::Confirmed => ("confirmed".to_owned(), palette.event_style(EventKind::Success)),
        PushStatus::Failed(err) => (
            format!("failed: {err}"),
            palette.event_style(EventKind::Failure),
        ),
    };
    Line::from(vec![
        Span::raw(format!("{label:<12}")),
        Span::styled(text, style),
    ])
}

/// Terminal styles. Map colours come from the render palette; everything else
/// uses named colours so it reads on light and dark themes.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    truecolor: bool,
}

impl Palette {
    pub fn new(truecolor: bool) -> Self {
        Self { truecolor }
    }

    pub fn detect() -> Self {
        let truecolor = on_cached(Stream::Stdout).is_some_and(|level| level.has_16m);
        Self { truecolor }
    }

    fn header_style(&self) -> Style {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    }

    fn accent_style(&self) -> Style {
        Style::default().fg(Color::LightMagenta)
    }

    fn stopped_style(&self) -> Style {
        Style::default()
            .fg(Color::Black)
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    }

    fn running_style(&self) -> Style {
        Style::default()
            .fg(Color::Black)
            .bg(Color::Green)
            .add_modifier(Modifier::BOLD)
    }

    fn title<T: Into<String>>(&self, title: T) -> Span<'static> {
        Span::styled(title.into(), self.header_style())
    }

    fn event_style(&self, kind: EventKind) -> Style {
        let color = match kind {
            EventKind::Info => Color::Cyan,
            EventKind::Success => Color::Green,
            EventKind::Failure => Color::Red,
        };
        Style::default().fg(color)
    }
}

/// Summary of a headless run, optionally written as JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadlessReport {
    pub frames: usize,
    pub final_revision: u64,
    pub running: bool,
    pub sim_time: f64,
    pub birds: usize,
    pub predators: usize,
    pub obstacles: usize,
    pub resources: usize,
    pub temperature_zones: usize,
    pub collision_count: u64,
    pub events: usize,
    pub map: Vec<String>,
}

impl HeadlessReport {
    fn from_view(view: &DashboardView, frames: usize, map: Vec<String>) -> Self {
        let snapshot = &view.sync.snapshot;
        Self {
            frames,
            final_revision: view.sync.revision,
            running: view.sync.running,
            sim_time: snapshot.time,
            birds: snapshot.birds.len(),
            predators: snapshot.predators.len(),
            obstacles: snapshot.obstacles.len(),
            resources: snapshot.resources.len(),
            temperature_zones: snapshot.temperature_zones.len(),
            collision_count: snapshot.collision_count,
            events: view.events.len(),
            map,
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("failed to encode report")?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

fn headless_frame_budget() -> usize {
    std::env::var(HEADLESS_FRAMES_ENV)
        .ok()
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .filter(|value| *value > 0)
        .map(|value| value.min(MAX_HEADLESS_FRAMES))
        .unwrap_or(DEFAULT_HEADLESS_FRAMES)
}

fn report_file_path_from_env() -> Option<PathBuf> {
    std::env::var_os(REPORT_ENV)
        .filter(|raw| !raw.is_empty())
        .map(PathBuf::from)
}
