mod support;

use std::sync::Arc;
use std::time::Duration;

use birdwatch_app::terminal::{Palette, TerminalDashboard, draw_dashboard};
use birdwatch_app::{ClientSettings, Orchestrator};
use birdwatch_core::{BirdState, Position, Predator, SnapshotUpdate};
use ratatui::Terminal;
use ratatui::backend::TestBackend;
use serde_json::Value;
use support::{ScriptedRemote, bird, zone};
use tempfile::tempdir;

fn screen_text(terminal: &Terminal<TestBackend>) -> String {
    let buffer = terminal.backend().buffer();
    let width = usize::from(buffer.area.width).max(1);
    buffer
        .content
        .chunks(width)
        .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

async fn running_dashboard() -> Orchestrator<ScriptedRemote> {
    let remote = ScriptedRemote::with_zones(vec![zone(1, 12.0), zone(2, 28.0)]);
    {
        let mut script = remote.script();
        script.snapshot.birds = vec![bird(200.0, 300.0, BirdState::Resting)];
        script.snapshot.predators = vec![Predator {
            position: Position::new(500.0, 500.0),
        }];
        script.snapshot.collision_count = 3;
    }
    let orchestrator = Orchestrator::new(Arc::new(remote), ClientSettings::default());
    orchestrator.mount().await;
    orchestrator.start().await.expect("start");
    orchestrator
}

#[tokio::test(start_paused = true)]
async fn dashboard_frame_shows_status_map_and_zones() {
    let orchestrator = running_dashboard().await;
    orchestrator.environment().select_zone(2);

    let mut terminal = Terminal::new(TestBackend::new(100, 36)).expect("terminal");
    let view = orchestrator.view();
    terminal
        .draw(|frame| draw_dashboard(frame, &view, &Palette::new(false), false))
        .expect("draw");
    let screen = screen_text(&terminal);

    assert!(screen.contains("RUNNING"));
    assert!(screen.contains("collisions 3"));
    assert!(screen.contains("› #2"), "selected zone is marked");
    assert!(screen.contains("▲"), "predator drawn on the map");
    assert!(screen.contains("Recent Events"));
    assert!(!screen.contains("Controls"));
    orchestrator.shutdown();
}

#[tokio::test(start_paused = true)]
async fn help_overlay_lists_controls() {
    let orchestrator = running_dashboard().await;
    orchestrator.stop().await.expect("stop");

    let mut terminal = Terminal::new(TestBackend::new(100, 36)).expect("terminal");
    let view = orchestrator.view();
    terminal
        .draw(|frame| draw_dashboard(frame, &view, &Palette::new(true), true))
        .expect("draw");
    let screen = screen_text(&terminal);

    assert!(screen.contains("STOPPED"));
    assert!(screen.contains("Controls"));
    assert!(screen.contains("Submit environment"));
}

#[tokio::test(start_paused = true)]
async fn tiny_terminal_does_not_panic() {
    let orchestrator = running_dashboard().await;
    let mut terminal = Terminal::new(TestBackend::new(20, 6)).expect("terminal");
    let view = orchestrator.view();
    terminal
        .draw(|frame| draw_dashboard(frame, &view, &Palette::new(false), true))
        .expect("draw");
    orchestrator.shutdown();
}

#[tokio::test(start_paused = true)]
async fn headless_run_reports_and_writes_json() {
    let orchestrator = running_dashboard().await;
    let dashboard = TerminalDashboard::with_draw_interval(Duration::from_millis(100));

    let report = dashboard
        .run_headless(&orchestrator, 5)
        .await
        .expect("headless run");
    orchestrator.shutdown();

    assert_eq!(report.frames, 5);
    assert!(report.running);
    assert_eq!(report.birds, 1);
    assert_eq!(report.predators, 1);
    assert_eq!(report.collision_count, 3);
    assert!(report.final_revision >= 2, "polls landed while drawing");
    assert!(report.map.iter().any(|line| line.contains('▲')));

    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("reports").join("headless.json");
    report.write_json(&path).expect("write report");
    let json: Value =
        serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("json");
    assert_eq!(json["frames"], 5);
    assert_eq!(json["collisionCount"], 3);
    assert!(json["map"].is_array());
}

#[tokio::test(start_paused = true)]
async fn map_reflects_applied_updates() {
    let orchestrator = running_dashboard().await;
    orchestrator.shutdown();
    orchestrator.sync().apply(SnapshotUpdate {
        predators: Some(Vec::new()),
        ..SnapshotUpdate::default()
    });

    let mut terminal = Terminal::new(TestBackend::new(100, 36)).expect("terminal");
    let view = orchestrator.view();
    terminal
        .draw(|frame| draw_dashboard(frame, &view, &Palette::new(false), false))
        .expect("draw");
    assert!(!screen_text(&terminal).contains("▲"));
}
