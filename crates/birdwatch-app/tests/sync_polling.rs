mod support;

use std::sync::Arc;
use std::time::Duration;

use birdwatch_app::StateSync;
use birdwatch_core::{BirdState, SimulationSnapshot, SnapshotUpdate};
use support::{ScriptedRemote, bird};
use tokio::time::sleep;

const PERIOD: Duration = Duration::from_millis(100);

fn controller() -> (Arc<ScriptedRemote>, StateSync<ScriptedRemote>) {
    let remote = Arc::new(ScriptedRemote::new());
    let sync = StateSync::new(Arc::clone(&remote), PERIOD);
    (remote, sync)
}

#[tokio::test(start_paused = true)]
async fn polls_only_while_running() {
    let (remote, sync) = controller();

    sync.initialize().await.expect("initial fetch");
    assert_eq!(remote.snapshot_fetches(), 1);
    assert!(!sync.is_running());

    sleep(Duration::from_millis(500)).await;
    assert_eq!(remote.snapshot_fetches(), 1, "no polling while stopped");

    assert!(sync.start().await.expect("start"));
    assert_eq!(remote.snapshot_fetches(), 2);

    sleep(Duration::from_millis(350)).await;
    assert_eq!(remote.snapshot_fetches(), 5, "one fetch per period");

    assert!(!sync.stop().await.expect("stop"));
    assert_eq!(remote.snapshot_fetches(), 6);

    sleep(Duration::from_millis(500)).await;
    assert_eq!(remote.snapshot_fetches(), 6, "polling ended with the run");
}

#[tokio::test(start_paused = true)]
async fn restart_spawns_a_single_loop() {
    let (remote, sync) = controller();
    sync.initialize().await.expect("initial fetch");

    sync.start().await.expect("start");
    sync.stop().await.expect("stop");
    sync.start().await.expect("restart");
    let before = remote.snapshot_fetches();

    sleep(Duration::from_millis(350)).await;
    assert_eq!(remote.snapshot_fetches(), before + 3);
    sync.shutdown();
}

#[tokio::test(start_paused = true)]
async fn start_adopts_the_reported_state() {
    let (remote, sync) = controller();
    remote.script().start_is_ignored = true;
    sync.initialize().await.expect("initial fetch");

    let running = sync.start().await.expect("start acknowledged");
    assert!(!running);
    assert!(!sync.is_running());
    assert_eq!(remote.script().starts, 1);

    sleep(Duration::from_millis(300)).await;
    assert_eq!(remote.snapshot_fetches(), 2, "never started polling");
}

#[tokio::test(start_paused = true)]
async fn failed_start_keeps_state_and_records_error() {
    let (remote, sync) = controller();
    sync.initialize().await.expect("initial fetch");
    remote.script().fail_start = true;

    let err = sync.start().await.expect_err("start refused");
    assert_eq!(err.operation(), "start");
    assert!(!sync.is_running());
    assert_eq!(remote.snapshot_fetches(), 1, "no resync after a failed command");
    let view = sync.view();
    assert!(view.last_error.expect("error recorded").contains("500"));
}

#[tokio::test(start_paused = true)]
async fn failed_fetch_leaves_snapshot_unchanged() {
    let (remote, sync) = controller();
    remote.set_time(3.0);
    sync.initialize().await.expect("initial fetch");
    let before = sync.view();

    remote.set_time(4.0);
    remote.script().fail_fetch_snapshot = true;
    assert!(sync.poll_once().await.is_err());

    let after = sync.view();
    assert_eq!(after.snapshot, before.snapshot);
    assert_eq!(after.revision, before.revision);
    assert!(after.last_error.is_some());

    remote.script().fail_fetch_snapshot = false;
    sync.poll_once().await.expect("recovered");
    let recovered = sync.view();
    assert_eq!(recovered.snapshot.time, 4.0);
    assert_eq!(recovered.last_error, None);
}

#[tokio::test(start_paused = true)]
async fn failed_poll_keeps_the_loop_alive() {
    let (remote, sync) = controller();
    sync.initialize().await.expect("initial fetch");
    sync.start().await.expect("start");

    remote.script().fail_fetch_snapshot = true;
    sleep(Duration::from_millis(250)).await;
    assert_eq!(remote.snapshot_fetches(), 4);
    assert!(sync.is_running());

    remote.script().fail_fetch_snapshot = false;
    remote.set_time(12.0);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(sync.sim_time(), 12.0);
    sync.shutdown();
}

#[tokio::test(start_paused = true)]
async fn initialize_failure_keeps_defaults() {
    let (remote, sync) = controller();
    remote.script().fail_fetch_snapshot = true;

    assert!(sync.initialize().await.is_err());
    let view = sync.view();
    assert!(!view.running);
    assert_eq!(view.revision, 0);
    assert_eq!(view.snapshot, SimulationSnapshot::default());
}

#[tokio::test]
async fn later_updates_win_field_by_field() {
    let (_remote, sync) = controller();

    sync.apply(SnapshotUpdate {
        birds: Some(vec![bird(10.0, 10.0, BirdState::Resting)]),
        time: Some(5.0),
        ..SnapshotUpdate::default()
    });
    sync.apply(SnapshotUpdate {
        birds: Some(vec![bird(20.0, 20.0, BirdState::SearchingFood)]),
        ..SnapshotUpdate::default()
    });

    let snapshot = sync.snapshot();
    assert_eq!(snapshot.birds, vec![bird(20.0, 20.0, BirdState::SearchingFood)]);
    assert_eq!(snapshot.time, 5.0, "absent fields keep their value");
}

#[tokio::test]
async fn apply_publishes_revisions() {
    let (_remote, sync) = controller();
    let mut revisions = sync.subscribe();
    assert!(!revisions.has_changed().expect("sender alive"));

    let revision = sync.apply(SnapshotUpdate {
        time: Some(1.0),
        ..SnapshotUpdate::default()
    });
    assert_eq!(revision, 1);
    assert!(revisions.has_changed().expect("sender alive"));
    assert_eq!(*revisions.borrow_and_update(), 1);

    sync.apply(SnapshotUpdate::default());
    assert_eq!(*revisions.borrow_and_update(), 2);
}

#[tokio::test(start_paused = true)]
async fn response_in_flight_at_stop_still_lands() {
    let (remote, sync) = controller();
    sync.initialize().await.expect("initial fetch");
    sync.start().await.expect("start");

    // The next poll starts at 100 ms with this content and answers at 350 ms.
    remote.set_time(7.0);
    remote
        .script()
        .fetch_delays
        .push_back(Duration::from_millis(250));
    sleep(Duration::from_millis(150)).await;
    assert_eq!(remote.snapshot_fetches(), 3);

    remote.set_time(9.0);
    sync.stop().await.expect("stop");
    assert_eq!(sync.sim_time(), 9.0);
    assert_eq!(remote.snapshot_fetches(), 4);

    sleep(Duration::from_millis(300)).await;
    assert_eq!(sync.sim_time(), 7.0, "late response applied on arrival");
    assert!(!sync.is_running());
    assert_eq!(remote.snapshot_fetches(), 4, "no polls after stop");
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_polling_but_keeps_flag() {
    let (remote, sync) = controller();
    sync.initialize().await.expect("initial fetch");
    sync.start().await.expect("start");

    sync.shutdown();
    let fetches = remote.snapshot_fetches();
    sleep(Duration::from_millis(500)).await;
    assert_eq!(remote.snapshot_fetches(), fetches);
    assert!(sync.is_running());
}

#[tokio::test(start_paused = true)]
async fn stop_adopts_the_flag_from_its_own_fetch() {
    let (remote, sync) = controller();
    sync.initialize().await.expect("initial fetch");
    sync.start().await.expect("start");

    // A poll leaves at 100 ms while the run is live and answers at 400 ms.
    remote
        .script()
        .fetch_delays
        .push_back(Duration::from_millis(300));
    sleep(Duration::from_millis(150)).await;

    assert!(!sync.stop().await.expect("stop"), "stop reports its own fetch");
    assert!(!sync.is_running());

    sleep(Duration::from_millis(300)).await;
    assert!(sync.snapshot().is_running, "stale poll merged as data");
    assert!(!sync.is_running(), "polls never move the flag");
}
