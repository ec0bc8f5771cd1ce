//! Canonical snapshot ownership and the recurring poll.
//!
//! The running flag lives on a `watch` channel. Raising it spawns a poll task
//! that fetches once per period; lowering it ends that task at its next
//! wake-up. A fetch already in flight when the flag drops still lands.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use birdwatch_core::{SimulationSnapshot, SnapshotUpdate};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::lock;
use crate::remote::{RemoteError, RemoteService};

/// Point-in-time copy of everything the sync controller owns.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncView {
    pub snapshot: SimulationSnapshot,
    pub running: bool,
    /// Bumped once per applied snapshot.
    pub revision: u64,
    pub last_error: Option<String>,
}

#[derive(Default)]
struct SyncState {
    snapshot: SimulationSnapshot,
    revision: u64,
    last_error: Option<String>,
}

struct SyncInner<R> {
    remote: Arc<R>,
    period: Duration,
    state: Mutex<SyncState>,
    running: watch::Sender<bool>,
    revision: watch::Sender<u64>,
    poll_epoch: AtomicU64,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl<R> Drop for SyncInner<R> {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.poll_task).take() {
            handle.abort();
        }
    }
}

/// Owns the simulation snapshot and the running/stopped flag.
///
/// Cloning yields another handle onto the same state.
pub struct StateSync<R> {
    inner: Arc<SyncInner<R>>,
}

impl<R> Clone for StateSync<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: RemoteService> StateSync<R> {
    pub fn new(remote: Arc<R>, period: Duration) -> Self {
        let (running, _) = watch::channel(false);
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(SyncInner {
                remote,
                period,
                state: Mutex::new(SyncState::default()),
                running,
                revision,
                poll_epoch: AtomicU64::new(0),
                poll_task: Mutex::new(None),
            }),
        }
    }

    /// Fetch the first snapshot and take the running flag from it. On failure
    /// the default snapshot stays and the controller remains stopped.
    pub async fn initialize(&self) -> Result<(), RemoteError> {
        let running = self.resync().await?;
        info!(running, "initial snapshot loaded");
        Ok(())
    }

    /// Fetch one snapshot and merge it. The running flag is left alone.
    pub async fn poll_once(&self) -> Result<(), RemoteError> {
        let update = self.fetch().await?;
        self.apply(update);
        Ok(())
    }

    /// Send the start command, then adopt the running flag the service
    /// reports afterwards.
    pub async fn start(&self) -> Result<bool, RemoteError> {
        if let Err(err) = self.inner.remote.start().await {
            self.record_failure(&err);
            return Err(err);
        }
        self.resync().await
    }

    pub async fn stop(&self) -> Result<bool, RemoteError> {
        if let Err(err) = self.inner.remote.stop().await {
            self.record_failure(&err);
            return Err(err);
        }
        self.resync().await
    }

    /// Fetch one snapshot, merge it and adopt its running flag.
    pub async fn resync(&self) -> Result<bool, RemoteError> {
        let update = self.fetch().await?;
        let (_, running) = self.merge(update);
        self.set_running(running);
        Ok(running)
    }

    /// Merge `update` into the canonical snapshot and publish the new
    /// revision.
    pub fn apply(&self, update: SnapshotUpdate) -> u64 {
        self.merge(update).0
    }

    /// Returns the new revision and the `isRunning` value of the snapshot this
    /// merge produced, read under the same lock.
    fn merge(&self, update: SnapshotUpdate) -> (u64, bool) {
        let (revision, running, report) = {
            let mut state = lock(&self.inner.state);
            let report = state.snapshot.merge(update);
            state.revision += 1;
            (state.revision, state.snapshot.is_running, report)
        };
        if let Some(world_size) = report.rejected_world_size {
            warn!(world_size, "keeping previous world size; service sent an unusable one");
        }
        trace!(revision, fields = report.fields_applied, "snapshot applied");
        self.inner.revision.send_replace(revision);
        (revision, running)
    }

    pub fn view(&self) -> SyncView {
        let state = lock(&self.inner.state);
        SyncView {
            snapshot: state.snapshot.clone(),
            running: *self.inner.running.borrow(),
            revision: state.revision,
            last_error: state.last_error.clone(),
        }
    }

    pub fn snapshot(&self) -> SimulationSnapshot {
        lock(&self.inner.state).snapshot.clone()
    }

    pub fn sim_time(&self) -> f64 {
        lock(&self.inner.state).snapshot.time
    }

    pub fn is_running(&self) -> bool {
        *self.inner.running.borrow()
    }

    /// Revision counter, updated after every applied snapshot.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// Stop polling without touching the running flag.
    pub fn shutdown(&self) {
        self.inner.poll_epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = lock(&self.inner.poll_task).take() {
            handle.abort();
        }
    }

    async fn fetch(&self) -> Result<SnapshotUpdate, RemoteError> {
        match self.inner.remote.fetch_snapshot().await {
            Ok(update) => {
                lock(&self.inner.state).last_error = None;
                Ok(update)
            }
            Err(err) => {
                self.record_failure(&err);
                Err(err)
            }
        }
    }

    fn record_failure(&self, err: &RemoteError) {
        warn!(
            operation = err.operation(),
            kind = err.kind(),
            %err,
            "remote call failed; keeping current state"
        );
        lock(&self.inner.state).last_error = Some(err.to_string());
    }

    fn set_running(&self, running: bool) {
        let was_running = self.inner.running.send_replace(running);
        match (was_running, running) {
            (false, true) => self.spawn_poll_loop(),
            (true, false) => debug!("simulation stopped; poll loop winding down"),
            _ => {}
        }
    }

    fn spawn_poll_loop(&self) {
        let epoch = self.inner.poll_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let task = poll_loop(
            Arc::downgrade(&self.inner),
            epoch,
            self.inner.running.subscribe(),
            self.inner.period,
        );
        let handle = tokio::spawn(task);
        debug!(epoch, period_ms = self.inner.period.as_millis() as u64, "poll loop started");
        // A previous loop sees the epoch change and exits on its own, so its
        // in-flight fetch is not cancelled.
        drop(lock(&self.inner.poll_task).replace(handle));
    }
}

async fn poll_loop<R: RemoteService>(
    inner: Weak<SyncInner<R>>,
    epoch: u64,
    mut running: watch::Receiver<bool>,
    period: Duration,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = running.changed() => {
                if changed.is_err() || !*running.borrow_and_update() {
                    break;
                }
                continue;
            }
        }

        let Some(inner) = inner.upgrade() else {
            break;
        };
        if !*running.borrow() || inner.poll_epoch.load(Ordering::SeqCst) != epoch {
            break;
        }
        let sync = StateSync { inner };
        // Failures are logged by the controller and leave state untouched.
        let _ = sync.poll_once().await;
    }

    trace!(epoch, "poll loop exited");
}
