#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use birdwatch_app::{RemoteError, RemoteService};
use birdwatch_core::{
    Bird, BirdState, EnvironmentFactors, Position, RunConfig, SavedRun, SimulationSnapshot,
    SnapshotUpdate, TimeStep, Zone,
};

/// In-memory stand-in for the simulation service. Every call is counted and
/// every push is recorded; individual operations can be told to fail.
#[derive(Default)]
pub struct ScriptedRemote {
    state: Mutex<Scripted>,
}

#[derive(Default)]
pub struct Scripted {
    pub snapshot: SimulationSnapshot,
    pub config: RunConfig,
    pub time_step: TimeStep,
    pub factors: EnvironmentFactors,
    pub zones: Vec<Zone>,
    pub saved: SavedRun,

    /// Consumed one per snapshot fetch, before any other fetch behaviour.
    pub fetch_delays: VecDeque<Duration>,
    /// How long a config push takes to be answered.
    pub push_config_delay: Option<Duration>,
    /// When set, `start` is acknowledged but the run stays stopped.
    pub start_is_ignored: bool,
    pub fail_fetch_snapshot: bool,
    pub fail_start: bool,
    pub fail_fetch_config: bool,
    pub fail_push_config: bool,
    pub fail_push_time_step: bool,
    pub fail_fetch_environment: bool,
    pub fail_fetch_zones: bool,
    pub fail_push_environment: bool,
    pub fail_push_zones: bool,
    pub fail_load: bool,
    pub fail_ping: bool,

    pub snapshot_fetches: usize,
    pub starts: usize,
    pub stops: usize,
    pub saves: usize,
    pub pushed_configs: Vec<RunConfig>,
    pub pushed_time_steps: Vec<TimeStep>,
    pub pushed_factors: Vec<EnvironmentFactors>,
    pub pushed_zones: Vec<Vec<Zone>>,
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_zones(zones: Vec<Zone>) -> Self {
        let remote = Self::default();
        remote.script().zones = zones;
        remote
    }

    /// Mutable access to the script, for setting up and inspecting a test.
    pub fn script(&self) -> MutexGuard<'_, Scripted> {
        self.state.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    pub fn snapshot_fetches(&self) -> usize {
        self.script().snapshot_fetches
    }

    pub fn set_time(&self, time: f64) {
        self.script().snapshot.time = time;
    }
}

pub fn zone(id: i64, temperature: f64) -> Zone {
    Zone {
        id,
        temperature,
        food_availability: 1.0,
        predator_presence: 0.1,
        position: None,
    }
}

pub fn bird(x: f64, y: f64, state: BirdState) -> Bird {
    Bird {
        position: Position::new(x, y),
        state,
    }
}

fn failure(operation: &'static str) -> RemoteError {
    RemoteError::Transport {
        operation,
        message: "scripted failure".to_owned(),
    }
}

fn refused(operation: &'static str) -> RemoteError {
    RemoteError::Status {
        operation,
        status: 500,
        body: "{\"error\":\"scripted\"}".to_owned(),
    }
}

impl RemoteService for ScriptedRemote {
    async fn fetch_snapshot(&self) -> Result<SnapshotUpdate, RemoteError> {
        // The response is fixed when the request starts, like a real server.
        let (delay, response) = {
            let mut script = self.script();
            script.snapshot_fetches += 1;
            let delay = script.fetch_delays.pop_front();
            let response = if script.fail_fetch_snapshot {
                Err(failure("fetch_snapshot"))
            } else {
                Ok(SnapshotUpdate::full(script.snapshot.clone()))
            };
            (delay, response)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        response
    }

    async fn start(&self) -> Result<(), RemoteError> {
        let mut script = self.script();
        if script.fail_start {
            return Err(refused("start"));
        }
        script.starts += 1;
        if !script.start_is_ignored {
            script.snapshot.is_running = true;
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), RemoteError> {
        let mut script = self.script();
        script.stops += 1;
        script.snapshot.is_running = false;
        Ok(())
    }

    async fn fetch_config(&self) -> Result<RunConfig, RemoteError> {
        let script = self.script();
        if script.fail_fetch_config {
            return Err(failure("fetch_config"));
        }
        Ok(script.config.clone())
    }

    async fn push_config(&self, config: RunConfig) -> Result<(), RemoteError> {
        let delay = {
            let mut script = self.script();
            script.pushed_configs.push(config.clone());
            script.push_config_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut script = self.script();
        if script.fail_push_config {
            return Err(refused("push_config"));
        }
        script.config = config;
        Ok(())
    }

    async fn fetch_time_step(&self) -> Result<TimeStep, RemoteError> {
        Ok(self.script().time_step)
    }

    async fn push_time_step(&self, step: TimeStep) -> Result<(), RemoteError> {
        let mut script = self.script();
        script.pushed_time_steps.push(step);
        if script.fail_push_time_step {
            return Err(refused("push_time_step"));
        }
        script.time_step = step;
        Ok(())
    }

    async fn save_run(&self) -> Result<(), RemoteError> {
        self.script().saves += 1;
        Ok(())
    }

    /// Loading replaces the live state and halts the run.
    async fn load_run(&self) -> Result<SavedRun, RemoteError> {
        let mut script = self.script();
        if script.fail_load {
            return Err(refused("load_run"));
        }
        let saved = script.saved.clone();
        let _ = script.snapshot.merge(saved.state.clone());
        script.snapshot.is_running = false;
        Ok(saved)
    }

    async fn fetch_environment(&self) -> Result<EnvironmentFactors, RemoteError> {
        let script = self.script();
        if script.fail_fetch_environment {
            return Err(failure("fetch_environment"));
        }
        Ok(script.factors)
    }

    async fn push_environment(&self, factors: EnvironmentFactors) -> Result<(), RemoteError> {
        let mut script = self.script();
        script.pushed_factors.push(factors);
        if script.fail_push_environment {
            return Err(refused("push_environment"));
        }
        script.factors = factors;
        Ok(())
    }

    async fn fetch_zones(&self) -> Result<Vec<Zone>, RemoteError> {
        let script = self.script();
        if script.fail_fetch_zones {
            return Err(failure("fetch_zones"));
        }
        Ok(script.zones.clone())
    }

    async fn push_zones(&self, zones: Vec<Zone>) -> Result<(), RemoteError> {
        let mut script = self.script();
        script.pushed_zones.push(zones.clone());
        if script.fail_push_zones {
            return Err(refused("push_zones"));
        }
        script.zones = zones;
        Ok(())
    }

    async fn ping(&self) -> Result<(), RemoteError> {
        if self.script().fail_ping {
            return Err(failure("ping"));
        }
        Ok(())
    }
}
