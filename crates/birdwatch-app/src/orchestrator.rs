//! Composition root: wires the remote service to the sync controller and
//! both reconcilers, executes operator commands and keeps an event log for
//! the front-ends.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use birdwatch_core::{ConfigField, EnvironmentFactors, SimulationSnapshot};
use birdwatch_render::{RenderError, render_png};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::command::OperatorCommand;
use crate::config::{ConfigReconciler, ConfigState};
use crate::environment::{EnvironmentReconciler, EnvironmentState};
use crate::remote::{RemoteError, RemoteService};
use crate::settings::ClientSettings;
use crate::sync::{StateSync, SyncView};
use crate::{OperatorError, lock};

pub const EVENT_LOG_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Info,
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventEntry {
    /// Simulation time when the event was recorded.
    pub sim_time: f64,
    pub kind: EventKind,
    pub message: String,
}

/// What [`Orchestrator::mount`] managed to load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MountReport {
    pub reachable: bool,
    pub failures: usize,
}

/// Everything a front-end needs to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub backend_url: String,
    pub sync: SyncView,
    pub config: ConfigState,
    pub environment: EnvironmentState,
    pub last_submitted_factors: Option<EnvironmentFactors>,
    /// Oldest first.
    pub events: Vec<EventEntry>,
}

struct OrchestratorInner<R> {
    settings: ClientSettings,
    remote: Arc<R>,
    sync: StateSync<R>,
    config: ConfigReconciler<R>,
    environment: EnvironmentReconciler<R>,
    events: Mutex<VecDeque<EventEntry>>,
    last_submitted: Mutex<Option<EnvironmentFactors>>,
}

pub struct Orchestrator<R> {
    inner: Arc<OrchestratorInner<R>>,
}

impl<R> Clone for Orchestrator<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: RemoteService> Orchestrator<R> {
    pub fn new(remote: Arc<R>, settings: ClientSettings) -> Self {
        let sync = StateSync::new(Arc::clone(&remote), settings.poll_interval);
        let config = ConfigReconciler::new(Arc::clone(&remote));
        let environment = EnvironmentReconciler::new(Arc::clone(&remote));
        Self {
            inner: Arc::new(OrchestratorInner {
                settings,
                remote,
                sync,
                config,
                environment,
                events: Mutex::new(VecDeque::with_capacity(EVENT_LOG_CAPACITY)),
                last_submitted: Mutex::new(None),
            }),
        }
    }

    /// Probe the service, then load the snapshot, run config, time step and
    /// environment concurrently. Failures are logged and recorded; whatever
    /// loaded is kept.
    pub async fn mount(&self) -> MountReport {
        let reachable = match self.inner.remote.ping().await {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "simulation service did not answer ping");
                false
            }
        };

        let (snapshot, config, time_step, environment) = tokio::join!(
            self.inner.sync.initialize(),
            self.inner.config.load(),
            self.inner.config.load_time_step(),
            self.inner.environment.load(),
        );

        let failures: Vec<RemoteError> = [snapshot, config, time_step, environment]
            .into_iter()
            .filter_map(Result::err)
            .collect();
        for err in &failures {
            self.record(EventKind::Failure, err.to_string());
        }
        if failures.is_empty() {
            self.record(EventKind::Success, "Connected to simulation service");
        }

        let report = MountReport {
            reachable,
            failures: failures.len(),
        };
        info!(
            backend = %self.inner.settings.backend_url,
            reachable,
            failures = report.failures,
            running = self.inner.sync.is_running(),
            "dashboard mounted"
        );
        report
    }

    pub async fn start(&self) -> Result<bool, OperatorError> {
        self.execute_running(OperatorCommand::Start).await
    }

    pub async fn stop(&self) -> Result<bool, OperatorError> {
        self.execute_running(OperatorCommand::Stop).await
    }

    pub async fn resync(&self) -> Result<bool, OperatorError> {
        self.execute_running(OperatorCommand::Resync).await
    }

    async fn execute_running(&self, command: OperatorCommand) -> Result<bool, OperatorError> {
        self.execute(command).await?;
        Ok(self.inner.sync.is_running())
    }

    pub async fn save_run(&self) -> Result<(), OperatorError> {
        self.execute(OperatorCommand::SaveRun).await
    }

    /// Apply a saved run: its state goes through the normal merge path and
    /// its settings replace the local config. Loading stops the run on the
    /// service, so the running flag is re-read afterwards.
    pub async fn load_run(&self) -> Result<(), OperatorError> {
        self.execute(OperatorCommand::LoadRun).await
    }

    /// Run one operator command and record its outcome in the event log.
    pub async fn execute(&self, command: OperatorCommand) -> Result<(), OperatorError> {
        let result = self.dispatch(&command).await;
        match &result {
            Ok(message) => self.record(EventKind::Success, message.clone()),
            Err(err) => self.record(EventKind::Failure, format!("{}: {err}", label(&command))),
        }
        result.map(drop)
    }

    async fn dispatch(&self, command: &OperatorCommand) -> Result<String, OperatorError> {
        let inner = &self.inner;
        match *command {
            OperatorCommand::Start => {
                let running = inner.sync.start().await?;
                Ok(running_message("Start", running))
            }
            OperatorCommand::Stop => {
                let running = inner.sync.stop().await?;
                Ok(running_message("Stop", running))
            }
            OperatorCommand::Resync => {
                let running = inner.sync.resync().await?;
                Ok(running_message("Resync", running))
            }
            OperatorCommand::SaveRun => {
                if let Err(err) = inner.remote.save_run().await {
                    warn!(%err, "save run failed");
                    return Err(err.into());
                }
                Ok("Run saved".to_owned())
            }
            OperatorCommand::LoadRun => {
                let saved = match inner.remote.load_run().await {
                    Ok(saved) => saved,
                    Err(err) => {
                        warn!(%err, "load run failed");
                        return Err(err.into());
                    }
                };
                let revision = inner.sync.apply(saved.state);
                inner.config.adopt_saved(saved.config, saved.time_step);
                info!(revision, "saved run applied");
                let running = inner.sync.resync().await?;
                Ok(running_message("Saved run loaded", running))
            }
            OperatorCommand::SetConfig { field, value } => {
                inner.config.set_field(field, value).await?;
                Ok(format!("{field} set to {value}"))
            }
            OperatorCommand::AdjustConfig { field, delta } => {
                let current = i64::from(inner.config.config().get(field));
                let value = (current + delta).max(config_floor(field));
                inner.config.set_field(field, value).await?;
                Ok(format!("{field} set to {value}"))
            }
            OperatorCommand::SetTimeStep(value) => {
                inner.config.set_time_step(value).await?;
                Ok(format!("Time step set to {value}"))
            }
            OperatorCommand::AdjustTimeStep(delta) => {
                let current = i64::from(inner.config.time_step().time_step);
                let value = (current + delta).max(1);
                inner.config.set_time_step(value).await?;
                Ok(format!("Time step set to {value}"))
            }
            OperatorCommand::EditFactor { field, value } => {
                inner.environment.edit_factor(field, value)?;
                Ok(format!("{field} set to {value} (not yet submitted)"))
            }
            OperatorCommand::EditZone { id, field, value } => {
                if inner.environment.edit_zone(id, field, value)? {
                    Ok(format!("Zone {id} {field} set to {value} (not yet submitted)"))
                } else {
                    Ok(format!("Zone {id} does not exist; nothing changed"))
                }
            }
            OperatorCommand::AdjustSelectedZone { field, delta } => {
                let zone = inner
                    .environment
                    .selected_zone()
                    .ok_or(OperatorError::NoZoneSelected)?;
                let value = field.clamp(zone.get(field) + delta);
                inner.environment.edit_zone(zone.id, field, value)?;
                Ok(format!("Zone {} {field} set to {value:.2}", zone.id))
            }
            OperatorCommand::SelectZone(id) => {
                if inner.environment.select_zone(id) {
                    Ok(format!("Zone {id} selected"))
                } else {
                    Ok(format!("Zone {id} does not exist; selection kept"))
                }
            }
            OperatorCommand::SelectNextZone => match inner.environment.select_next_zone() {
                Some(id) => Ok(format!("Zone {id} selected")),
                None => Err(OperatorError::NoZoneSelected),
            },
            OperatorCommand::SubmitEnvironment => {
                let submitted = Arc::clone(&self.inner);
                inner
                    .environment
                    .submit(move |factors: &EnvironmentFactors| {
                        *lock(&submitted.last_submitted) = Some(*factors);
                    })
                    .await?;
                Ok("Environment submitted".to_owned())
            }
        }
    }

    pub fn view(&self) -> DashboardView {
        DashboardView {
            backend_url: self.inner.settings.backend_url.clone(),
            sync: self.inner.sync.view(),
            config: self.inner.config.state(),
            environment: self.inner.environment.state(),
            last_submitted_factors: self.last_submitted_factors(),
            events: lock(&self.inner.events).iter().cloned().collect(),
        }
    }

    pub fn snapshot(&self) -> SimulationSnapshot {
        self.inner.sync.snapshot()
    }

    /// Encode the current snapshot as a PNG at the configured surface size.
    pub fn render_png(&self) -> Result<Vec<u8>, RenderError> {
        let (width, height) = self.inner.settings.surface;
        render_png(&self.snapshot(), width, height)
    }

    /// Snapshot revision counter; changes whenever a re-render is due.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.sync.subscribe()
    }

    /// Factors handed to the last successful environment submit.
    pub fn last_submitted_factors(&self) -> Option<EnvironmentFactors> {
        *lock(&self.inner.last_submitted)
    }

    pub fn sync(&self) -> &StateSync<R> {
        &self.inner.sync
    }

    pub fn config(&self) -> &ConfigReconciler<R> {
        &self.inner.config
    }

    pub fn environment(&self) -> &EnvironmentReconciler<R> {
        &self.inner.environment
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.inner.settings
    }

    pub fn shutdown(&self) {
        self.inner.sync.shutdown();
    }

    fn record(&self, kind: EventKind, message: impl Into<String>) {
        let sim_time = self.inner.sync.sim_time();
        let mut events = lock(&self.inner.events);
        if events.len() == EVENT_LOG_CAPACITY {
            events.pop_front();
        }
        events.push_back(EventEntry {
            sim_time,
            kind,
            message: message.into(),
        });
    }
}

fn running_message(action: &str, running: bool) -> String {
    if running {
        format!("{action}: simulation running")
    } else {
        format!("{action}: simulation stopped")
    }
}

fn config_floor(field: ConfigField) -> i64 {
    match field {
        ConfigField::InitialBirds => 0,
        ConfigField::SimulationSpeed | ConfigField::WorldSize => 1,
    }
}

fn label(command: &OperatorCommand) -> &'static str {
    match command {
        OperatorCommand::Start => "Start",
        OperatorCommand::Stop => "Stop",
        OperatorCommand::Resync => "Resync",
        OperatorCommand::SaveRun => "Save",
        OperatorCommand::LoadRun => "Load",
        OperatorCommand::SetConfig { .. } | OperatorCommand::AdjustConfig { .. } => "Config",
        OperatorCommand::SetTimeStep(_) | OperatorCommand::AdjustTimeStep(_) => "Time step",
        OperatorCommand::EditFactor { .. } => "Environment",
        OperatorCommand::EditZone { .. } | OperatorCommand::AdjustSelectedZone { .. } => "Zone",
        OperatorCommand::SelectZone(_) | OperatorCommand::SelectNextZone => "Zone selection",
        OperatorCommand::SubmitEnvironment => "Submit",
    }
}
