//! Run configuration and time step: read once at mount, then locally
//! authoritative with optimistic pushes.

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use birdwatch_core::{ConfigField, RunConfig, TimeStep, parse_integer};
use tracing::{debug, info, warn};

use crate::remote::{RemoteError, RemoteService};
use crate::slot::Reconciled;
use crate::{OperatorError, lock};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigState {
    pub config: Reconciled<RunConfig>,
    pub time_step: Reconciled<TimeStep>,
}

pub struct ConfigReconciler<R> {
    remote: Arc<R>,
    state: Mutex<ConfigState>,
}

impl<R: RemoteService> ConfigReconciler<R> {
    pub fn new(remote: Arc<R>) -> Self {
        Self {
            remote,
            state: Mutex::new(ConfigState::default()),
        }
    }

    pub async fn load(&self) -> Result<(), RemoteError> {
        match self.remote.fetch_config().await {
            Ok(config) => {
                info!(
                    simulation_speed = config.simulation_speed,
                    world_size = config.world_size,
                    initial_birds = config.initial_birds,
                    "run config loaded"
                );
                lock(&self.state).config.adopt(config);
                Ok(())
            }
            Err(err) => {
                warn!(%err, "failed to load run config; keeping defaults");
                Err(err)
            }
        }
    }

    /// Store `value` locally, then push the whole updated config.
    ///
    /// An [`OperatorError::Edit`] means nothing was stored. An
    /// [`OperatorError::Remote`] means the local value was kept but the
    /// service did not confirm it.
    pub async fn set_field(&self, field: ConfigField, value: i64) -> Result<(), OperatorError> {
        let pushed = {
            let mut state = lock(&self.state);
            let next = state.config.local.with_field(field, value)?;
            state.config.local = next.clone();
            next
        };
        debug!(%field, value, "run config edited");

        let outcome = self.remote.push_config(pushed.clone()).await;
        if let Err(err) = &outcome {
            warn!(%field, %err, "config push failed; local edit kept");
        }
        lock(&self.state).config.record_push(pushed, &outcome);
        outcome.map_err(OperatorError::from)
    }

    /// [`Self::set_field`] for raw operator input.
    pub async fn set_field_from_input(&self, name: &str, raw: &str) -> Result<(), OperatorError> {
        let field = ConfigField::from_str(name)?;
        let value = parse_integer(field.wire_name(), raw)?;
        self.set_field(field, value).await
    }

    pub async fn load_time_step(&self) -> Result<(), RemoteError> {
        match self.remote.fetch_time_step().await {
            Ok(step) => {
                info!(time_step = step.time_step, "time step loaded");
                lock(&self.state).time_step.adopt(step);
                Ok(())
            }
            Err(err) => {
                warn!(%err, "failed to load time step; keeping default");
                Err(err)
            }
        }
    }

    pub async fn set_time_step(&self, value: i64) -> Result<(), OperatorError> {
        let step = TimeStep::new(value)?;
        lock(&self.state).time_step.local = step;
        debug!(time_step = step.time_step, "time step edited");

        let outcome = self.remote.push_time_step(step).await;
        if let Err(err) = &outcome {
            warn!(%err, "time step push failed; local edit kept");
        }
        lock(&self.state).time_step.record_push(step, &outcome);
        outcome.map_err(OperatorError::from)
    }

    /// Replace both slots with settings restored from a saved run. Nothing is
    /// pushed.
    pub fn adopt_saved(&self, config: Option<RunConfig>, time_step: Option<u32>) {
        let mut state = lock(&self.state);
        if let Some(config) = config {
            state.config.adopt(config);
        }
        if let Some(time_step) = time_step.filter(|step| *step > 0) {
            state.time_step.adopt(TimeStep { time_step });
        }
    }

    pub fn config(&self) -> RunConfig {
        lock(&self.state).config.local.clone()
    }

    pub fn time_step(&self) -> TimeStep {
        lock(&self.state).time_step.local
    }

    pub fn state(&self) -> ConfigState {
        lock(&self.state).clone()
    }
}
