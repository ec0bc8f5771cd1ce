//! Global environmental factors and per-zone overrides, edited locally and
//! pushed as one batch on submit.

use std::sync::{Arc, Mutex};

use birdwatch_core::{EditError, EnvironmentFactors, FactorField, Zone};
use tracing::{debug, info, warn};

use crate::lock;
use crate::remote::{RemoteError, RemoteService};
use crate::slot::Reconciled;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvironmentState {
    pub factors: Reconciled<EnvironmentFactors>,
    pub zones: Reconciled<Vec<Zone>>,
    /// Always the id of a zone in `zones.local`, or unset.
    pub selected_zone: Option<i64>,
}

impl EnvironmentState {
    pub fn selected(&self) -> Option<&Zone> {
        let id = self.selected_zone?;
        self.zones.local.iter().find(|zone| zone.id == id)
    }

    fn reselect(&mut self) {
        let still_valid = self
            .selected_zone
            .is_some_and(|id| self.zones.local.iter().any(|zone| zone.id == id));
        if !still_valid {
            self.selected_zone = self.zones.local.first().map(|zone| zone.id);
        }
    }
}

pub struct EnvironmentReconciler<R> {
    remote: Arc<R>,
    state: Mutex<EnvironmentState>,
}

impl<R: RemoteService> EnvironmentReconciler<R> {
    pub fn new(remote: Arc<R>) -> Self {
        Self {
            remote,
            state: Mutex::new(EnvironmentState::default()),
        }
    }

    /// Fetch factors and zones concurrently. Whatever arrives is adopted even
    /// if the other request fails; the first failure is returned.
    pub async fn load(&self) -> Result<(), RemoteError> {
        let (factors, zones) = tokio::join!(
            self.remote.fetch_environment(),
            self.remote.fetch_zones()
        );

        let mut state = lock(&self.state);
        let factors = match factors {
            Ok(factors) => {
                state.factors.adopt(factors);
                Ok(())
            }
            Err(err) => {
                warn!(%err, "failed to load environment factors");
                Err(err)
            }
        };
        let zones = match zones {
            Ok(zones) => {
                info!(zones = zones.len(), "zones loaded");
                state.zones.adopt(zones);
                state.reselect();
                Ok(())
            }
            Err(err) => {
                warn!(%err, "failed to load zones");
                Err(err)
            }
        };
        factors.and(zones)
    }

    /// Local-only edit of a global factor.
    pub fn edit_factor(&self, field: FactorField, value: f64) -> Result<(), EditError> {
        lock(&self.state).factors.local.set(field, value)?;
        debug!(%field, value, "environment factor edited");
        Ok(())
    }

    /// Local-only edit of one zone. Unknown ids are ignored and reported as
    /// `Ok(false)`.
    pub fn edit_zone(&self, id: i64, field: FactorField, value: f64) -> Result<bool, EditError> {
        let value = field.validate(value)?;
        let mut state = lock(&self.state);
        let Some(zone) = state.zones.local.iter_mut().find(|zone| zone.id == id) else {
            return Ok(false);
        };
        zone.set(field, value)?;
        debug!(zone = id, %field, value, "zone edited");
        Ok(true)
    }

    /// Move the selection to `id` if such a zone exists.
    pub fn select_zone(&self, id: i64) -> bool {
        let mut state = lock(&self.state);
        if state.zones.local.iter().any(|zone| zone.id == id) {
            state.selected_zone = Some(id);
            true
        } else {
            false
        }
    }

    /// Advance the selection to the next zone, wrapping around.
    pub fn select_next_zone(&self) -> Option<i64> {
        let mut state = lock(&self.state);
        let zones = &state.zones.local;
        if zones.is_empty() {
            return None;
        }
        let next = match state
            .selected_zone
            .and_then(|id| zones.iter().position(|zone| zone.id == id))
        {
            Some(index) => (index + 1) % zones.len(),
            None => 0,
        };
        let id = zones[next].id;
        state.selected_zone = Some(id);
        Some(id)
    }

    pub fn selected_zone(&self) -> Option<Zone> {
        lock(&self.state).selected().cloned()
    }

    pub fn factors(&self) -> EnvironmentFactors {
        lock(&self.state).factors.local
    }

    pub fn zones(&self) -> Vec<Zone> {
        lock(&self.state).zones.local.clone()
    }

    pub fn state(&self) -> EnvironmentState {
        lock(&self.state).clone()
    }

    /// Push factors, then zones. `on_submitted` runs with the submitted
    /// factors only when both pushes succeed.
    pub async fn submit<F>(&self, on_submitted: F) -> Result<EnvironmentFactors, RemoteError>
    where
        F: FnOnce(&EnvironmentFactors) + Send,
    {
        let (factors, zones) = {
            let state = lock(&self.state);
            (state.factors.local, state.zones.local.clone())
        };

        let outcome = self.remote.push_environment(factors).await;
        lock(&self.state).factors.record_push(factors, &outcome);
        if let Err(err) = outcome {
            warn!(%err, "environment push failed; zones not sent");
            return Err(err);
        }

        let outcome = self.remote.push_zones(zones.clone()).await;
        lock(&self.state).zones.record_push(zones, &outcome);
        if let Err(err) = outcome {
            warn!(%err, "zone push failed");
            return Err(err);
        }

        info!(
            temperature = factors.temperature,
            food_availability = factors.food_availability,
            predator_presence = factors.predator_presence,
            "environment submitted"
        );
        on_submitted(&factors);
        Ok(factors)
    }
}
