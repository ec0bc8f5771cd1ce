//! Run configuration as exchanged with `/simulation/config` and
//! `/simulation/time-step`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::EditError;

/// Editable run configuration. The time step travels on its own endpoint and
/// lives in [`TimeStep`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    /// Milliseconds between simulation steps on the remote side.
    pub simulation_speed: u32,
    pub world_size: u32,
    pub initial_birds: u32,
    /// Reported by the service; carried through pushes untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obstacle_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_count: Option<u32>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            simulation_speed: 100,
            world_size: 1000,
            initial_birds: 50,
            obstacle_count: None,
            resource_count: None,
        }
    }
}

impl RunConfig {
    pub fn get(&self, field: ConfigField) -> u32 {
        match field {
            ConfigField::SimulationSpeed => self.simulation_speed,
            ConfigField::WorldSize => self.world_size,
            ConfigField::InitialBirds => self.initial_birds,
        }
    }

    /// Copy of `self` with `field` set to `value`, or an error if `value`
    /// breaks the field's bounds.
    pub fn with_field(&self, field: ConfigField, value: i64) -> Result<Self, EditError> {
        let value = field.validate(value)?;
        let mut next = self.clone();
        match field {
            ConfigField::SimulationSpeed => next.simulation_speed = value,
            ConfigField::WorldSize => next.world_size = value,
            ConfigField::InitialBirds => next.initial_birds = value,
        }
        Ok(next)
    }
}

/// Editable fields of [`RunConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigField {
    SimulationSpeed,
    WorldSize,
    InitialBirds,
}

impl ConfigField {
    pub const ALL: [ConfigField; 3] = [
        ConfigField::SimulationSpeed,
        ConfigField::WorldSize,
        ConfigField::InitialBirds,
    ];

    pub const fn wire_name(self) -> &'static str {
        match self {
            ConfigField::SimulationSpeed => "simulationSpeed",
            ConfigField::WorldSize => "worldSize",
            ConfigField::InitialBirds => "initialBirds",
        }
    }

    pub fn validate(self, value: i64) -> Result<u32, EditError> {
        let minimum = match self {
            ConfigField::SimulationSpeed | ConfigField::WorldSize => 1,
            ConfigField::InitialBirds => 0,
        };
        if value < minimum || value > i64::from(u32::MAX) {
            return Err(EditError::OutOfRange {
                field: self.wire_name(),
                expected: if minimum == 0 { "zero or more" } else { "positive" },
                value: value as f64,
            });
        }
        Ok(value as u32)
    }
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for ConfigField {
    type Err = EditError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "simulationSpeed" | "simulation_speed" | "speed" => Ok(ConfigField::SimulationSpeed),
            "worldSize" | "world_size" => Ok(ConfigField::WorldSize),
            "initialBirds" | "initial_birds" | "birds" => Ok(ConfigField::InitialBirds),
            other => Err(EditError::UnknownField(other.to_owned())),
        }
    }
}

/// Body of the time-step endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeStep {
    pub time_step: u32,
}

impl Default for TimeStep {
    fn default() -> Self {
        Self { time_step: 1 }
    }
}

impl TimeStep {
    pub fn new(value: i64) -> Result<Self, EditError> {
        if value < 1 || value > i64::from(u32::MAX) {
            return Err(EditError::OutOfRange {
                field: "timeStep",
                expected: "positive",
                value: value as f64,
            });
        }
        Ok(Self {
            time_step: value as u32,
        })
    }
}
