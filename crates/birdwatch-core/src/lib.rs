//! Core types shared across the Birdwatch workspace.
//!
//! Everything here mirrors the JSON the remote simulation service speaks
//! (lower camel case, positions as `[x, y]` pairs) plus the local rules for
//! merging partial snapshots and validating operator edits.

use serde::{Deserialize, Deserializer, Serialize};

pub mod config;
pub mod environment;

pub use config::{ConfigField, RunConfig, TimeStep};
pub use environment::{EnvironmentFactors, FactorField, Zone};

/// World size assumed until the remote service reports one.
pub const DEFAULT_WORLD_SIZE: f64 = 1000.0;

/// Errors raised when an operator edit cannot be stored locally.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditError {
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("{field} expects a number, got {raw:?}")]
    NotNumeric { field: &'static str, raw: String },
    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        expected: &'static str,
        value: f64,
    },
}

/// World-space coordinate. Serialized as a two element array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Position {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Position> for [f64; 2] {
    fn from(position: Position) -> Self {
        [position.x, position.y]
    }
}

/// Behavioural state of a bird. Only affects styling on this side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BirdState {
    Resting,
    SearchingFood,
    /// Also absorbs any state string the client does not know about.
    #[default]
    #[serde(other)]
    Migrating,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bird {
    #[serde(default)]
    pub position: Position,
    #[serde(default, deserialize_with = "default_on_null")]
    pub state: BirdState,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Predator {
    #[serde(default)]
    pub position: Position,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub radius: f64,
}

/// What a resource replenishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    Food,
    #[default]
    #[serde(other)]
    Rest,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default)]
    pub position: Position,
    #[serde(rename = "type", default, deserialize_with = "default_on_null")]
    pub kind: ResourceKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TemperatureZone {
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub temperature: f64,
}

/// Canonical simulation state as last reported by the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulationSnapshot {
    #[serde(deserialize_with = "default_on_null")]
    pub birds: Vec<Bird>,
    #[serde(deserialize_with = "default_on_null")]
    pub predators: Vec<Predator>,
    #[serde(deserialize_with = "default_on_null")]
    pub obstacles: Vec<Obstacle>,
    #[serde(deserialize_with = "default_on_null")]
    pub resources: Vec<Resource>,
    #[serde(deserialize_with = "default_on_null")]
    pub temperature_zones: Vec<TemperatureZone>,
    pub time: f64,
    pub is_running: bool,
    pub world_size: f64,
    pub collision_count: u64,
}

impl Default for SimulationSnapshot {
    fn default() -> Self {
        Self {
            birds: Vec::new(),
            predators: Vec::new(),
            obstacles: Vec::new(),
            resources: Vec::new(),
            temperature_zones: Vec::new(),
            time: 0.0,
            is_running: false,
            world_size: DEFAULT_WORLD_SIZE,
            collision_count: 0,
        }
    }
}

/// A snapshot response as received. Every top-level field is optional so a
/// response that omits one can be told apart from one that reports a zero.
///
/// Entity arrays sent as `null` decode as present-and-empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotUpdate {
    #[serde(default, deserialize_with = "present_or_null")]
    pub birds: Option<Vec<Bird>>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub predators: Option<Vec<Predator>>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub obstacles: Option<Vec<Obstacle>>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub resources: Option<Vec<Resource>>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub temperature_zones: Option<Vec<TemperatureZone>>,
    #[serde(default)]
    pub time: Option<f64>,
    #[serde(default)]
    pub is_running: Option<bool>,
    #[serde(default)]
    pub world_size: Option<f64>,
    #[serde(default)]
    pub collision_count: Option<u64>,
}

impl SnapshotUpdate {
    /// Update carrying every field of `snapshot`.
    pub fn full(snapshot: SimulationSnapshot) -> Self {
        Self {
            birds: Some(snapshot.birds),
            predators: Some(snapshot.predators),
            obstacles: Some(snapshot.obstacles),
            resources: Some(snapshot.resources),
            temperature_zones: Some(snapshot.temperature_zones),
            time: Some(snapshot.time),
            is_running: Some(snapshot.is_running),
            world_size: Some(snapshot.world_size),
            collision_count: Some(snapshot.collision_count),
        }
    }
}

/// Body of `/simulation/load`: the saved state plus the run settings it was
/// saved with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRun {
    #[serde(default)]
    pub state: SnapshotUpdate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<RunConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_step: Option<u32>,
}

/// Result of folding a [`SnapshotUpdate`] into a [`SimulationSnapshot`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MergeReport {
    pub fields_applied: u8,
    pub rejected_world_size: Option<f64>,
}

impl SimulationSnapshot {
    /// Shallow top-level merge: present fields overwrite, absent fields keep
    /// their prior value, arrays are replaced wholesale.
    ///
    /// A world size that is not a positive finite number is rejected and the
    /// previous one kept.
    pub fn merge(&mut self, update: SnapshotUpdate) -> MergeReport {
        let mut report = MergeReport::default();
        let applied = [
            replace(&mut self.birds, update.birds),
            replace(&mut self.predators, update.predators),
            replace(&mut self.obstacles, update.obstacles),
            replace(&mut self.resources, update.resources),
            replace(&mut self.temperature_zones, update.temperature_zones),
            replace(&mut self.time, update.time),
            replace(&mut self.is_running, update.is_running),
            replace(&mut self.collision_count, update.collision_count),
        ];
        report.fields_applied = applied.iter().filter(|applied| **applied).count() as u8;

        match update.world_size {
            Some(size) if size.is_finite() && size > 0.0 => {
                self.world_size = size;
                report.fields_applied += 1;
            }
            Some(size) => report.rejected_world_size = Some(size),
            None => {}
        }

        report
    }

    /// Total number of entities across every kind.
    pub fn entity_count(&self) -> usize {
        self.birds.len()
            + self.predators.len()
            + self.obstacles.len()
            + self.resources.len()
            + self.temperature_zones.len()
    }

    /// Bird counts ordered as (migrating, resting, searching food).
    pub fn bird_states(&self) -> (usize, usize, usize) {
        self.birds
            .iter()
            .fold((0, 0, 0), |(migrating, resting, searching), bird| {
                match bird.state {
                    BirdState::Migrating => (migrating + 1, resting, searching),
                    BirdState::Resting => (migrating, resting + 1, searching),
                    BirdState::SearchingFood => (migrating, resting, searching + 1),
                }
            })
    }
}

fn replace<T>(slot: &mut T, incoming: Option<T>) -> bool {
    match incoming {
        Some(value) => {
            *slot = value;
            true
        }
        None => false,
    }
}

fn default_on_null<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(
        Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default(),
    ))
}

/// Parse operator input as a finite float.
pub fn parse_number(field: &'static str, raw: &str) -> Result<f64, EditError> {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(EditError::NotNumeric {
            field,
            raw: raw.to_owned(),
        }),
    }
}

/// Parse operator input as a whole number.
pub fn parse_integer(field: &'static str, raw: &str) -> Result<i64, EditError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| EditError::NotNumeric {
            field,
            raw: raw.to_owned(),
        })
}
