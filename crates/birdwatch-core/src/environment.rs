//! Global environmental factors and per-zone overrides.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{EditError, Position};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentFactors {
    pub temperature: f64,
    pub food_availability: f64,
    pub predator_presence: f64,
}

impl Default for EnvironmentFactors {
    fn default() -> Self {
        Self {
            temperature: 20.0,
            food_availability: 1.0,
            predator_presence: 0.1,
        }
    }
}

impl EnvironmentFactors {
    pub fn get(&self, field: FactorField) -> f64 {
        match field {
            FactorField::Temperature => self.temperature,
            FactorField::FoodAvailability => self.food_availability,
            FactorField::PredatorPresence => self.predator_presence,
        }
    }

    pub fn set(&mut self, field: FactorField, value: f64) -> Result<(), EditError> {
        let value = field.validate(value)?;
        match field {
            FactorField::Temperature => self.temperature = value,
            FactorField::FoodAvailability => self.food_availability = value,
            FactorField::PredatorPresence => self.predator_presence = value,
        }
        Ok(())
    }
}

/// Environment override for one server-assigned zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub id: i64,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default)]
    pub food_availability: f64,
    #[serde(default)]
    pub predator_presence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl Zone {
    pub fn get(&self, field: FactorField) -> f64 {
        match field {
            FactorField::Temperature => self.temperature,
            FactorField::FoodAvailability => self.food_availability,
            FactorField::PredatorPresence => self.predator_presence,
        }
    }

    pub fn set(&mut self, field: FactorField, value: f64) -> Result<(), EditError> {
        let value = field.validate(value)?;
        match field {
            FactorField::Temperature => self.temperature = value,
            FactorField::FoodAvailability => self.food_availability = value,
            FactorField::PredatorPresence => self.predator_presence = value,
        }
        Ok(())
    }
}

/// Numeric fields shared by [`EnvironmentFactors`] and [`Zone`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactorField {
    Temperature,
    FoodAvailability,
    PredatorPresence,
}

impl FactorField {
    pub const ALL: [FactorField; 3] = [
        FactorField::Temperature,
        FactorField::FoodAvailability,
        FactorField::PredatorPresence,
    ];

    pub const fn wire_name(self) -> &'static str {
        match self {
            FactorField::Temperature => "temperature",
            FactorField::FoodAvailability => "foodAvailability",
            FactorField::PredatorPresence => "predatorPresence",
        }
    }

    /// Rejects non-finite values and values outside the field's domain.
    pub fn validate(self, value: f64) -> Result<f64, EditError> {
        if !value.is_finite() {
            return Err(EditError::NotNumeric {
                field: self.wire_name(),
                raw: value.to_string(),
            });
        }
        let in_range = match self {
            FactorField::Temperature => true,
            FactorField::FoodAvailability => value >= 0.0,
            FactorField::PredatorPresence => (0.0..=1.0).contains(&value),
        };
        if !in_range {
            return Err(EditError::OutOfRange {
                field: self.wire_name(),
                expected: match self {
                    FactorField::PredatorPresence => "between 0 and 1",
                    _ => "zero or more",
                },
                value,
            });
        }
        Ok(value)
    }

    /// Pull a finite `value` into the field's domain.
    pub fn clamp(self, value: f64) -> f64 {
        match self {
            FactorField::Temperature => value,
            FactorField::FoodAvailability => value.max(0.0),
            FactorField::PredatorPresence => value.clamp(0.0, 1.0),
        }
    }
}

impl fmt::Display for FactorField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for FactorField {
    type Err = EditError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "temperature" | "temp" => Ok(FactorField::Temperature),
            "foodAvailability" | "food_availability" | "food" => Ok(FactorField::FoodAvailability),
            "predatorPresence" | "predator_presence" | "predators" => {
                Ok(FactorField::PredatorPresence)
            }
            other => Err(EditError::UnknownField(other.to_owned())),
        }
    }
}
