//! Per-entity styling. Colors and marker sizes are fixed so two renders of
//! the same snapshot always produce the same pixels.

use birdwatch_core::{BirdState, ResourceKind};

pub type Rgba = [u8; 4];

pub mod palette {
    use super::Rgba;

    pub const BACKGROUND: Rgba = [255, 255, 255, 255];
    pub const OBSTACLE: Rgba = [128, 128, 128, 255];
    pub const FOOD: Rgba = [255, 165, 0, 255];
    pub const REST: Rgba = [173, 216, 230, 255];
    pub const BIRD_RESTING: Rgba = [0, 0, 255, 255];
    pub const BIRD_SEARCHING_FOOD: Rgba = [128, 0, 128, 255];
    pub const BIRD_MIGRATING: Rgba = [0, 128, 0, 255];
    pub const PREDATOR: Rgba = [220, 20, 60, 255];
    pub const PREDATOR_OUTLINE: Rgba = [0, 0, 0, 255];
    pub const ZONE_RING: Rgba = [255, 99, 71, 255];
    pub const ZONE_LABEL: Rgba = [33, 33, 33, 255];
}

pub const RESOURCE_RADIUS: f32 = 5.0;
pub const BIRD_RADIUS: f32 = 5.0;
pub const PREDATOR_RADIUS: f32 = 6.0;
pub const PREDATOR_OUTLINE_WIDTH: f32 = 2.0;
pub const ZONE_RING_RADIUS: f32 = 12.0;
pub const ZONE_RING_WIDTH: f32 = 1.5;

/// Drawing layers, back to front. The order is not configurable: predators
/// always sit above birds and zone labels are never covered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Layer {
    Obstacles,
    Resources,
    Birds,
    Predators,
    ZoneAnnotations,
}

impl Layer {
    pub const DRAW_ORDER: [Layer; 5] = [
        Layer::Obstacles,
        Layer::Resources,
        Layer::Birds,
        Layer::Predators,
        Layer::ZoneAnnotations,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Layer::Obstacles => "obstacles",
            Layer::Resources => "resources",
            Layer::Birds => "birds",
            Layer::Predators => "predators",
            Layer::ZoneAnnotations => "zones",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Outline {
    pub color: Rgba,
    pub width: f32,
}

/// Filled disc with an optional outline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarkerStyle {
    pub fill: Rgba,
    pub radius: f32,
    pub outline: Option<Outline>,
}

impl MarkerStyle {
    const fn disc(fill: Rgba, radius: f32) -> Self {
        Self {
            fill,
            radius,
            outline: None,
        }
    }
}

pub fn obstacle_style(radius_px: f32) -> MarkerStyle {
    MarkerStyle::disc(palette::OBSTACLE, radius_px)
}

pub fn resource_style(kind: ResourceKind) -> MarkerStyle {
    match kind {
        ResourceKind::Food => MarkerStyle::disc(palette::FOOD, RESOURCE_RADIUS),
        ResourceKind::Rest => MarkerStyle::disc(palette::REST, RESOURCE_RADIUS),
    }
}

pub fn bird_style(state: BirdState) -> MarkerStyle {
    let fill = match state {
        BirdState::Resting => palette::BIRD_RESTING,
        BirdState::SearchingFood => palette::BIRD_SEARCHING_FOOD,
        BirdState::Migrating => palette::BIRD_MIGRATING,
    };
    MarkerStyle::disc(fill, BIRD_RADIUS)
}

pub fn predator_style() -> MarkerStyle {
    MarkerStyle {
        fill: palette::PREDATOR,
        radius: PREDATOR_RADIUS,
        outline: Some(Outline {
            color: palette::PREDATOR_OUTLINE,
            width: PREDATOR_OUTLINE_WIDTH,
        }),
    }
}

/// Label shown next to a temperature zone.
pub fn temperature_label(temperature: f64) -> String {
    format!("{temperature:.1}C")
}
