//! Rendering layer for Birdwatch.
//!
//! [`render_snapshot`] is a pure function of its input: it clears the surface
//! and redraws every entity, back to front, in the order fixed by
//! [`Layer::DRAW_ORDER`].

use birdwatch_core::SimulationSnapshot;
use tracing::trace;

pub mod raster;
pub mod style;
pub mod surface;
pub mod transform;

pub use raster::RasterSurface;
pub use style::{Layer, MarkerStyle, Outline, Rgba, palette};
pub use surface::{DrawCommand, DrawList, Surface};
pub use transform::SurfaceTransform;

/// Largest offscreen image [`render_png`] will allocate (64M px).
pub const MAX_PIXELS: u64 = 64 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("requested image too large: {width}x{height} exceeds {MAX_PIXELS} pixels")]
    TooLarge { width: u32, height: u32 },
    #[error("failed to encode image: {0}")]
    Encode(#[from] image::ImageError),
}

/// Number of markers drawn per layer in one pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub obstacles: usize,
    pub resources: usize,
    pub birds: usize,
    pub predators: usize,
    pub zones: usize,
}

impl RenderSummary {
    pub fn total(&self) -> usize {
        self.obstacles + self.resources + self.birds + self.predators + self.zones
    }
}

/// Redraw `surface` from scratch using `snapshot`.
pub fn render_snapshot<S>(snapshot: &SimulationSnapshot, surface: &mut S) -> RenderSummary
where
    S: Surface + ?Sized,
{
    surface.clear(palette::BACKGROUND);
    let mut summary = RenderSummary::default();

    let Some(transform) = SurfaceTransform::new(surface.size(), snapshot.world_size) else {
        trace!(
            world_size = snapshot.world_size,
            "skipping entities for unusable world size"
        );
        return summary;
    };

    for layer in Layer::DRAW_ORDER {
        surface.begin_layer(layer);
        match layer {
            Layer::Obstacles => {
                for obstacle in &snapshot.obstacles {
                    let radius = transform.obstacle_radius(obstacle.radius);
                    if radius.is_nan() || radius <= 0.0 {
                        continue;
                    }
                    let marker = style::obstacle_style(radius);
                    draw_marker(surface, transform.world_to_surface(obstacle.position), &marker);
                    summary.obstacles += 1;
                }
            }
            Layer::Resources => {
                for resource in &snapshot.resources {
                    let marker = style::resource_style(resource.kind);
                    draw_marker(surface, transform.world_to_surface(resource.position), &marker);
                    summary.resources += 1;
                }
            }
            Layer::Birds => {
                for bird in &snapshot.birds {
                    let marker = style::bird_style(bird.state);
                    draw_marker(surface, transform.world_to_surface(bird.position), &marker);
                    summary.birds += 1;
                }
            }
            Layer::Predators => {
                let marker = style::predator_style();
                for predator in &snapshot.predators {
                    draw_marker(surface, transform.world_to_surface(predator.position), &marker);
                    summary.predators += 1;
                }
            }
            Layer::ZoneAnnotations => {
                for zone in &snapshot.temperature_zones {
                    let center = transform.world_to_surface(zone.position);
                    surface.stroke_circle(
                        center,
                        style::ZONE_RING_RADIUS,
                        style::ZONE_RING_WIDTH,
                        palette::ZONE_RING,
                    );
                    let anchor = (
                        center.0 + style::ZONE_RING_RADIUS + 2.0,
                        center.1 - style::ZONE_RING_RADIUS * 0.5,
                    );
                    surface.draw_text(
                        anchor,
                        &style::temperature_label(zone.temperature),
                        palette::ZONE_LABEL,
                    );
                    summary.zones += 1;
                }
            }
        }
    }

    trace!(
        birds = summary.birds,
        predators = summary.predators,
        total = summary.total(),
        "rendered snapshot"
    );
    summary
}

fn draw_marker<S>(surface: &mut S, center: (f32, f32), marker: &MarkerStyle)
where
    S: Surface + ?Sized,
{
    surface.fill_circle(center, marker.radius, marker.fill);
    if let Some(outline) = marker.outline {
        surface.stroke_circle(center, marker.radius, outline.width, outline.color);
    }
}

/// Render `snapshot` offscreen and encode it as PNG.
pub fn render_png(
    snapshot: &SimulationSnapshot,
    width: u32,
    height: u32,
) -> Result<Vec<u8>, RenderError> {
    if u64::from(width) * u64::from(height) > MAX_PIXELS {
        return Err(RenderError::TooLarge { width, height });
    }
    let mut surface = RasterSurface::new(width, height);
    render_snapshot(snapshot, &mut surface);
    surface.encode_png()
}
