use birdwatch_core::Position;

/// Maps world units onto a fixed-size drawing surface.
///
/// The x and y axes scale independently, so a square world stretched onto a
/// 4:3 surface keeps its corners on the surface corners.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceTransform {
    scale_x: f64,
    scale_y: f64,
}

impl SurfaceTransform {
    /// Obstacle radii are magnified so they stay visible on small surfaces.
    pub const OBSTACLE_MAGNIFICATION: f64 = 3.0;

    /// Returns `None` when `world_size` is not a positive finite number.
    pub fn new(surface: (u32, u32), world_size: f64) -> Option<Self> {
        if !world_size.is_finite() || world_size <= 0.0 {
            return None;
        }
        Some(Self {
            scale_x: f64::from(surface.0) / world_size,
            scale_y: f64::from(surface.1) / world_size,
        })
    }

    #[inline]
    pub fn world_to_surface(&self, position: Position) -> (f32, f32) {
        (
            (position.x * self.scale_x) as f32,
            (position.y * self.scale_y) as f32,
        )
    }

    /// Obstacle radius in surface units, following the horizontal scale.
    #[inline]
    pub fn obstacle_radius(&self, radius: f64) -> f32 {
        (radius * self.scale_x * Self::OBSTACLE_MAGNIFICATION) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SURFACE: (u32, u32) = (800, 600);
    const WORLD: f64 = 1000.0;

    fn approx_eq(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() <= eps
    }

    #[test]
    fn rejects_degenerate_world_sizes() {
        assert!(SurfaceTransform::new(SURFACE, 0.0).is_none());
        assert!(SurfaceTransform::new(SURFACE, -5.0).is_none());
        assert!(SurfaceTransform::new(SURFACE, f64::NAN).is_none());
        assert!(SurfaceTransform::new(SURFACE, f64::INFINITY).is_none());
    }

    #[test]
    fn axes_scale_independently() {
        let transform = SurfaceTransform::new(SURFACE, WORLD).expect("valid world");
        let (x, y) = transform.world_to_surface(Position::new(WORLD, WORLD));
        assert!(approx_eq(x, 800.0, 1e-3), "x was {x}");
        assert!(approx_eq(y, 600.0, 1e-3), "y was {y}");

        let (x, y) = transform.world_to_surface(Position::new(500.0, 500.0));
        assert!(approx_eq(x, 400.0, 1e-3) && approx_eq(y, 300.0, 1e-3));
    }

    #[test]
    fn obstacle_radius_uses_horizontal_scale_and_magnification() {
        let transform = SurfaceTransform::new(SURFACE, WORLD).expect("valid world");
        assert!(approx_eq(transform.obstacle_radius(10.0), 24.0, 1e-3));
    }
}
