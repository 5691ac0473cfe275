//! Bounding volumes used to frame a mesh.

use glam::Vec3;

/// Radius used when a mesh collapses to (almost) a single point.
pub const DEGENERATE_RADIUS: f32 = 1.0;
const MIN_RADIUS: f32 = 0.001;

/// Sphere enclosing an axis-aligned box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    /// Sphere through the corners of the box `[min, max]`.
    ///
    /// Boxes whose half-diagonal is below 0.001 get a radius of
    /// [`DEGENERATE_RADIUS`] so the camera never sits on top of the mesh.
    pub fn from_aabb(min: Vec3, max: Vec3) -> Self {
        let center = (min + max) * 0.5;
        let radius = (max - min).length() * 0.5;
        Self {
            center,
            radius: if radius < MIN_RADIUS {
                DEGENERATE_RADIUS
            } else {
                radius
            },
        }
    }
}

impl Default for BoundingSphere {
    fn default() -> Self {
        Self {
            center: Vec3::ZERO,
            radius: DEGENERATE_RADIUS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_cube() {
        let s = BoundingSphere::from_aabb(Vec3::splat(-1.0), Vec3::splat(1.0));
        assert_eq!(s.center, Vec3::ZERO);
        assert!((s.radius - 3.0_f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_offset_box_center() {
        let s = BoundingSphere::from_aabb(Vec3::new(2.0, 0.0, 0.0), Vec3::new(4.0, 6.0, 0.0));
        assert_eq!(s.center, Vec3::new(3.0, 3.0, 0.0));
        assert!((s.radius - 40.0_f32.sqrt() * 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_single_point_gets_unit_radius() {
        let p = Vec3::new(5.0, -2.0, 7.0);
        let s = BoundingSphere::from_aabb(p, p);
        assert_eq!(s.center, p);
        assert_eq!(s.radius, 1.0);
    }

    #[test]
    fn test_tiny_box_gets_unit_radius() {
        let s = BoundingSphere::from_aabb(Vec3::ZERO, Vec3::splat(0.0001));
        assert_eq!(s.radius, DEGENERATE_RADIUS);
    }

    #[test]
    fn test_small_box_keeps_its_radius() {
        // Above the threshold, radii below 1.0 are kept as computed
        let s = BoundingSphere::from_aabb(Vec3::ZERO, Vec3::new(0.1, 0.0, 0.0));
        assert!((s.radius - 0.05).abs() < 1e-6);
    }
}
