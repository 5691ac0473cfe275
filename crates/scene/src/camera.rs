//! Look-at camera that frames a bounding sphere.

use glam::{Mat4, Vec3};

use crate::bounds::BoundingSphere;

/// Eye offset from the sphere center, in units of its radius.
const FRAMING_OFFSET: Vec3 = Vec3::new(0.6, 0.55, 1.6);

/// Perspective camera defined by eye, target and up vectors.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::framing(&BoundingSphere::default())
    }
}

impl Camera {
    pub const FOV_Y_DEGREES: f32 = 60.0;

    /// Places the camera so a sphere of any size fills a similar part of the view.
    ///
    /// Clip planes scale with the radius to keep depth precision usable for
    /// both tiny and very large models.
    pub fn framing(sphere: &BoundingSphere) -> Self {
        let r = sphere.radius;
        Self {
            eye: sphere.center + FRAMING_OFFSET * r,
            target: sphere.center,
            up: Vec3::Y,
            fov_y: Self::FOV_Y_DEGREES.to_radians(),
            near: (r / 1000.0).max(0.01),
            far: (r * 50.0).max(100.0),
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    /// Perspective projection with Vulkan clip space (Y down, depth 0..1).
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        let mut proj = Mat4::perspective_rh(self.fov_y, aspect, self.near, self.far);
        // Flip Y for Vulkan coordinate system
        proj.y_axis.y *= -1.0;
        proj
    }
}
