//! Light definitions for the scene.

use glam::{Vec3, Vec4};

/// A directional light (sun-like) with a constant ambient term.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels, not normalized.
    pub direction: Vec3,
    /// Light color
    pub color: Vec3,
    /// Ambient color added to every lit surface
    pub ambient: Vec3,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(0.3, -1.0, 0.5),
            color: Vec3::ONE,
            ambient: Vec3::new(0.25, 0.25, 0.3),
        }
    }
}

impl DirectionalLight {
    /// Direction as a vector (w = 0).
    pub fn direction_vec4(&self) -> Vec4 {
        self.direction.extend(0.0)
    }

    pub fn color_vec4(&self) -> Vec4 {
        self.color.extend(1.0)
    }

    pub fn ambient_vec4(&self) -> Vec4 {
        self.ambient.extend(1.0)
    }
}
