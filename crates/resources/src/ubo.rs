//! Uniform block shared by both shader stages.
//!
//! [`SceneConstants`] is written once per drawn subset per frame. It uses
//! `#[repr(C)]` and `bytemuck::Pod` so it can be copied into the mapped
//! uniform ring as raw bytes, and its field order matches the `Scene`
//! struct in the WGSL source under std140 rules.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::material::MaterialDesc;

/// Per-draw uniform block.
///
/// # Memory Layout (std140)
///
/// | Offset | Size | Field |
/// |--------|------|-------|
/// | 0      | 64   | world |
/// | 64     | 64   | view |
/// | 128    | 64   | projection |
/// | 192    | 64   | world_inv_transpose |
/// | 256    | 16   | light_dir |
/// | 272    | 16   | light_color |
/// | 288    | 16   | ambient_color |
/// | 304    | 16   | eye_pos |
/// | 320    | 16   | material_diffuse |
/// | 336    | 16   | material_specular |
/// | 352    | 4    | specular_power |
/// | 356    | 4    | total_time |
/// | 360    | 8    | tex_tiling |
/// | 368    | 8    | tex_scroll |
/// | 376    | 4    | fade_start |
/// | 380    | 4    | fade_end |
/// | 384    | 4    | has_texture |
/// | 388    | 12   | _padding |
///
/// Total size: 400 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct SceneConstants {
    pub world: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    /// Transforms normals; see [`SceneConstants::normal_matrix`].
    pub world_inv_transpose: Mat4,
    pub light_dir: Vec4,
    pub light_color: Vec4,
    pub ambient_color: Vec4,
    pub eye_pos: Vec4,
    pub material_diffuse: Vec4,
    pub material_specular: Vec4,
    pub specular_power: f32,
    pub total_time: f32,
    pub tex_tiling: Vec2,
    pub tex_scroll: Vec2,
    /// Distance fade is disabled while `fade_end <= fade_start`.
    pub fade_start: f32,
    pub fade_end: f32,
    /// 1.0 when the bound texture should modulate the diffuse color.
    pub has_texture: f32,
    pub _padding: [f32; 3],
}

impl SceneConstants {
    /// Creates a block with the given transforms and everything else zeroed.
    pub fn new(world: Mat4, view: Mat4, projection: Mat4, eye: Vec3) -> Self {
        Self {
            world,
            view,
            projection,
            world_inv_transpose: Self::normal_matrix(world),
            eye_pos: eye.extend(1.0),
            ..Self::zeroed()
        }
    }

    /// Copies a material's colors and shininess into the block.
    pub fn set_material(&mut self, material: &MaterialDesc, has_texture: bool) {
        self.material_diffuse = material.diffuse;
        self.material_specular = material.specular;
        self.specular_power = material.shininess;
        self.has_texture = if has_texture { 1.0 } else { 0.0 };
    }

    /// Inverse transpose of `world`, or identity when `world` is singular.
    pub fn normal_matrix(world: Mat4) -> Mat4 {
        const EPSILON: f32 = 1e-6;
        if world.determinant().abs() < EPSILON {
            Mat4::IDENTITY
        } else {
            world.inverse().transpose()
        }
    }

    #[inline]
    pub const fn size() -> usize {
        std::mem::size_of::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::offset_of;

    #[test]
    fn test_scene_constants_size() {
        assert_eq!(SceneConstants::size(), 400);
        assert_eq!(SceneConstants::size() % 16, 0);
    }

    #[test]
    fn test_scene_constants_offsets() {
        assert_eq!(offset_of!(SceneConstants, world_inv_transpose), 192);
        assert_eq!(offset_of!(SceneConstants, light_dir), 256);
        assert_eq!(offset_of!(SceneConstants, eye_pos), 304);
        assert_eq!(offset_of!(SceneConstants, material_specular), 336);
        assert_eq!(offset_of!(SceneConstants, specular_power), 352);
        assert_eq!(offset_of!(SceneConstants, total_time), 356);
        assert_eq!(offset_of!(SceneConstants, tex_tiling), 360);
        assert_eq!(offset_of!(SceneConstants, tex_scroll), 368);
        assert_eq!(offset_of!(SceneConstants, fade_start), 376);
        assert_eq!(offset_of!(SceneConstants, fade_end), 380);
        assert_eq!(offset_of!(SceneConstants, has_texture), 384);
    }

    #[test]
    fn test_new_computes_normal_matrix() {
        let world = Mat4::from_scale(Vec3::new(1.0, 2.0, 1.0));
        let c = SceneConstants::new(world, Mat4::IDENTITY, Mat4::IDENTITY, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(c.world_inv_transpose, world.inverse().transpose());
        assert_eq!(c.eye_pos, Vec4::new(1.0, 2.0, 3.0, 1.0));
        assert_eq!(c.has_texture, 0.0);
    }

    #[test]
    fn test_singular_world_falls_back_to_identity() {
        assert_eq!(
            SceneConstants::normal_matrix(Mat4::from_scale(Vec3::ZERO)),
            Mat4::IDENTITY
        );
    }

    #[test]
    fn test_set_material() {
        let mut c = SceneConstants::default();
        c.set_material(&MaterialDesc::default(), true);
        assert_eq!(c.material_diffuse, Vec4::new(0.8, 0.8, 0.8, 1.0));
        assert_eq!(c.specular_power, 32.0);
        assert_eq!(c.has_texture, 1.0);
    }

    #[test]
    fn test_bytes_match_size() {
        let c = SceneConstants::default();
        assert_eq!(bytemuck::bytes_of(&c).len(), SceneConstants::size());
    }
}
