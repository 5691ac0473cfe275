//! The interleaved vertex format every mesh is expanded to.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// Position, normal and texture coordinate, 32 bytes with no padding.
///
/// Shader locations 0, 1 and 2 follow field order.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    /// Object-space position.
    pub position: Vec3,
    /// Surface normal, not necessarily normalized.
    pub normal: Vec3,
    /// Texture coordinates, V pointing down the image.
    pub tex_coord: Vec2,
}

impl MeshVertex {
    #[inline]
    pub const fn new(position: Vec3, normal: Vec3, tex_coord: Vec2) -> Self {
        Self {
            position,
            normal,
            tex_coord,
        }
    }

    /// One per-vertex binding at slot 0.
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: std::mem::offset_of!(MeshVertex, position) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: std::mem::offset_of!(MeshVertex, normal) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 2,
                format: vk::Format::R32G32_SFLOAT,
                offset: std::mem::offset_of!(MeshVertex, tex_coord) as u32,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<MeshVertex>(), 32);
        assert_eq!(MeshVertex::binding_description().stride, 32);
    }

    #[test]
    fn test_attribute_offsets() {
        let attrs = MeshVertex::attribute_descriptions();
        assert_eq!(attrs[0].offset, 0);
        assert_eq!(attrs[1].offset, 12);
        assert_eq!(attrs[2].offset, 24);
        assert_eq!(attrs[2].format, vk::Format::R32G32_SFLOAT);
        for (i, attr) in attrs.iter().enumerate() {
            assert_eq!(attr.location, i as u32);
            assert_eq!(attr.binding, 0);
        }
    }

    #[test]
    fn test_mesh_vertex_casts_to_bytes() {
        let v = MeshVertex::new(Vec3::new(1.0, 2.0, 3.0), Vec3::Y, Vec2::new(0.5, 0.25));
        let bytes: &[u8] = bytemuck::bytes_of(&v);
        assert_eq!(bytes.len(), 32);
        let floats: &[f32] = bytemuck::cast_slice(bytes);
        assert_eq!(floats, &[1.0, 2.0, 3.0, 0.0, 1.0, 0.0, 0.5, 0.25]);
    }
}
