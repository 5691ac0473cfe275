//! In-memory indexed meshes split into per-material subsets.

use std::path::Path;

use glam::{Vec2, Vec3, Vec4};
use objview_rhi::vertex::MeshVertex;

use crate::error::{ResourceError, ResourceResult};
use crate::material::MaterialDesc;
use crate::obj;

/// A contiguous range of the index buffer drawn with one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshSubset {
    /// First index in [`MeshData::indices`].
    pub index_start: u32,
    /// Number of indices, a multiple of 3.
    pub index_count: u32,
    /// Index into [`MeshData::materials`]; `None` selects the default material.
    pub material: Option<usize>,
}

impl MeshSubset {
    #[inline]
    pub fn index_end(&self) -> u32 {
        self.index_start + self.index_count
    }
}

/// Decoded mesh: shared vertex and index arrays plus subset ranges.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    pub subsets: Vec<MeshSubset>,
    pub materials: Vec<MaterialDesc>,
}

impl MeshData {
    /// Loads a Wavefront OBJ file and the MTL libraries it references.
    ///
    /// A missing material library is logged and skipped; the mesh then
    /// renders with the default material.
    pub fn load_obj(path: impl AsRef<Path>) -> ResourceResult<Self> {
        let path = path.as_ref();
        let source = read_text(path)?;

        let mesh = obj::parse_obj(&source, path, |library| match read_text(library) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!("Material library '{}' skipped: {}", library.display(), e);
                None
            }
        })?;

        tracing::info!(
            "Loaded '{}': {} vertices, {} triangles, {} subsets, {} materials",
            path.display(),
            mesh.vertices.len(),
            mesh.triangle_count(),
            mesh.subsets.len(),
            mesh.materials.len()
        );
        Ok(mesh)
    }

    /// The built-in cube shown before any model loads.
    ///
    /// Spans [-1, 1] on every axis with one face per normal direction
    /// (+Z, -Z, -X, +X, +Y, -Y), four vertices per face.
    pub fn cube() -> Self {
        const FACES: [([[f32; 3]; 4], [f32; 3]); 6] = [
            ([[-1.0, -1.0, 1.0], [1.0, -1.0, 1.0], [1.0, 1.0, 1.0], [-1.0, 1.0, 1.0]], [0.0, 0.0, 1.0]),
            ([[1.0, -1.0, -1.0], [-1.0, -1.0, -1.0], [-1.0, 1.0, -1.0], [1.0, 1.0, -1.0]], [0.0, 0.0, -1.0]),
            ([[-1.0, -1.0, -1.0], [-1.0, -1.0, 1.0], [-1.0, 1.0, 1.0], [-1.0, 1.0, -1.0]], [-1.0, 0.0, 0.0]),
            ([[1.0, -1.0, 1.0], [1.0, -1.0, -1.0], [1.0, 1.0, -1.0], [1.0, 1.0, 1.0]], [1.0, 0.0, 0.0]),
            ([[-1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, -1.0], [-1.0, 1.0, -1.0]], [0.0, 1.0, 0.0]),
            ([[-1.0, -1.0, -1.0], [1.0, -1.0, -1.0], [1.0, -1.0, 1.0], [-1.0, -1.0, 1.0]], [0.0, -1.0, 0.0]),
        ];
        const UVS: [[f32; 2]; 4] = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);

        for (face, (corners, normal)) in FACES.iter().enumerate() {
            for (corner, uv) in corners.iter().zip(UVS) {
                vertices.push(MeshVertex::new(
                    Vec3::from_array(*corner),
                    Vec3::from_array(*normal),
                    Vec2::from_array(uv),
                ));
            }
            let b = face as u32 * 4;
            indices.extend_from_slice(&[b, b + 1, b + 2, b, b + 2, b + 3]);
        }

        let material = MaterialDesc {
            name: "cube".to_string(),
            diffuse: Vec4::new(0.2, 0.5, 0.9, 1.0),
            specular: Vec4::new(0.8, 0.8, 0.8, 1.0),
            shininess: 32.0,
            diffuse_texture: None,
        };

        Self {
            vertices,
            indices,
            subsets: vec![MeshSubset {
                index_start: 0,
                index_count: 36,
                material: Some(0),
            }],
            materials: vec![material],
        }
    }

    /// Axis-aligned bounds of all vertex positions, or `None` without vertices.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = self.vertices.first()?.position;
        Some(
            self.vertices
                .iter()
                .fold((first, first), |(min, max), v| {
                    (min.min(v.position), max.max(v.position))
                }),
        )
    }

    /// Total number of triangles across all subsets.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

fn read_text(path: &Path) -> ResourceResult<String> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ResourceError::FileNotFound(path.to_path_buf()),
        _ => ResourceError::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_layout() {
        let cube = MeshData::cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        assert_eq!(cube.triangle_count(), 12);
        assert_eq!(cube.subsets.len(), 1);
        assert_eq!(cube.subsets[0].index_end(), 36);
        assert!(cube.indices.iter().all(|&i| (i as usize) < cube.vertices.len()));
        assert_eq!(cube.materials[0].diffuse, Vec4::new(0.2, 0.5, 0.9, 1.0));
    }

    #[test]
    fn test_cube_faces_point_outward() {
        let cube = MeshData::cube();
        for v in &cube.vertices {
            // Each vertex lies on the face its normal points out of
            assert_eq!(v.position.dot(v.normal), 1.0);
        }
    }

    #[test]
    fn test_cube_bounds() {
        let (min, max) = MeshData::cube().bounds().unwrap();
        assert_eq!(min, Vec3::splat(-1.0));
        assert_eq!(max, Vec3::splat(1.0));
    }

    #[test]
    fn test_empty_mesh_has_no_bounds() {
        assert!(MeshData::default().bounds().is_none());
    }
}
