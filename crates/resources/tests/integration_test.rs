//! Integration tests for loading OBJ models from disk.

use std::fs;

use glam::Vec4;
use objview_resources::{MeshData, ResourceError};
use tempfile::tempdir;

const TEXTURED_QUAD: &str = "
mtllib quad.mtl
v -1 -1 0
v 1 -1 0
v 1 1 0
v -1 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
usemtl brick
f 1/1/1 2/2/1 3/3/1 4/4/1
";

const QUAD_MTL: &str = "
newmtl brick
Kd 0.6 0.3 0.2
Ks 0.1 0.1 0.1
Ns 12
map_Kd textures\\brick.png
";

#[test]
fn test_load_obj_with_material_library() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("quad.obj"), TEXTURED_QUAD).unwrap();
    fs::write(dir.path().join("quad.mtl"), QUAD_MTL).unwrap();

    let mesh = MeshData::load_obj(dir.path().join("quad.obj")).expect("Failed to load OBJ");

    assert_eq!(mesh.vertices.len(), 4);
    assert_eq!(mesh.indices.len(), 6);
    assert_eq!(mesh.subsets.len(), 1);
    assert_eq!(mesh.subsets[0].material, Some(0));

    let brick = &mesh.materials[0];
    assert_eq!(brick.name, "brick");
    assert_eq!(brick.diffuse, Vec4::new(0.6, 0.3, 0.2, 1.0));
    assert_eq!(brick.shininess, 12.0);
    assert_eq!(
        brick.diffuse_texture.as_deref(),
        Some(std::path::Path::new("textures/brick.png"))
    );

    let (min, max) = mesh.bounds().unwrap();
    assert_eq!(min.truncate(), glam::Vec2::new(-1.0, -1.0));
    assert_eq!(max.truncate(), glam::Vec2::new(1.0, 1.0));
}

#[test]
fn test_missing_material_library_is_not_fatal() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("quad.obj"), TEXTURED_QUAD).unwrap();

    let mesh = MeshData::load_obj(dir.path().join("quad.obj")).expect("Failed to load OBJ");

    assert!(mesh.materials.is_empty());
    assert_eq!(mesh.subsets.len(), 1);
    assert_eq!(mesh.subsets[0].material, None);
}

#[test]
fn test_missing_obj_is_file_not_found() {
    let dir = tempdir().unwrap();
    let result = MeshData::load_obj(dir.path().join("nothing.obj"));
    assert!(matches!(result, Err(ResourceError::FileNotFound(_))));
}

#[test]
fn test_obj_without_faces_is_empty_mesh() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("points.obj"), "v 0 0 0\nv 1 1 1\n").unwrap();
    let result = MeshData::load_obj(dir.path().join("points.obj"));
    assert!(matches!(result, Err(ResourceError::EmptyMesh(_))));
}

#[test]
fn test_sloppy_obj_still_loads() {
    let dir = tempdir().unwrap();
    let source = "v 0 0 0\nv 1 0 bad\nv 0 1 0\nvn 0 0\nf 1//1 2//1 3//1\nf 1 2 12\nf 3\n";
    fs::write(dir.path().join("sloppy.obj"), source).unwrap();

    let mesh = MeshData::load_obj(dir.path().join("sloppy.obj")).expect("Failed to load OBJ");

    assert_eq!(mesh.triangle_count(), 2);
    assert_eq!(mesh.subsets.len(), 1);
    assert_eq!(mesh.vertices[1].position, glam::Vec3::new(1.0, 0.0, 0.0));
    assert_eq!(mesh.vertices[0].normal, glam::Vec3::ZERO);
}

#[test]
fn test_collapsed_faces_keep_vertices_without_subsets() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("lines.obj"), "v 0 0 0\nv 1 1 1\nf 1 2\n").unwrap();

    let mesh = MeshData::load_obj(dir.path().join("lines.obj")).expect("Failed to load OBJ");

    assert_eq!(mesh.vertices.len(), 2);
    assert!(mesh.indices.is_empty());
    assert!(mesh.subsets.is_empty());
}
