//! Wavefront OBJ and MTL decoding on top of `tobj`.
//!
//! Sources are normalized before `tobj` sees them, so sloppy files degrade
//! instead of failing:
//! - short or malformed `v`/`vn`/`vt` numbers read as 0
//! - face corners that point outside the declared data, or that omit a
//!   texture coordinate or normal, get a zero position, a (0, 0) texture
//!   coordinate or a (0, 1, 0) normal
//! - faces with fewer than three corners add their vertices but no triangles
//! - MTL statements with missing or malformed numbers keep the defaults
//!
//! Only a mesh without a single vertex is rejected.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use glam::{Vec2, Vec3};
use objview_rhi::vertex::MeshVertex;

use crate::error::{ResourceError, ResourceResult};
use crate::material::MaterialDesc;
use crate::mesh::{MeshData, MeshSubset};

/// Object holding the corners of faces too small to triangulate.
const LOOSE_CORNERS: &str = "objview-loose-corners";
/// Material name that never resolves; stands in for an empty `usemtl`.
const NO_MATERIAL: &str = "objview-no-material";

/// Prepended so every corner can name a position, texcoord and normal.
/// The texcoord becomes (0, 0) once V is flipped.
const FALLBACK_ATTRIBUTES: &str = "v 0 0 0\nvt 0 1\nvn 0 1 0\n";
const FALLBACK_INDEX: usize = 1;

/// Splits a trimmed line into its statement keyword and the remainder.
fn statement(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (line, ""),
    }
}

/// Non-empty, non-comment lines, trimmed.
fn content_lines(source: &str) -> impl Iterator<Item = &str> {
    source
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Leading numbers of `rest`; reading stops at the first malformed token and
/// the remaining components stay 0.
fn lenient_floats<const N: usize>(rest: &str) -> [f32; N] {
    let mut out = [0.0; N];
    let values = rest.split_whitespace().map_while(|t| t.parse::<f32>().ok());
    for (slot, value) in out.iter_mut().zip(values) {
        *slot = value;
    }
    out
}

/// All `N` numbers of `rest`, or `None` if any is missing or malformed.
fn strict_floats<const N: usize>(rest: &str) -> Option<[f32; N]> {
    let mut out = [0.0; N];
    let mut tokens = rest.split_whitespace();
    for slot in &mut out {
        *slot = tokens.next()?.parse().ok()?;
    }
    Some(out)
}

/// Resolves a 1-based or negative (relative) OBJ index against `count`
/// elements. Zero, malformed and out-of-range references yield `None`.
fn resolve_index(token: &str, count: usize) -> Option<usize> {
    let raw: i64 = token.parse().ok()?;
    let resolved = match raw {
        0 => return None,
        r if r < 0 => count as i64 + r,
        r => r - 1,
    };
    (0..count as i64)
        .contains(&resolved)
        .then_some(resolved as usize)
}

/// Counts of the attributes declared so far, excluding the fallbacks.
#[derive(Default)]
struct Declared {
    positions: usize,
    tex_coords: usize,
    normals: usize,
}

impl Declared {
    /// Rewrites one face corner as an absolute `p/t/n` triple into the
    /// normalized source, where index 1 of each kind is the fallback.
    fn corner(&self, token: &str) -> String {
        let mut parts = token.split('/');
        let mut next = |count: usize| {
            parts
                .next()
                .and_then(|part| resolve_index(part, count))
                .map_or(FALLBACK_INDEX, |i| i + FALLBACK_INDEX + 1)
        };
        let p = next(self.positions);
        let t = next(self.tex_coords);
        let n = next(self.normals);
        format!("{p}/{t}/{n}")
    }
}

/// Rewrites OBJ source into a form `tobj` accepts without errors.
///
/// Only geometry, grouping and material statements survive.
fn normalize_obj(source: &str) -> String {
    let mut out = String::with_capacity(source.len() + FALLBACK_ATTRIBUTES.len());
    out.push_str(FALLBACK_ATTRIBUTES);

    let mut declared = Declared::default();
    let mut loose: Vec<String> = Vec::new();

    for line in content_lines(source) {
        let (keyword, rest) = statement(line);
        match keyword {
            "v" => {
                let [x, y, z] = lenient_floats(rest);
                out.push_str(&format!("v {x} {y} {z}\n"));
                declared.positions += 1;
            }
            "vt" => {
                let [u, v] = lenient_floats(rest);
                out.push_str(&format!("vt {u} {v}\n"));
                declared.tex_coords += 1;
            }
            "vn" => {
                let [x, y, z] = lenient_floats(rest);
                out.push_str(&format!("vn {x} {y} {z}\n"));
                declared.normals += 1;
            }
            "f" => {
                let corners: Vec<String> = rest
                    .split_whitespace()
                    .map(|token| declared.corner(token))
                    .collect();
                if corners.len() >= 3 {
                    out.push_str(&format!("f {}\n", corners.join(" ")));
                } else {
                    loose.extend(corners);
                }
            }
            "usemtl" => {
                let name = rest.split_whitespace().next().unwrap_or(NO_MATERIAL);
                out.push_str(&format!("usemtl {name}\n"));
            }
            "mtllib" => {
                if let Some(file) = rest.split_whitespace().next() {
                    out.push_str(&format!("mtllib {file}\n"));
                }
            }
            "o" | "g" if !rest.is_empty() => {
                out.push_str(&format!("{keyword} {rest}\n"));
            }
            _ => {}
        }
    }

    // Collapsed triangles make tobj emit the vertex; their indices are dropped later
    if !loose.is_empty() {
        out.push_str(&format!("o {LOOSE_CORNERS}\n"));
        for corner in &loose {
            out.push_str(&format!("f {corner} {corner} {corner}\n"));
        }
    }
    out
}

/// Rewrites MTL source, dropping statements `tobj` would reject.
fn normalize_mtl(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut in_material = false;

    for line in content_lines(source) {
        let (keyword, rest) = statement(line);
        if keyword == "newmtl" {
            let name = rest.split_whitespace().next().unwrap_or("unnamed");
            out.push_str(&format!("newmtl {name}\n"));
            in_material = true;
            continue;
        }
        if !in_material {
            continue;
        }

        match keyword {
            "Kd" | "Ks" | "Ka" => {
                if let Some([r, g, b]) = strict_floats(rest) {
                    out.push_str(&format!("{keyword} {r} {g} {b}\n"));
                }
            }
            "Ns" => {
                if let Some([value]) = strict_floats(rest) {
                    out.push_str(&format!("Ns {value}\n"));
                }
            }
            // Both set the alpha; the later statement wins
            "d" | "Tr" => {
                if let Some([value]) = strict_floats(rest) {
                    let alpha = match keyword {
                        "Tr" => 1.0 - value,
                        _ if value <= 0.0 => 1.0,
                        _ => value,
                    };
                    out.push_str(&format!("d {alpha}\n"));
                }
            }
            "map_Kd" | "map_Ka" if !rest.is_empty() => {
                out.push_str(&format!("{keyword} {rest}\n"));
            }
            _ => {}
        }
    }
    out
}

fn load_mtl(source: &str) -> tobj::MTLLoadResult {
    tobj::load_mtl_buf(&mut Cursor::new(normalize_mtl(source)))
}

/// Extracts a texture file name from the argument of a `map_*` statement.
///
/// With option flags in front, the last token is the path. Backslashes are
/// turned into `/` and a leading `./` is stripped.
fn texture_path(raw: &str) -> Option<PathBuf> {
    let raw = if raw.starts_with('-') {
        raw.split_whitespace().last()?
    } else {
        raw
    };
    let normalized = raw.trim().replace('\\', "/");
    let normalized = normalized.strip_prefix("./").unwrap_or(&normalized);
    (!normalized.is_empty()).then(|| PathBuf::from(normalized))
}

fn material_desc(material: tobj::Material) -> MaterialDesc {
    let defaults = MaterialDesc::named(material.name);

    let alpha = material.dissolve.unwrap_or(1.0);
    let diffuse = material
        .diffuse
        .map_or(defaults.diffuse.truncate(), Vec3::from_array)
        .extend(alpha);
    let specular = material
        .specular
        .map_or(defaults.specular, |s| Vec3::from_array(s).extend(defaults.specular.w));
    let diffuse_texture = material
        .diffuse_texture
        .or(material.ambient_texture)
        .as_deref()
        .and_then(texture_path);

    MaterialDesc {
        diffuse,
        specular,
        shininess: material.shininess.unwrap_or(defaults.shininess),
        diffuse_texture,
        ..defaults
    }
}

impl MeshData {
    /// Appends one `tobj` model, re-based onto the shared vertex array.
    fn append_model(&mut self, model: tobj::Model) {
        let base = self.vertices.len() as u32;
        let mesh = model.mesh;

        self.vertices.extend(
            mesh.positions
                .chunks_exact(3)
                .zip(mesh.normals.chunks_exact(3))
                .zip(mesh.texcoords.chunks_exact(2))
                .map(|((p, n), t)| {
                    MeshVertex::new(
                        Vec3::from_slice(p),
                        Vec3::from_slice(n),
                        Vec2::new(t[0], 1.0 - t[1]),
                    )
                }),
        );
        if model.name == LOOSE_CORNERS || mesh.indices.is_empty() {
            return;
        }

        let start = self.indices.len() as u32;
        self.indices.extend(mesh.indices.iter().map(|&i| base + i));
        let count = self.indices.len() as u32 - start;

        match self.subsets.last_mut() {
            // Groups without a material change continue the current subset
            Some(last) if last.material == mesh.material_id && last.index_end() == start => {
                last.index_count += count;
            }
            _ => self.subsets.push(MeshSubset {
                index_start: start,
                index_count: count,
                material: mesh.material_id,
            }),
        }
    }
}

/// Decodes OBJ source.
///
/// `read_library` receives every `mtllib` path resolved against `path`'s
/// directory and returns the file's text, or `None` when it is unavailable.
/// A missing or unreadable library leaves the mesh without materials.
///
/// # Errors
///
/// [`ResourceError::EmptyMesh`] when no vertex is decoded.
pub fn parse_obj<F>(source: &str, path: &Path, read_library: F) -> ResourceResult<MeshData>
where
    F: Fn(&Path) -> Option<String>,
{
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let options = tobj::LoadOptions {
        single_index: true,
        triangulate: true,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    };

    let (models, materials) = tobj::load_obj_buf(
        &mut Cursor::new(normalize_obj(source)),
        &options,
        |library| match read_library(&dir.join(library)) {
            Some(text) => load_mtl(&text),
            None => Err(tobj::LoadError::OpenFileFailed),
        },
    )
    .map_err(|source| ResourceError::Obj {
        path: path.to_path_buf(),
        source,
    })?;

    let materials = materials.unwrap_or_else(|e| {
        tracing::warn!("Materials of '{}' unavailable: {}", path.display(), e);
        Vec::new()
    });

    let mut mesh = MeshData {
        materials: materials.into_iter().map(material_desc).collect(),
        ..MeshData::default()
    };
    for model in models {
        mesh.append_model(model);
    }

    if mesh.vertices.is_empty() {
        return Err(ResourceError::EmptyMesh(path.to_path_buf()));
    }
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use glam::Vec4;

    use super::*;

    fn parse(source: &str) -> ResourceResult<MeshData> {
        parse_obj(source, Path::new("test.obj"), |_| None)
    }

    fn parse_with_library(source: &str, mtl: &'static str) -> MeshData {
        parse_obj(source, Path::new("test.obj"), move |_| Some(mtl.to_string())).unwrap()
    }

    const QUAD: &str = "
        # unit quad
        v 0 0 0
        v 1 0 0
        v 1 1 0
        v 0 1 0
        f 1 2 3 4
    ";

    const TRIANGLE: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\n";

    #[test]
    fn test_quad_is_fan_triangulated() {
        let mesh = parse(QUAD).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(
            mesh.subsets,
            vec![MeshSubset {
                index_start: 0,
                index_count: 6,
                material: None
            }]
        );
    }

    #[test]
    fn test_missing_attributes_use_defaults() {
        let mesh = parse(QUAD).unwrap();
        assert_eq!(mesh.vertices[0].normal, Vec3::Y);
        assert_eq!(mesh.vertices[0].tex_coord, Vec2::ZERO);
    }

    #[test]
    fn test_negative_indices_are_relative() {
        let mesh = parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n").unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.vertices[2].position, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_texcoord_v_is_flipped() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0.25 0.25\nvn 0 0 1\nf 1/1/1 2/1/1 3/1/1\n";
        let mesh = parse(src).unwrap();
        assert_eq!(mesh.vertices[0].tex_coord, Vec2::new(0.25, 0.75));
        assert_eq!(mesh.vertices[0].normal, Vec3::Z);
    }

    #[test]
    fn test_position_normal_form() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 1 0 0\nf 1//1 2//1 3//1\n";
        let mesh = parse(src).unwrap();
        assert!(mesh.vertices.iter().all(|v| v.normal == Vec3::X));
        assert!(mesh.vertices.iter().all(|v| v.tex_coord == Vec2::ZERO));
    }

    #[test]
    fn test_shared_corners_are_deduplicated() {
        let src = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3\nf 1 3 4\n";
        let mesh = parse(src).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn test_same_position_with_different_uv_is_split() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 1 1\nf 1/1 2/1 3/1\nf 1/2 2/2 3/2\n";
        let mesh = parse(src).unwrap();
        assert_eq!(mesh.vertices.len(), 6);
    }

    #[test]
    fn test_usemtl_opens_subsets() {
        let src = "
            mtllib scene.mtl
            v 0 0 0
            v 1 0 0
            v 0 1 0
            usemtl red
            f 1 2 3
            g second_half
            f 1 3 2
            usemtl blue
            usemtl missing
            f 3 2 1
        ";
        let mesh = parse_obj(src, Path::new("models/test.obj"), |library| {
            assert_eq!(library, Path::new("models/scene.mtl"));
            Some("newmtl red\nnewmtl blue\n".to_string())
        })
        .unwrap();

        assert_eq!(mesh.materials.len(), 2);
        // The group switch keeps material "red"; "blue" never gets a face
        assert_eq!(
            mesh.subsets,
            vec![
                MeshSubset { index_start: 0, index_count: 6, material: Some(0) },
                MeshSubset { index_start: 6, index_count: 3, material: None },
            ]
        );
    }

    #[test]
    fn test_out_of_range_corner_gets_zero_position() {
        let mesh = parse(&format!("{TRIANGLE}f 1 2 9\n")).unwrap();
        assert_eq!(mesh.indices.len(), 3);
        assert_eq!(mesh.vertices[2].position, Vec3::ZERO);
        assert_eq!(mesh.vertices[2].normal, Vec3::Y);
    }

    #[test]
    fn test_out_of_range_texcoord_and_normal_use_defaults() {
        let mesh = parse(&format!("{TRIANGLE}vt 0.5 0.5\nf 1/1/4 2/7 3/1\n")).unwrap();
        assert_eq!(mesh.vertices[0].tex_coord, Vec2::new(0.5, 0.5));
        assert_eq!(mesh.vertices[0].normal, Vec3::Y);
        assert_eq!(mesh.vertices[1].tex_coord, Vec2::ZERO);
    }

    #[test]
    fn test_zero_index_gets_zero_position() {
        let mesh = parse("v 1 1 1\nv 1 0 0\nv 0 1 0\nf 0 2 3\n").unwrap();
        assert_eq!(mesh.vertices[0].position, Vec3::ZERO);
        assert_eq!(mesh.indices.len(), 3);
    }

    #[test]
    fn test_two_corner_face_adds_no_triangles() {
        let mesh = parse(&format!("{TRIANGLE}f 1 2 3\nf 1 2\n")).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.subsets.len(), 1);
    }

    #[test]
    fn test_only_degenerate_faces_decode_without_subsets() {
        let mesh = parse(&format!("{TRIANGLE}f 1 2\n")).unwrap();
        assert_eq!(mesh.vertices.len(), 2);
        assert!(mesh.indices.is_empty());
        assert!(mesh.subsets.is_empty());
    }

    #[test]
    fn test_short_texcoord_keeps_default_v() {
        let mesh = parse(&format!("{TRIANGLE}vt 0.5\nf 1/1 2/1 3/1\n")).unwrap();
        // v reads as 0, which the flip turns into 1
        assert_eq!(mesh.vertices[0].tex_coord, Vec2::new(0.5, 1.0));
    }

    #[test]
    fn test_malformed_position_component_reads_as_zero() {
        let mesh = parse("v 2 zero 5\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        assert_eq!(mesh.vertices[0].position, Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_no_vertices_is_empty_mesh() {
        assert!(matches!(
            parse("# nothing\nv 0 0 0\n"),
            Err(ResourceError::EmptyMesh(_))
        ));
    }

    #[test]
    fn test_missing_library_keeps_geometry() {
        let mesh = parse(&format!("mtllib gone.mtl\n{TRIANGLE}usemtl red\nf 1 2 3\n")).unwrap();
        assert!(mesh.materials.is_empty());
        assert_eq!(mesh.subsets[0].material, None);
    }

    #[test]
    fn test_mtl_colors_and_alpha() {
        let mtl = "
            Kd 9 9 9
            newmtl glass
            Kd 0.1 0.2 0.3
            Ks 0.4 0.5 0.6
            Ns 96
            d 0.5
            newmtl smoke
            Tr 0.75
            newmtl solid
            d 0
        ";
        let mesh = parse_with_library(&format!("mtllib a.mtl\n{TRIANGLE}f 1 2 3\n"), mtl);
        let mats = &mesh.materials;
        assert_eq!(mats.len(), 3);
        assert_eq!(mats[0].name, "glass");
        assert_eq!(mats[0].diffuse, Vec4::new(0.1, 0.2, 0.3, 0.5));
        assert_eq!(mats[0].specular.truncate(), Vec3::new(0.4, 0.5, 0.6));
        assert_eq!(mats[0].shininess, 96.0);
        assert_eq!(mats[1].diffuse.w, 0.25);
        assert_eq!(mats[2].diffuse.w, 1.0);
    }

    #[test]
    fn test_mtl_short_statements_keep_defaults() {
        let mtl = "newmtl worn\nNs\nKd 0.5\nKs 0.1 0.2 0.3\n";
        let mesh = parse_with_library(&format!("mtllib a.mtl\n{TRIANGLE}f 1 2 3\n"), mtl);
        let worn = &mesh.materials[0];
        let defaults = MaterialDesc::default();
        assert_eq!(worn.shininess, defaults.shininess);
        assert_eq!(worn.diffuse, defaults.diffuse);
        assert_eq!(worn.specular.truncate(), Vec3::new(0.1, 0.2, 0.3));
    }

    #[test]
    fn test_texture_paths_are_normalized() {
        assert_eq!(
            texture_path(".\\textures\\brick wall.png"),
            Some(PathBuf::from("textures/brick wall.png"))
        );
        assert_eq!(texture_path("-s 2 2 1 stone.jpg"), Some(PathBuf::from("stone.jpg")));
        assert_eq!(texture_path("./ambient.tga"), Some(PathBuf::from("ambient.tga")));
        assert_eq!(texture_path(""), None);
    }

    #[test]
    fn test_ambient_map_is_used_as_diffuse_texture() {
        let mtl = "newmtl a\nmap_Ka ./ambient.tga\n";
        let mesh = parse_with_library(&format!("mtllib a.mtl\n{TRIANGLE}f 1 2 3\n"), mtl);
        assert_eq!(
            mesh.materials[0].diffuse_texture.as_deref(),
            Some(Path::new("ambient.tga"))
        );
    }

    #[test]
    fn test_transparency_statements_become_dissolve() {
        let mtl = normalize_mtl("newmtl a\nd 0\nTr 0.25\nd\nnewmtl b\nTr 1\n");
        assert_eq!(mtl, "newmtl a\nd 1\nd 0.75\nnewmtl b\nd 0\n");
    }

    #[test]
    fn test_normalized_corners_are_absolute() {
        let declared = Declared {
            positions: 3,
            tex_coords: 0,
            normals: 1,
        };
        assert_eq!(declared.corner("1"), "2/1/1");
        assert_eq!(declared.corner("-1//1"), "4/1/2");
        assert_eq!(declared.corner("5/x/2"), "1/1/1");
    }
}
