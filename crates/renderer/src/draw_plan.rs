//! Turning mesh subsets into draw calls.

use objview_resources::{MaterialDesc, MeshSubset};

/// One indexed draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawCommand {
    /// Position of the subset in the scene's subset list; selects the constant slot.
    pub subset: usize,
    pub first_index: u32,
    pub index_count: u32,
    /// Index into the scene's material list.
    pub material: usize,
}

/// Material index a subset draws with.
///
/// Subsets without a material, or with an index past the end of the list,
/// use material 0.
#[inline]
pub fn resolve_material(subset: &MeshSubset, material_count: usize) -> usize {
    match subset.material {
        Some(index) if index < material_count => index,
        _ => 0,
    }
}

/// One draw per subset with indices, in subset order.
pub fn plan_draws(subsets: &[MeshSubset], material_count: usize) -> Vec<DrawCommand> {
    subsets
        .iter()
        .enumerate()
        .filter(|(_, subset)| subset.index_count > 0)
        .map(|(i, subset)| DrawCommand {
            subset: i,
            first_index: subset.index_start,
            index_count: subset.index_count,
            material: resolve_material(subset, material_count),
        })
        .collect()
}

/// The materials a scene renders with; a single default when it declares none.
pub fn scene_materials(declared: &[MaterialDesc]) -> Vec<MaterialDesc> {
    if declared.is_empty() {
        vec![MaterialDesc::named("default")]
    } else {
        declared.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn subset(start: u32, count: u32, material: Option<usize>) -> MeshSubset {
        MeshSubset {
            index_start: start,
            index_count: count,
            material,
        }
    }

    #[test]
    fn test_one_draw_per_non_empty_subset() {
        let subsets = [
            subset(0, 6, Some(0)),
            subset(6, 0, Some(1)),
            subset(6, 3, Some(1)),
            subset(9, 12, None),
        ];
        let total_indices = 21;

        let draws = plan_draws(&subsets, 2);
        assert_eq!(draws.len(), 3);
        assert_eq!(draws.iter().map(|d| d.subset).collect::<Vec<_>>(), vec![0, 2, 3]);
        for d in &draws {
            assert!(d.first_index + d.index_count <= total_indices);
        }
    }

    #[test]
    fn test_only_empty_subsets_draw_nothing() {
        let subsets = [subset(0, 0, None), subset(0, 0, Some(0))];
        assert!(plan_draws(&subsets, 1).is_empty());
        assert!(plan_draws(&[], 1).is_empty());
    }

    #[test]
    fn test_missing_or_invalid_material_uses_first() {
        assert_eq!(resolve_material(&subset(0, 3, None), 4), 0);
        assert_eq!(resolve_material(&subset(0, 3, Some(7)), 4), 0);
        assert_eq!(resolve_material(&subset(0, 3, Some(3)), 4), 3);
    }

    #[test]
    fn test_no_declared_materials_synthesizes_default() {
        let materials = scene_materials(&[]);
        assert_eq!(materials.len(), 1);
        assert_eq!(materials[0].diffuse, Vec4::new(0.8, 0.8, 0.8, 1.0));
        assert_eq!(materials[0].specular, Vec4::new(0.5, 0.5, 0.5, 1.0));
        assert_eq!(materials[0].shininess, 32.0);
        assert!(materials[0].diffuse_texture.is_none());

        // Every subset then draws with it
        let draws = plan_draws(&[subset(0, 3, Some(2)), subset(3, 3, None)], materials.len());
        assert!(draws.iter().all(|d| d.material == 0));
    }

    #[test]
    fn test_declared_materials_are_kept() {
        let declared = vec![MaterialDesc::named("a"), MaterialDesc::named("b")];
        assert_eq!(scene_materials(&declared), declared);
    }
}
