//! Surface material descriptions decoded from MTL files.

use std::path::PathBuf;

use glam::Vec4;

/// Blinn-Phong material as declared by an MTL `newmtl` block.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialDesc {
    /// Name used by `usemtl`.
    pub name: String,
    /// Diffuse color; alpha comes from `d` or `Tr`.
    pub diffuse: Vec4,
    /// Specular color, alpha unused.
    pub specular: Vec4,
    /// Specular exponent (`Ns`).
    pub shininess: f32,
    /// Diffuse texture path, relative to the model's directory.
    pub diffuse_texture: Option<PathBuf>,
}

impl MaterialDesc {
    /// A default material with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Default for MaterialDesc {
    fn default() -> Self {
        Self {
            name: String::new(),
            diffuse: Vec4::new(0.8, 0.8, 0.8, 1.0),
            specular: Vec4::new(0.5, 0.5, 0.5, 1.0),
            shininess: 32.0,
            diffuse_texture: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_material() {
        let m = MaterialDesc::default();
        assert_eq!(m.diffuse, Vec4::new(0.8, 0.8, 0.8, 1.0));
        assert_eq!(m.specular, Vec4::new(0.5, 0.5, 0.5, 1.0));
        assert_eq!(m.shininess, 32.0);
        assert!(m.diffuse_texture.is_none());
    }

    #[test]
    fn test_named_keeps_defaults() {
        let m = MaterialDesc::named("brick");
        assert_eq!(m.name, "brick");
        assert_eq!(m.shininess, 32.0);
    }
}
