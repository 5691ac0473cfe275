//! Asset decoding for the viewer.
//!
//! This crate turns files on disk into CPU-side data the renderer uploads:
//! - Wavefront OBJ meshes with MTL materials
//! - RGBA8 textures
//! - The per-draw uniform block layout

pub mod error;
pub mod material;
pub mod mesh;
pub mod obj;
pub mod texture;
pub mod ubo;

pub use error::{ResourceError, ResourceResult};
pub use material::MaterialDesc;
pub use mesh::{MeshData, MeshSubset};
pub use texture::TextureData;
pub use ubo::SceneConstants;
