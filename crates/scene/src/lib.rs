//! Scene framing.
//!
//! This crate provides the pieces that place a static mesh in view:
//! - Bounding spheres
//! - The framing camera
//! - The fixed directional light

pub mod bounds;
pub mod camera;
pub mod light;

pub use bounds::BoundingSphere;
pub use camera::Camera;
pub use light::DirectionalLight;
