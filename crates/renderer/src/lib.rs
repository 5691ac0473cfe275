//! Forward renderer for static OBJ scenes.
//!
//! This crate ties the RHI together into a viewer:
//! - Frame-slot ring guarded by a timeline fence
//! - Per-draw constants in a shared dynamic uniform buffer
//! - Texture table with a reserved fallback slot
//! - Scene loading, framing and drawing

pub mod constants;
pub mod depth_buffer;
pub mod draw_plan;
mod error;
pub mod frame_scheduler;
pub mod scene_pipeline;
mod scene_renderer;
pub mod textures;
pub mod uploader;

pub use error::{RendererError, RendererResult};
pub use frame_scheduler::{CompletionFence, FRAME_COUNT, FrameRing};
pub use scene_renderer::Renderer;
