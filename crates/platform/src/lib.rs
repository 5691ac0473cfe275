//! Platform layer for the viewer.
//!
//! This crate provides:
//! - The winit window and its Vulkan surface
//! - Keyboard and mouse state for the host loop

mod input;
mod window;

pub use input::{InputState, KeyCode, MouseButton};
pub use window::{Surface, Window};
