//! Thin, owning wrappers over the Vulkan 1.3 API used by the viewer.
//!
//! Every wrapper keeps an `Arc<device::Device>` and releases its handle on
//! drop, so destruction order follows ownership. Memory comes from
//! `gpu-allocator`; shaders are WGSL translated with `naga`.

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod rendering;
pub mod sampler;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod vertex;

pub use error::{RhiError, RhiResult};

pub use ash::vk;
