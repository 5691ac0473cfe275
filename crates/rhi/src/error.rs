//! Errors raised by the Vulkan layer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RhiError {
    #[error("Vulkan call failed: {0}")]
    VulkanError(#[from] ash::vk::Result),

    #[error("Vulkan loader unavailable: {0}")]
    LoadingError(#[from] ash::LoadingError),

    #[error("GPU memory allocation failed: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// Every adapter was rejected or failed device creation
    #[error("No adapter could provide a Vulkan 1.3 device")]
    NoSuitableGpu,

    /// WGSL parse, validation or SPIR-V emission failure
    #[error("Shader translation failed: {0}")]
    ShaderError(String),

    #[error("Swapchain setup failed: {0}")]
    SwapchainError(String),

    #[error("Pipeline setup failed: {0}")]
    PipelineError(String),

    /// A fixed-size table (textures, descriptor sets) is full
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// Empty or out-of-range buffer access
    #[error("Invalid upload: {0}")]
    UploadError(String),
}

pub type RhiResult<T> = std::result::Result<T, RhiError>;
