//! Error type for renderer operations.

use thiserror::Error;

use objview_resources::ResourceError;
use objview_rhi::RhiError;

/// Failure inside the renderer.
#[derive(Error, Debug)]
pub enum RendererError {
    /// Vulkan or GPU memory failure
    #[error(transparent)]
    Rhi(#[from] RhiError),

    /// Mesh or texture could not be decoded
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Window or surface failure
    #[error(transparent)]
    Platform(#[from] objview_core::Error),
}

/// Result type alias for renderer operations.
pub type RendererResult<T> = Result<T, RendererError>;
