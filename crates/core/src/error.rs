//! Errors shared by the viewer crates above the Vulkan layer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Surface creation or extension enumeration failed
    #[error("Vulkan: {0}")]
    Vulkan(String),

    #[error("Window: {0}")]
    Window(String),

    /// Bad command-line value
    #[error("Config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
