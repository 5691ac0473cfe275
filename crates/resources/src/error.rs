//! Error types for resource loading.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for resource loading operations.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// The OBJ decoder rejected the model.
    #[error("Failed to decode '{}': {source}", path.display())]
    Obj {
        /// Model being decoded.
        path: PathBuf,
        source: tobj::LoadError,
    },

    /// The mesh decoded into zero vertices.
    #[error("Mesh '{}' contains no vertices", .0.display())]
    EmptyMesh(PathBuf),

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// File not found.
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

/// Result type alias for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obj_error_names_file() {
        let err = ResourceError::Obj {
            path: PathBuf::from("models/cube.obj"),
            source: tobj::LoadError::ReadError,
        };
        let message = err.to_string();
        assert!(message.starts_with("Failed to decode 'models/cube.obj': "));
        assert!(std::error::Error::source(&err).is_some());
    }
}
