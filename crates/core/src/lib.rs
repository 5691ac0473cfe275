//! Core utilities for the OBJ viewer.
//!
//! This crate provides foundational types used across the workspace:
//! - Error types and result aliases
//! - Logging initialization
//! - Frame timer
//! - Viewer configuration

mod config;
mod error;
mod logging;
mod timer;

pub use config::{FALLBACK_MODELS, ViewerConfig};
pub use error::{Error, Result};
pub use logging::{DEFAULT_FILTER, init_logging};
pub use timer::Timer;
