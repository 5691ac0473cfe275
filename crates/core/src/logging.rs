//! Logging initialization.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Default filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info,objview=debug,naga=warn";

/// Initialize the logging system with tracing.
///
/// Filtering follows `RUST_LOG` when present and falls back to
/// [`DEFAULT_FILTER`] otherwise.
///
/// # Example
/// ```
/// objview_core::init_logging();
/// tracing::info!("Viewer starting");
/// ```
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // A second call (e.g. from several doctests in one process) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }

    #[test]
    fn test_init_logging_twice_is_harmless() {
        init_logging();
        init_logging();
        tracing::debug!("logging initialized twice");
    }
}
