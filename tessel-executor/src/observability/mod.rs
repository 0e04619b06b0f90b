//! Structured logging setup.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the application. [`init_tracing`] is a ready-made one.
//!
//! Logging format is controlled via `TESSEL_LOG_FORMAT`:
//! - `json` - one JSON object per event
//! - `pretty` - multi-line colored output (default for a TTY)
//! - `compact` - single-line output
//!
//! # Example
//!
//! ```ignore
//! use tessel_executor::observability::{LogFormat, TracingConfig, init_tracing};
//!
//! let config = TracingConfig::builder()
//!     .log_format(LogFormat::Json)
//!     .log_filter("info,tessel_executor=debug")
//!     .build();
//! let _guard = init_tracing(config)?;
//! ```

mod config;
mod tracing_setup;

pub use config::{LogFormat, TracingConfig, TracingConfigBuilder};
pub use tracing_setup::{TracingGuard, init_tracing};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = TracingConfig::default();
        assert_eq!(config.log_filter(), "info");
        assert!(config.include_thread_names());
        assert!(!config.include_thread_ids());
    }

    #[test]
    fn config_from_env() {
        let config = TracingConfig::from_env();
        assert!(!config.log_filter().is_empty());
    }
}
