//! Executor configuration.

use serde::{Deserialize, Serialize};
use tessel_core::error::{Result, TesselError};

/// Smallest stack accepted for the worker thread.
pub const MIN_STACK_SIZE: usize = 64 * 1024;

/// Configuration for an [`Executor`](super::Executor).
///
/// # Example
///
/// ```
/// use tessel_executor::scheduler::ExecutorConfig;
///
/// let config = ExecutorConfig::default()
///     .with_thread_name("ops")
///     .with_stack_size(4 * 1024 * 1024);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Name given to the background worker thread.
    #[serde(default = "default_thread_name")]
    pub thread_name: String,

    /// Stack size for the worker thread. `None` uses the platform default.
    #[serde(default)]
    pub stack_size: Option<usize>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            thread_name: default_thread_name(),
            stack_size: None,
        }
    }
}

impl ExecutorConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `TESSEL_EXECUTOR_THREAD_NAME`: Worker thread name
    /// - `TESSEL_EXECUTOR_STACK_SIZE`: Worker stack size in bytes
    ///
    /// Unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let thread_name = std::env::var("TESSEL_EXECUTOR_THREAD_NAME")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(default_thread_name);

        let stack_size = std::env::var("TESSEL_EXECUTOR_STACK_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok());

        Self {
            thread_name,
            stack_size,
        }
    }

    /// Set the worker thread name.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Set the worker stack size in bytes.
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Check that the configuration can be used to start a worker.
    pub fn validate(&self) -> Result<()> {
        if self.thread_name.is_empty() {
            return Err(TesselError::ConfigValue {
                field: "thread_name".to_string(),
                cause: "must not be empty".to_string(),
            });
        }
        if self.thread_name.contains('\0') {
            return Err(TesselError::ConfigValue {
                field: "thread_name".to_string(),
                cause: "must not contain NUL bytes".to_string(),
            });
        }
        if let Some(size) = self.stack_size {
            if size < MIN_STACK_SIZE {
                return Err(TesselError::ConfigValue {
                    field: "stack_size".to_string(),
                    cause: format!("{size} bytes is below the minimum of {MIN_STACK_SIZE}"),
                });
            }
        }
        Ok(())
    }
}

fn default_thread_name() -> String {
    "eager_async_executor".to_string()
}
