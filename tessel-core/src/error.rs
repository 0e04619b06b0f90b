//! Error types for tessel.
//!
//! Every error carries the identifiers needed to locate the failing node.
//! Errors are `Clone` because a single failure is captured once by the
//! executor and then handed to every caller that queries it.

use crate::types::NodeId;
use thiserror::Error;

/// The main error type for tessel operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TesselError {
    // =========================================================================
    // Ordering Errors (E100-E199)
    // =========================================================================
    /// A node was submitted with an id not greater than the last queued id.
    #[error("E101: Inserting node with non-increasing id: {last} vs {got}")]
    OrderingViolation {
        /// Id of the last node in the queue.
        last: NodeId,
        /// Id of the rejected node.
        got: NodeId,
    },

    /// A node was submitted before the worker was started.
    #[error("E102: Node {node_id} submitted before async execution was enabled")]
    NotStarted {
        /// The node that was rejected.
        node_id: NodeId,
    },

    // =========================================================================
    // Node Execution Errors (E200-E299)
    // =========================================================================
    /// Node execution failed.
    #[error("E201: Node {node_id} execution failed: {cause}")]
    NodeExecution {
        /// The node that failed to execute.
        node_id: NodeId,
        /// Reason for the execution failure.
        cause: String,
    },

    /// Node panicked while running.
    #[error("E202: Node {node_id} panicked: {message}")]
    NodePanic {
        /// The node that panicked.
        node_id: NodeId,
        /// The panic message.
        message: String,
    },

    /// Node was dropped without running.
    #[error("E203: Node {node_id} was discarded before producing its result")]
    NodeDiscarded {
        /// The node that never ran.
        node_id: NodeId,
    },

    // =========================================================================
    // Executor Lifecycle Errors (E300-E399)
    // =========================================================================
    /// The background worker thread could not be started.
    #[error("E301: Failed to spawn executor worker: {cause}")]
    WorkerSpawn {
        /// Reason for the spawn failure.
        cause: String,
    },

    /// The executor shut down before the awaited node completed.
    #[error("E302: Executor shut down")]
    ExecutorShutdown,

    /// `clear_error` was called while work or waiters were still registered.
    #[error("E303: Cannot clear error with {pending} pending nodes and {waiters} waiters")]
    ClearWhileBusy {
        /// Number of nodes still queued.
        pending: usize,
        /// Number of registered waiters.
        waiters: usize,
    },

    /// A node tried to wait on the executor that is running it.
    #[error("E304: Waiting for {node_id} from the executor worker would deadlock")]
    WaitOnWorker {
        /// The node that was awaited.
        node_id: NodeId,
    },

    // =========================================================================
    // Configuration Errors (E400-E499)
    // =========================================================================
    /// Invalid configuration value.
    #[error("E401: Invalid configuration '{field}': {cause}")]
    ConfigValue {
        /// The configuration field with invalid value.
        field: String,
        /// Description of why the value is invalid.
        cause: String,
    },
}

impl TesselError {
    /// Get the error code (e.g., "E101").
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::OrderingViolation { .. } => "E101",
            Self::NotStarted { .. } => "E102",
            Self::NodeExecution { .. } => "E201",
            Self::NodePanic { .. } => "E202",
            Self::NodeDiscarded { .. } => "E203",
            Self::WorkerSpawn { .. } => "E301",
            Self::ExecutorShutdown => "E302",
            Self::ClearWhileBusy { .. } => "E303",
            Self::WaitOnWorker { .. } => "E304",
            Self::ConfigValue { .. } => "E401",
        }
    }

    /// Shorthand for a [`TesselError::NodeExecution`].
    pub fn node_failed(node_id: NodeId, cause: impl Into<String>) -> Self {
        Self::NodeExecution {
            node_id,
            cause: cause.into(),
        }
    }

    /// The node this error is attributed to, if any.
    #[must_use]
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            Self::OrderingViolation { got, .. } => Some(*got),
            Self::NotStarted { node_id }
            | Self::NodeExecution { node_id, .. }
            | Self::NodePanic { node_id, .. }
            | Self::NodeDiscarded { node_id }
            | Self::WaitOnWorker { node_id } => Some(*node_id),
            _ => None,
        }
    }

    /// Check if this error poisons an executor once captured.
    ///
    /// These are the failures the worker and `add` record as sticky state.
    #[must_use]
    pub fn is_sticky_cause(&self) -> bool {
        matches!(
            self,
            Self::OrderingViolation { .. }
                | Self::NotStarted { .. }
                | Self::NodeExecution { .. }
                | Self::NodePanic { .. }
        )
    }

    /// Check if this error reports misuse of the executor API.
    #[must_use]
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::OrderingViolation { .. }
                | Self::NotStarted { .. }
                | Self::ClearWhileBusy { .. }
                | Self::WaitOnWorker { .. }
                | Self::ConfigValue { .. }
        )
    }
}

/// Result type alias using `TesselError`.
pub type Result<T> = std::result::Result<T, TesselError>;

/// Extension trait for adding node context to foreign errors.
pub trait ResultExt<T> {
    /// Convert the error into a [`TesselError::NodeExecution`] for `node_id`.
    fn with_node(self, node_id: NodeId) -> Result<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for std::result::Result<T, E> {
    fn with_node(self, node_id: NodeId) -> Result<T> {
        self.map_err(|e| TesselError::NodeExecution {
            node_id,
            cause: e.to_string(),
        })
    }
}
