//! Ordered executor and its configuration.
//!
//! The [`Executor`] owns a FIFO of nodes sorted by id and a single worker
//! thread that drains it. Waiters block on per-call condition variables and
//! are released once the worker passes the node they asked for, or
//! immediately when a failure poisons the executor.

mod config;
mod executor;
mod stats;

pub use config::{ExecutorConfig, MIN_STACK_SIZE};
pub use executor::{Executor, Health};
pub(crate) use executor::Shared;
pub use stats::ExecutorStats;
