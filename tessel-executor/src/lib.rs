//! Tessel Executor - ordered background execution of deferred nodes.
//!
//! This crate provides:
//! - A single-worker [`Executor`](scheduler::Executor) running nodes in id order
//! - Sticky error handling that aborts queued work after the first failure
//! - [`Handle`](handle::Handle)s that block readers until their producer ran
//! - [`FnNode`](node::FnNode) for closure-backed work
//! - [`EagerContext`](context::EagerContext) choosing inline or queued
//!   execution per thread
//! - Tracing subscriber setup

#![warn(missing_docs)]

pub mod context;
pub mod handle;
pub mod node;
pub mod observability;
pub mod scheduler;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::context::{ContextConfig, EagerContext};
    pub use crate::handle::{Handle, Resolver};
    pub use crate::node::FnNode;
    pub use crate::observability::{LogFormat, TracingConfig, init_tracing};
    pub use crate::scheduler::{Executor, ExecutorConfig, ExecutorStats, Health};
    pub use tessel_core::prelude::*;
}
