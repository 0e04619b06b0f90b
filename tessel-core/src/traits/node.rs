//! Node trait: the unit of deferred work.

use crate::error::Result;
use crate::types::NodeId;

/// A deferred, identifiable unit of work.
///
/// Implementations capture their inputs at construction time and pre-register
/// any output handles they will resolve. The id must come from the executor
/// the node is submitted to, so that submission order matches id order.
///
/// # Example
///
/// ```
/// use tessel_core::{Node, NodeId, Result};
///
/// struct Increment {
///     id: NodeId,
///     counter: std::sync::Arc<std::sync::atomic::AtomicU64>,
/// }
///
/// impl Node for Increment {
///     fn id(&self) -> NodeId {
///         self.id
///     }
///
///     fn run(&mut self) -> Result<()> {
///         self.counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
///         Ok(())
///     }
/// }
/// ```
pub trait Node: Send {
    /// The id assigned to this node at construction.
    fn id(&self) -> NodeId;

    /// Run the work synchronously.
    ///
    /// Called at most once, on the executor's worker thread, after every node
    /// with a smaller id has completed.
    fn run(&mut self) -> Result<()>;

    /// Short label used in logs.
    fn name(&self) -> &str {
        "node"
    }
}

impl<N: Node + ?Sized> Node for Box<N> {
    fn id(&self) -> NodeId {
        (**self).id()
    }

    fn run(&mut self) -> Result<()> {
        (**self).run()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
