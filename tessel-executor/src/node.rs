//! Closure-backed nodes.

use crate::handle::{Handle, Resolver};
use crate::scheduler::Executor;
use std::fmt;
use tessel_core::error::{Result, TesselError};
use tessel_core::traits::Node;
use tessel_core::types::NodeId;

/// A node that runs a closure once and publishes its return value.
///
/// # Example
///
/// ```
/// use tessel_executor::node::FnNode;
/// use tessel_executor::scheduler::Executor;
///
/// let executor = Executor::with_defaults();
/// executor.enable_async().unwrap();
///
/// let (node, sum) = FnNode::new(&executor, "sum", || Ok((1..=10).sum::<u32>()));
/// executor.add(node);
/// assert_eq!(*sum.value().unwrap(), 55);
/// ```
pub struct FnNode<T, F> {
    id: NodeId,
    name: String,
    work: Option<F>,
    resolver: Option<Resolver<T>>,
}

impl<T, F> FnNode<T, F>
where
    F: FnOnce() -> Result<T> + Send,
    T: Send + Sync,
{
    /// Allocate an id on `executor` and pair the node with its output handle.
    pub fn new(executor: &Executor, name: impl Into<String>, work: F) -> (Self, Handle<T>) {
        let id = executor.next_id();
        let (handle, resolver) = Handle::pending(executor, id);
        let node = Self {
            id,
            name: name.into(),
            work: Some(work),
            resolver: Some(resolver),
        };
        (node, handle)
    }
}

impl<T, F> fmt::Debug for FnNode<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("ran", &self.work.is_none())
            .finish()
    }
}

impl<T, F> Node for FnNode<T, F>
where
    F: FnOnce() -> Result<T> + Send,
    T: Send + Sync,
{
    fn id(&self) -> NodeId {
        self.id
    }

    fn run(&mut self) -> Result<()> {
        let work = self
            .work
            .take()
            .ok_or_else(|| TesselError::node_failed(self.id, format!("{} already ran", self.name)))?;

        let value = work().map_err(|err| match err {
            TesselError::NodeExecution { cause, .. } => TesselError::NodeExecution {
                node_id: self.id,
                cause: format!("Got error \"{cause}\" while running {}", self.name),
            },
            other => other,
        })?;

        if let Some(resolver) = self.resolver.take() {
            resolver.resolve(value);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
