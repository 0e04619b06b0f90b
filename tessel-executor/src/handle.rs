//! Result handles for queued nodes.
//!
//! A [`Handle`] is returned to the caller at submission time and becomes
//! ready once the producing node runs. The paired [`Resolver`] is owned by
//! the node and is the only way to make a pending handle ready.

use crate::scheduler::{Executor, Shared};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use tessel_core::error::{Result, TesselError};
use tessel_core::types::NodeId;

enum Slot<T> {
    /// Waiting on the producer; holds the owning executor.
    Pending(Weak<Shared>),
    Ready(Arc<T>),
    /// The resolver was dropped without a value.
    Abandoned(Weak<Shared>),
}

enum Readiness {
    Ready,
    Pending(Weak<Shared>),
    Abandoned(Weak<Shared>),
}

struct Cell<T> {
    producer: NodeId,
    slot: Mutex<Slot<T>>,
}

/// Shared, read-only view of a node's output.
///
/// Cloning a handle is cheap; all clones observe the same value.
pub struct Handle<T> {
    cell: Arc<Cell<T>>,
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("producer", &self.cell.producer)
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl<T> Handle<T> {
    /// A handle that is ready from the start.
    pub fn ready(value: T) -> Self {
        Self {
            cell: Arc::new(Cell {
                producer: NodeId::NONE,
                slot: Mutex::new(Slot::Ready(Arc::new(value))),
            }),
        }
    }

    /// A handle that becomes ready when `producer` resolves it.
    ///
    /// The resolver belongs inside the producing node. The node must be
    /// submitted to `executor` before any reader blocks on the handle.
    pub fn pending(executor: &Executor, producer: NodeId) -> (Self, Resolver<T>) {
        let cell = Arc::new(Cell {
            producer,
            slot: Mutex::new(Slot::Pending(executor.downgrade())),
        });
        let resolver = Resolver {
            cell: Some(Arc::clone(&cell)),
        };
        (Self { cell }, resolver)
    }

    /// Id of the node producing this value. `NodeId::NONE` for ready handles.
    pub fn producer(&self) -> NodeId {
        self.cell.producer
    }

    /// Whether the value is available without blocking.
    pub fn is_ready(&self) -> bool {
        matches!(*self.cell.slot.lock(), Slot::Ready(_))
    }

    /// The value, if already available.
    pub fn try_value(&self) -> Option<Arc<T>> {
        match &*self.cell.slot.lock() {
            Slot::Ready(value) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    /// Block until the producer has run.
    ///
    /// Returns the owning executor's sticky error if the producer failed or
    /// was discarded, and [`TesselError::ExecutorShutdown`] if the executor
    /// no longer exists.
    pub fn wait_ready(&self) -> Result<()> {
        let owner = match self.readiness() {
            Readiness::Ready => return Ok(()),
            Readiness::Abandoned(owner) => return Err(self.abandoned(owner)),
            Readiness::Pending(owner) => owner,
        };

        let shared = owner.upgrade().ok_or(TesselError::ExecutorShutdown)?;
        shared.wait_for(self.cell.producer)?;
        drop(shared);

        match self.readiness() {
            Readiness::Ready => Ok(()),
            Readiness::Abandoned(owner) => Err(self.abandoned(owner)),
            // The worker is past the producer but nothing resolved it.
            Readiness::Pending(_) => Err(TesselError::NodeDiscarded {
                node_id: self.cell.producer,
            }),
        }
    }

    /// Block until ready, then return the value.
    pub fn value(&self) -> Result<Arc<T>> {
        self.wait_ready()?;
        self.try_value().ok_or(TesselError::NodeDiscarded {
            node_id: self.cell.producer,
        })
    }

    /// Copy of the slot state, taken without holding the lock afterwards.
    fn readiness(&self) -> Readiness {
        match &*self.cell.slot.lock() {
            Slot::Ready(_) => Readiness::Ready,
            Slot::Pending(owner) => Readiness::Pending(owner.clone()),
            Slot::Abandoned(owner) => Readiness::Abandoned(owner.clone()),
        }
    }

    /// Called with the slot lock released.
    fn abandoned(&self, owner: Weak<Shared>) -> TesselError {
        owner
            .upgrade()
            .and_then(|shared| shared.status().err())
            .unwrap_or(TesselError::NodeDiscarded {
                node_id: self.cell.producer,
            })
    }
}

/// Write side of a pending [`Handle`].
///
/// Dropping an unresolved resolver marks the handle abandoned.
pub struct Resolver<T> {
    cell: Option<Arc<Cell<T>>>,
}

impl<T> Resolver<T> {
    /// Id of the node this resolver belongs to.
    pub fn producer(&self) -> NodeId {
        self.cell
            .as_ref()
            .map_or(NodeId::NONE, |cell| cell.producer)
    }

    /// Publish the value to every clone of the handle.
    pub fn resolve(mut self, value: T) {
        if let Some(cell) = self.cell.take() {
            *cell.slot.lock() = Slot::Ready(Arc::new(value));
        }
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        let Some(cell) = self.cell.take() else {
            return;
        };
        let mut slot = cell.slot.lock();
        if let Slot::Pending(owner) = &*slot {
            tracing::trace!(node_id = %cell.producer, "Handle abandoned");
            *slot = Slot::Abandoned(owner.clone());
        }
    }
}
