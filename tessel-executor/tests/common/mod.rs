//! Common test utilities for integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tessel_core::error::{Result, TesselError};
use tessel_core::traits::Node;
use tessel_core::types::NodeId;
use tessel_executor::handle::{Handle, Resolver};
use tessel_executor::scheduler::{Executor, ExecutorConfig};

/// Ids of nodes in the order they ran.
pub type RunLog = Arc<Mutex<Vec<NodeId>>>;

/// Appends its id to a shared log and publishes it through a handle.
pub struct RecordingNode {
    id: NodeId,
    log: RunLog,
    resolver: Option<Resolver<NodeId>>,
}

impl RecordingNode {
    /// Allocate the next id on `executor`.
    pub fn new(executor: &Executor, log: &RunLog) -> (Self, Handle<NodeId>) {
        let id = executor.next_id();
        let (handle, resolver) = Handle::pending(executor, id);
        let node = Self {
            id,
            log: Arc::clone(log),
            resolver: Some(resolver),
        };
        (node, handle)
    }

    /// A node with a caller-chosen id and no output.
    pub fn with_id(id: NodeId, log: &RunLog) -> Self {
        Self {
            id,
            log: Arc::clone(log),
            resolver: None,
        }
    }
}

impl Node for RecordingNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn run(&mut self) -> Result<()> {
        self.log.lock().push(self.id);
        if let Some(resolver) = self.resolver.take() {
            resolver.resolve(self.id);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Always fails with a node execution error.
pub struct FailingNode {
    id: NodeId,
}

impl FailingNode {
    /// Allocate the next id on `executor`.
    pub fn new(executor: &Executor) -> Self {
        Self {
            id: executor.next_id(),
        }
    }
}

impl Node for FailingNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn run(&mut self) -> Result<()> {
        Err(TesselError::node_failed(self.id, "injected failure"))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Blocks the worker until its [`Gate`] is opened or dropped.
pub struct GatedNode {
    id: NodeId,
    entered: mpsc::Sender<()>,
    release: mpsc::Receiver<()>,
}

/// Observes and releases a [`GatedNode`].
pub struct Gate {
    entered: mpsc::Receiver<()>,
    release: mpsc::Sender<()>,
}

impl Gate {
    /// Block until the gated node is running on the worker.
    pub fn wait_entered(&self) {
        self.entered
            .recv_timeout(Duration::from_secs(5))
            .expect("gated node never started");
    }

    /// Let the gated node finish.
    pub fn open(self) {
        let _ = self.release.send(());
    }
}

impl GatedNode {
    /// Allocate the next id on `executor`.
    pub fn new(executor: &Executor) -> (Self, Gate) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let node = Self {
            id: executor.next_id(),
            entered: entered_tx,
            release: release_rx,
        };
        let gate = Gate {
            entered: entered_rx,
            release: release_tx,
        };
        (node, gate)
    }
}

impl Node for GatedNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn run(&mut self) -> Result<()> {
        let _ = self.entered.send(());
        let _ = self.release.recv();
        Ok(())
    }

    fn name(&self) -> &str {
        "gated"
    }
}

/// An executor with its worker running.
pub fn started_executor() -> Executor {
    let executor = Executor::new(ExecutorConfig::default().with_thread_name("tessel-test"));
    executor
        .enable_async()
        .expect("worker should start");
    executor
}

/// Poll `cond` until it holds or five seconds pass.
pub fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(1));
    }
}

/// Give another thread a chance to block.
pub fn settle() {
    thread::sleep(Duration::from_millis(50));
}
