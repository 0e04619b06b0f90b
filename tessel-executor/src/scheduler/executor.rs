//! Ordered single-worker executor.
//!
//! Nodes submitted from any thread are queued in id order and run one at a
//! time on a dedicated background thread. Callers block on `wait_for` or
//! `wait_for_all_pending` until the nodes they care about have completed.
//!
//! ## Failure model
//!
//! The first failure (a node error, a node panic, or a submission that breaks
//! id ordering) becomes a sticky error:
//! - every node still queued is discarded without running
//! - every blocked waiter is woken and observes the error
//! - later submissions are dropped silently
//! - `status` keeps returning the error until `clear_error` succeeds
//!
//! Because exactly one worker exists, a node whose id is below the smallest
//! pending id is known to be finished. `wait_for` relies on this.

use super::config::ExecutorConfig;
use super::stats::{Counters, ExecutorStats};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::collections::{BTreeMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle, ThreadId};
use tessel_core::error::{Result, TesselError};
use tessel_core::traits::Node;
use tessel_core::types::NodeId;
use tracing::instrument;

/// Sticky error state of an executor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Health {
    /// No failure recorded; the worker picks up new nodes.
    #[default]
    Healthy,
    /// A failure was captured; nothing runs until it is cleared.
    Failed(TesselError),
}

impl Health {
    /// Whether no failure is recorded.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// The recorded failure as a `Result`.
    pub fn check(&self) -> Result<()> {
        match self {
            Self::Healthy => Ok(()),
            Self::Failed(err) => Err(err.clone()),
        }
    }

    /// Record a failure. The first failure wins.
    fn fail(&mut self, err: TesselError) {
        if self.is_healthy() {
            *self = Self::Failed(err);
        }
    }
}

const WAITING: u8 = 0;
const COMPLETED: u8 = 1;
const SHUTDOWN: u8 = 2;

/// One blocked caller. Signalled while the state lock is held.
struct WaitSlot {
    cond: Condvar,
    signal: AtomicU8,
}

impl WaitSlot {
    fn new() -> Self {
        Self {
            cond: Condvar::new(),
            signal: AtomicU8::new(WAITING),
        }
    }

    fn wake(&self, signal: u8) {
        self.signal.store(signal, Ordering::Relaxed);
        self.cond.notify_all();
    }

    fn signal(&self) -> u8 {
        self.signal.load(Ordering::Relaxed)
    }
}

enum WaitTarget {
    Node(NodeId),
    AllPending,
}

/// A submitted node with the id it was accepted under.
///
/// The id is captured at submission so the worker only touches the node
/// inside panic guards.
struct Queued {
    id: NodeId,
    node: Box<dyn Node>,
}

/// Everything guarded by the executor lock.
struct State {
    pending: VecDeque<Queued>,
    /// Node taken off the queue and currently running. Still pending for waiters.
    running: Option<NodeId>,
    waiters: BTreeMap<NodeId, Vec<Arc<WaitSlot>>>,
    health: Health,
    next_id: u64,
    started: bool,
    worker_thread: Option<ThreadId>,
    shutting_down: bool,
}

impl State {
    fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            running: None,
            waiters: BTreeMap::new(),
            health: Health::Healthy,
            next_id: 1,
            started: false,
            worker_thread: None,
            shutting_down: false,
        }
    }

    fn first_pending(&self) -> Option<NodeId> {
        self.running.or_else(|| self.pending.front().map(|q| q.id))
    }

    fn last_pending(&self) -> Option<NodeId> {
        self.pending.back().map(|q| q.id).or(self.running)
    }

    fn pending_len(&self) -> usize {
        self.pending.len() + usize::from(self.running.is_some())
    }

    fn waiter_count(&self) -> usize {
        self.waiters.values().map(Vec::len).sum()
    }

    /// Wake waiters registered for `node_id` or any earlier id.
    fn wake_through(&mut self, node_id: NodeId) {
        let later = self.waiters.split_off(&node_id.next());
        let done = std::mem::replace(&mut self.waiters, later);
        for slot in done.into_values().flatten() {
            slot.wake(COMPLETED);
        }
    }

    fn wake_all(&mut self, signal: u8) {
        for slot in std::mem::take(&mut self.waiters).into_values().flatten() {
            slot.wake(signal);
        }
    }

    /// Record a sticky failure, drain the queue, and wake every waiter.
    ///
    /// Returns the drained nodes so they can be dropped outside the lock.
    fn poison(&mut self, err: TesselError) -> Vec<Queued> {
        self.health.fail(err);
        let drained: Vec<_> = self.pending.drain(..).collect();
        self.wake_all(COMPLETED);
        drained
    }
}

/// State shared between the executor, its worker and outstanding handles.
pub(crate) struct Shared {
    state: Mutex<State>,
    work_available: Condvar,
    counters: Counters,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(State::new()),
            work_available: Condvar::new(),
            counters: Counters::default(),
        }
    }

    pub(crate) fn status(&self) -> Result<()> {
        self.state.lock().health.check()
    }

    pub(crate) fn wait_for(&self, node_id: NodeId) -> Result<()> {
        self.wait(WaitTarget::Node(node_id))
    }

    fn wait(&self, target: WaitTarget) -> Result<()> {
        let mut state = self.state.lock();
        state.health.check()?;

        let Some(first) = state.first_pending() else {
            return Ok(());
        };
        let node_id = match target {
            WaitTarget::AllPending => state.last_pending().unwrap_or(first),
            // In-order dispatch means anything below the head already ran.
            WaitTarget::Node(node_id) if node_id < first => return Ok(()),
            WaitTarget::Node(node_id) => node_id,
        };

        if state.worker_thread == Some(thread::current().id()) {
            return Err(TesselError::WaitOnWorker { node_id });
        }

        let slot = Arc::new(WaitSlot::new());
        state
            .waiters
            .entry(node_id)
            .or_default()
            .push(Arc::clone(&slot));
        tracing::trace!(node_id = %node_id, "Waiting for node");

        while slot.signal() == WAITING {
            slot.cond.wait(&mut state);
        }

        // A failure wakes everyone, whether or not the awaited node ran.
        state.health.check()?;
        if slot.signal() == SHUTDOWN {
            return Err(TesselError::ExecutorShutdown);
        }
        Ok(())
    }
}

/// Ordered executor with one background worker.
///
/// # Example
///
/// ```
/// use tessel_executor::node::FnNode;
/// use tessel_executor::scheduler::{Executor, ExecutorConfig};
///
/// let executor = Executor::new(ExecutorConfig::default());
/// executor.enable_async().unwrap();
///
/// let (node, handle) = FnNode::new(&executor, "answer", || Ok(42_u32));
/// executor.add(node);
///
/// assert_eq!(*handle.value().unwrap(), 42);
/// executor.wait_for_all_pending().unwrap();
/// ```
pub struct Executor {
    shared: Arc<Shared>,
    config: ExecutorConfig,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Executor {
    /// Create an executor. The worker is not started until [`enable_async`](Self::enable_async).
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            config,
            worker: Mutex::new(None),
        }
    }

    /// Create an executor with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ExecutorConfig::default())
    }

    /// The configuration this executor was built with.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Allocate a fresh, strictly increasing node id.
    pub fn next_id(&self) -> NodeId {
        let mut state = self.shared.state.lock();
        let id = NodeId::new(state.next_id);
        state.next_id += 1;
        id
    }

    /// Start the background worker if it is not running yet.
    ///
    /// Calling this more than once is a no-op.
    #[instrument(skip(self), fields(thread = %self.config.thread_name))]
    pub fn enable_async(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.started {
            return Ok(());
        }
        self.config.validate()?;

        let mut builder = thread::Builder::new().name(self.config.thread_name.clone());
        if let Some(size) = self.config.stack_size {
            builder = builder.stack_size(size);
        }
        let shared = Arc::clone(&self.shared);
        let handle = builder
            .spawn(move || run_worker(shared))
            .map_err(|e| TesselError::WorkerSpawn {
                cause: e.to_string(),
            })?;

        state.started = true;
        state.worker_thread = Some(handle.thread().id());
        *self.worker.lock() = Some(handle);
        tracing::info!("Async execution enabled");
        Ok(())
    }

    /// Whether the background worker has been started.
    pub fn is_async(&self) -> bool {
        self.shared.state.lock().started
    }

    /// Submit a node for execution.
    ///
    /// Never reports an error to the caller. If the executor already holds a
    /// sticky error the node is dropped; if the node's id is not greater than
    /// the last queued id, or the worker was never started, a sticky error is
    /// recorded and the node is dropped. Use [`status`](Self::status) to
    /// observe either outcome.
    pub fn add<N: Node + 'static>(&self, node: N) {
        self.add_boxed(Box::new(node));
    }

    /// Submit an already boxed node. See [`add`](Self::add).
    pub fn add_boxed(&self, node: Box<dyn Node>) {
        let node_id = node.id();
        let node = Queued { id: node_id, node };
        let rejected = {
            let mut state = self.shared.state.lock();
            if !state.started {
                tracing::error!(node_id = %node_id, "Node submitted before async execution was enabled");
                let mut rejected = state.poison(TesselError::NotStarted { node_id });
                rejected.push(node);
                rejected
            } else if !state.health.is_healthy() {
                tracing::warn!(node_id = %node_id, node = node.node.name(), "Discarding node submitted after failure");
                vec![node]
            } else if let Some(last) = state.last_pending().filter(|last| node_id <= *last) {
                let err = TesselError::OrderingViolation {
                    last,
                    got: node_id,
                };
                tracing::error!(error = %err, "Rejecting out-of-order node");
                let mut rejected = state.poison(err);
                rejected.push(node);
                rejected
            } else {
                let was_empty = state.pending.is_empty();
                tracing::debug!(node_id = %node_id, node = node.node.name(), "Enqueued node");
                state.pending.push_back(node);
                self.shared.counters.record_submitted();
                if was_empty {
                    self.shared.work_available.notify_one();
                }
                Vec::new()
            }
        };

        if !rejected.is_empty() {
            self.shared.counters.record_discarded(rejected.len());
        }
        drop(rejected);
    }

    /// Block until `node_id` has completed.
    ///
    /// Returns immediately with the sticky error if one is set, or with `Ok`
    /// when nothing is pending or `node_id` is below every pending id. The
    /// caller must have submitted `node_id` before waiting on it.
    pub fn wait_for(&self, node_id: NodeId) -> Result<()> {
        self.shared.wait(WaitTarget::Node(node_id))
    }

    /// Block until every node queued at call time has completed or been discarded.
    pub fn wait_for_all_pending(&self) -> Result<()> {
        self.shared.wait(WaitTarget::AllPending)
    }

    /// The sticky error, if any. Never blocks on pending work.
    pub fn status(&self) -> Result<()> {
        self.shared.status()
    }

    /// The current health state.
    pub fn health(&self) -> Health {
        self.shared.state.lock().health.clone()
    }

    /// Reset a sticky error so new nodes run again.
    ///
    /// The failure must have fully drained: no queued or running nodes and
    /// no registered waiters. Otherwise [`TesselError::ClearWhileBusy`] is
    /// returned and the error stays in place.
    #[instrument(skip(self))]
    pub fn clear_error(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.health.is_healthy() {
            return Ok(());
        }

        let pending = state.pending_len();
        let waiters = state.waiter_count();
        if pending > 0 || waiters > 0 {
            tracing::warn!(pending, waiters, "Refusing to clear error on a busy executor");
            return Err(TesselError::ClearWhileBusy { pending, waiters });
        }

        state.health = Health::Healthy;
        self.shared.work_available.notify_all();
        tracing::info!("Executor error cleared");
        Ok(())
    }

    /// Number of nodes queued or running.
    pub fn pending_len(&self) -> usize {
        self.shared.state.lock().pending_len()
    }

    /// Snapshot of the execution counters.
    pub fn stats(&self) -> ExecutorStats {
        let pending = self.pending_len();
        self.shared.counters.snapshot(pending)
    }

    pub(crate) fn downgrade(&self) -> Weak<Shared> {
        Arc::downgrade(&self.shared)
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        let worker_thread = {
            let mut state = self.shared.state.lock();
            state.shutting_down = true;
            if !state.started {
                state.wake_all(SHUTDOWN);
            }
            state.worker_thread
        };
        self.shared.work_available.notify_all();

        let Some(handle) = self.worker.lock().take() else {
            return;
        };
        if worker_thread == Some(thread::current().id()) {
            tracing::debug!("Executor dropped on its own worker; detaching");
            return;
        }
        if handle.join().is_err() {
            tracing::error!("Executor worker terminated abnormally");
        }
    }
}

/// Worker loop: runs nodes in id order until shutdown.
fn run_worker(shared: Arc<Shared>) {
    tracing::debug!("Executor worker started");
    loop {
        let Queued { id: node_id, mut node } = {
            let mut state = shared.state.lock();
            loop {
                if state.health.is_healthy() {
                    if let Some(queued) = state.pending.pop_front() {
                        state.running = Some(queued.id);
                        break queued;
                    }
                }
                if state.shutting_down {
                    state.wake_all(SHUTDOWN);
                    tracing::debug!("Executor worker stopped");
                    return;
                }
                shared.work_available.wait(&mut state);
            }
        };

        let outcome = run_guarded(node_id, node.as_mut());

        let mut finished = {
            let mut state = shared.state.lock();
            state.running = None;
            match outcome {
                Ok(()) => {
                    shared.counters.record_completed();
                    state.wake_through(node_id);
                    Vec::new()
                }
                Err(err) => {
                    shared.counters.record_failed();
                    let drained = state.poison(err.clone());
                    shared.counters.record_discarded(drained.len());
                    tracing::error!(
                        node_id = %node_id,
                        error = %err,
                        discarded = drained.len(),
                        "Node failed; aborting pending nodes"
                    );
                    drained
                }
            }
        };

        finished.insert(0, Queued { id: node_id, node });
        release(&shared, finished);
    }
}

/// Run a node, turning a panic into [`TesselError::NodePanic`].
fn run_guarded(node_id: NodeId, node: &mut dyn Node) -> Result<()> {
    panic::catch_unwind(AssertUnwindSafe(|| {
        let _span = tracing::debug_span!("node_run", node_id = %node_id, node = node.name())
            .entered();
        node.run()
    }))
    .unwrap_or_else(|payload| {
        Err(TesselError::NodePanic {
            node_id,
            message: panic_message(payload.as_ref()),
        })
    })
}

/// Drop finished and drained nodes outside the lock.
///
/// A panicking drop poisons the executor like a failed run, which may drain
/// more nodes; those are released in turn.
fn release(shared: &Shared, mut nodes: Vec<Queued>) {
    while !nodes.is_empty() {
        let mut drained = Vec::new();
        for Queued { id, node } in nodes {
            let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || drop(node))) else {
                continue;
            };
            let err = TesselError::NodePanic {
                node_id: id,
                message: panic_message(payload.as_ref()),
            };
            let mut state = shared.state.lock();
            let more = state.poison(err.clone());
            shared.counters.record_discarded(more.len());
            tracing::error!(
                node_id = %id,
                error = %err,
                discarded = more.len(),
                "Node panicked while being dropped; aborting pending nodes"
            );
            drained.extend(more);
        }
        nodes = drained;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
