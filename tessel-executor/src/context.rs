//! Eager dispatch front end.
//!
//! An [`EagerContext`] owns one executor and decides, per calling thread,
//! whether work runs inline or is queued behind earlier work.

use crate::handle::Handle;
use crate::node::FnNode;
use crate::scheduler::{Executor, ExecutorConfig};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::thread::{self, ThreadId};
use tessel_core::error::Result;
use tracing::instrument;

/// Configuration for an [`EagerContext`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Whether threads without an override queue work on the executor.
    #[serde(default)]
    pub async_default: bool,

    /// Executor settings.
    #[serde(default)]
    pub executor: ExecutorConfig,
}

impl ContextConfig {
    /// Create configuration from environment variables.
    ///
    /// Reads `TESSEL_ASYNC` ("true" or "1" to queue by default) plus the
    /// variables of [`ExecutorConfig::from_env`].
    pub fn from_env() -> Self {
        let async_default = std::env::var("TESSEL_ASYNC")
            .map(|s| s.eq_ignore_ascii_case("true") || s == "1")
            .unwrap_or(false);

        Self {
            async_default,
            executor: ExecutorConfig::from_env(),
        }
    }

    /// Set the default execution mode.
    pub fn with_async(mut self, enabled: bool) -> Self {
        self.async_default = enabled;
        self
    }

    /// Set the executor configuration.
    pub fn with_executor(mut self, executor: ExecutorConfig) -> Self {
        self.executor = executor;
        self
    }
}

/// Runs work inline or on the executor depending on the calling thread's mode.
///
/// # Example
///
/// ```
/// use tessel_executor::context::{ContextConfig, EagerContext};
///
/// let ctx = EagerContext::new(ContextConfig::default().with_async(true)).unwrap();
/// let a = ctx.execute("a", || Ok(2_u64)).unwrap();
/// let b = ctx.execute("b", || Ok(3_u64)).unwrap();
/// ctx.async_wait().unwrap();
/// assert_eq!(*a.value().unwrap() * *b.value().unwrap(), 6);
/// ```
pub struct EagerContext {
    executor: Executor,
    async_default: bool,
    thread_async: Mutex<HashMap<ThreadId, bool>>,
    /// Held across id allocation and submission so ids reach the queue in order.
    submit: Mutex<()>,
}

impl EagerContext {
    /// Create a context. Starts the worker when `async_default` is set.
    pub fn new(config: ContextConfig) -> Result<Self> {
        config.executor.validate()?;
        let ctx = Self {
            executor: Executor::new(config.executor),
            async_default: config.async_default,
            thread_async: Mutex::new(HashMap::new()),
            submit: Mutex::new(()),
        };
        if ctx.async_default {
            ctx.executor.enable_async()?;
        }
        tracing::debug!(async_default = ctx.async_default, "Eager context created");
        Ok(ctx)
    }

    /// Switch the calling thread between queued and inline execution.
    ///
    /// Switching off waits for every queued node first, so inline work
    /// observes the effects of earlier queued work. Only overrides of the
    /// context default are stored, so a thread should switch back before it
    /// exits.
    #[instrument(skip(self))]
    pub fn set_async_for_thread(&self, enabled: bool) -> Result<()> {
        if enabled {
            self.executor.enable_async()?;
        }
        {
            let mut modes = self.thread_async.lock();
            // Only overrides are stored; a thread back on the default holds no entry.
            if enabled == self.async_default {
                modes.remove(&thread::current().id());
            } else {
                modes.insert(thread::current().id(), enabled);
            }
        }
        if !enabled {
            self.executor.wait_for_all_pending()?;
        }
        Ok(())
    }

    /// Whether the calling thread queues work.
    pub fn is_async(&self) -> bool {
        self.thread_async
            .lock()
            .get(&thread::current().id())
            .copied()
            .unwrap_or(self.async_default)
    }

    /// Run `work` inline or queue it, per the calling thread's mode.
    ///
    /// Fails fast with the sticky error if one is held. In queued mode the
    /// returned handle becomes ready when the node runs; failures of the node
    /// itself surface through the handle and [`status`](Self::status).
    pub fn execute<T, F>(&self, name: &str, work: F) -> Result<Handle<T>>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + Sync + 'static,
    {
        self.executor.status()?;

        if !self.is_async() {
            return Ok(Handle::ready(work()?));
        }

        let _submit = self.submit.lock();
        let (node, handle) = FnNode::new(&self.executor, name, work);
        self.executor.add(node);
        Ok(handle)
    }

    /// Block until every queued node has run.
    pub fn async_wait(&self) -> Result<()> {
        self.executor.wait_for_all_pending()
    }

    /// The executor's sticky error, if any.
    pub fn status(&self) -> Result<()> {
        self.executor.status()
    }

    /// Reset the executor's sticky error.
    pub fn clear_error(&self) -> Result<()> {
        self.executor.clear_error()
    }

    /// The underlying executor.
    pub fn executor(&self) -> &Executor {
        &self.executor
    }
}

impl Drop for EagerContext {
    fn drop(&mut self) {
        if let Err(err) = self.executor.wait_for_all_pending() {
            tracing::warn!(error = %err, "Eager context dropped with a pending error");
        }
    }
}
