use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use weavecore::{NodeRunState, PortValues, WorkflowRunState};

/// Called on every node state transition with a read-only snapshot
pub type NodeStateCallback = Arc<dyn Fn(&str, &NodeRunState) + Send + Sync>;

/// Called exactly once when the run ends
pub type CompleteCallback = Box<dyn FnOnce(&WorkflowRunState) + Send>;

/// Per-run options: observers, run inputs and limits
#[derive(Default)]
pub struct RunOptions {
    pub(crate) on_node_state_change: Option<NodeStateCallback>,
    pub(crate) on_complete: Option<CompleteCallback>,
    pub(crate) inputs: PortValues,
    pub(crate) node_timeout: Option<Duration>,
    pub(crate) max_parallel: Option<usize>,
    pub(crate) cancellation: CancellationToken,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_node_state_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, &NodeRunState) + Send + Sync + 'static,
    {
        self.on_node_state_change = Some(Arc::new(callback));
        self
    }

    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&WorkflowRunState) + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// Values handed to root nodes (no incoming edges) for handles that
    /// nothing else fills
    pub fn with_inputs(mut self, inputs: PortValues) -> Self {
        self.inputs = inputs;
        self
    }

    /// Default timeout for each executor call. Nodes may override it.
    pub fn with_node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout = Some(timeout);
        self
    }

    /// Cap on executors in flight at once
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = Some(max_parallel.max(1));
        self
    }

    /// Token the caller cancels to stop the run
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("on_node_state_change", &self.on_node_state_change.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("inputs", &self.inputs)
            .field("node_timeout", &self.node_timeout)
            .field("max_parallel", &self.max_parallel)
            .finish()
    }
}
