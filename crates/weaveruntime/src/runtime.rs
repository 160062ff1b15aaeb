use crate::resolver::{DependencyResolver, ExecutionPlan};
use crate::{ExecutorRegistry, RunOptions, WorkflowExecutor};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use weavecore::{Graph, WorkflowDefinition, WorkflowError, WorkflowRunState};

/// Main entry point: a registry plus the coordinator, with defaults
/// applied to every run
pub struct WeaveRuntime {
    registry: Arc<ExecutorRegistry>,
    executor: WorkflowExecutor,
    config: RuntimeConfig,
}

impl WeaveRuntime {
    /// Create a new runtime with default settings and an empty registry
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a new runtime with custom configuration
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_registry(Arc::new(ExecutorRegistry::new()), config)
    }

    /// Create a new runtime with a pre-configured registry
    pub fn with_registry(registry: Arc<ExecutorRegistry>, config: RuntimeConfig) -> Self {
        let executor = WorkflowExecutor::new(registry.clone());
        Self {
            registry,
            executor,
            config,
        }
    }

    /// Get access to the registry for registering executors
    pub fn registry(&self) -> &Arc<ExecutorRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Run a workflow. Limits left unset on `options` come from the config.
    pub async fn run(&self, definition: &WorkflowDefinition, options: RunOptions) -> WorkflowRunState {
        let options = self.apply_defaults(options);
        self.executor.run(definition, options).await
    }

    /// Check a workflow without running it and return its plan
    pub fn validate(&self, definition: &WorkflowDefinition) -> Result<ExecutionPlan, WorkflowError> {
        let graph = Graph::build(definition)?;
        DependencyResolver::resolve(&graph)
    }

    fn apply_defaults(&self, mut options: RunOptions) -> RunOptions {
        if options.node_timeout.is_none() {
            options.node_timeout = self.config.node_timeout();
        }
        if options.max_parallel.is_none() {
            options.max_parallel = self.config.max_parallel_nodes.map(|n| n.max(1));
        }
        options
    }
}

impl Default for WeaveRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Cap on executors in flight per run. `None` means unbounded.
    pub max_parallel_nodes: Option<usize>,
    /// Default per-node timeout. `None` means no timeout.
    pub node_timeout_ms: Option<u64>,
}

impl RuntimeConfig {
    pub fn node_timeout(&self) -> Option<Duration> {
        self.node_timeout_ms.map(Duration::from_millis)
    }
}
