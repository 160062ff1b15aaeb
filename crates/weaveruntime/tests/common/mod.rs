#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use weavecore::{
    executor_fn, ExecutionContext, NodeError, NodeOutput, NodeRunState, NodeStatus, Value,
};
use weaveruntime::{ExecutorRegistry, RunOptions};

/// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

/// Transitions seen through `on_node_state_change`, in order
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<(String, NodeStatus)>>>,
}

impl Recorder {
    pub fn options(&self) -> RunOptions {
        let events = self.events.clone();
        RunOptions::new().on_node_state_change(move |id: &str, state: &NodeRunState| {
            events.lock().unwrap().push((id.to_string(), state.status));
        })
    }

    pub fn events(&self) -> Vec<(String, NodeStatus)> {
        self.events.lock().unwrap().clone()
    }

    /// Statuses reported for one node, in order
    pub fn statuses(&self, node_id: &str) -> Vec<NodeStatus> {
        self.events()
            .into_iter()
            .filter(|(id, _)| id == node_id)
            .map(|(_, status)| status)
            .collect()
    }

    pub fn position(&self, node_id: &str, status: NodeStatus) -> Option<usize> {
        self.events()
            .iter()
            .position(|(id, s)| id == node_id && *s == status)
    }
}

/// Registry with a few generic test executors:
///
/// - `emit`: outputs every config entry as an output handle
/// - `echo`: outputs its inputs unchanged
/// - `fail`: always fails with the config `message`
pub fn test_registry() -> Arc<ExecutorRegistry> {
    let registry = ExecutorRegistry::new();

    registry.register(
        "emit",
        executor_fn(|ctx: ExecutionContext| async move {
            Ok::<_, NodeError>(NodeOutput::from(ctx.config))
        }),
    );

    registry.register(
        "echo",
        executor_fn(|ctx: ExecutionContext| async move {
            Ok::<_, NodeError>(NodeOutput::from(ctx.inputs))
        }),
    );

    registry.register(
        "fail",
        executor_fn(|ctx: ExecutionContext| async move {
            let message = ctx
                .get_config_or("message", Value::from("boom"))
                .as_str()
                .unwrap_or("boom")
                .to_string();
            Err::<NodeOutput, _>(NodeError::ExecutionFailed(message))
        }),
    );

    Arc::new(registry)
}
