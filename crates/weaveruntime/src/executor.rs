use crate::options::{NodeStateCallback, RunOptions};
use crate::registry::ExecutorRegistry;
use crate::resolver::{DependencyResolver, ExecutionPlan, ReadyTracker};
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::task::AbortHandle;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use weavecore::{
    ExecutionContext, ExecutionId, Executor, Graph, NodeError, NodeId, NodeOutput, NodeRunState,
    NodeSpec, NodeStatus, PortValues, WorkflowDefinition, WorkflowError, WorkflowRunState,
    WorkflowStatus,
};

type TaskOutcome = (NodeId, Result<NodeOutput, NodeError>);

/// Drives workflow runs: dispatches ready nodes concurrently, routes
/// outputs along edges and keeps the run state.
pub struct WorkflowExecutor {
    registry: Arc<ExecutorRegistry>,
}

impl WorkflowExecutor {
    pub fn new(registry: Arc<ExecutorRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ExecutorRegistry> {
        &self.registry
    }

    /// Validate a definition and run it to completion.
    ///
    /// Graph-level failures (validation, cycles) come back as a run with
    /// `status == Error`, a top-level `error` and no node states.
    pub async fn run(&self, definition: &WorkflowDefinition, options: RunOptions) -> WorkflowRunState {
        tracing::info!(
            "Starting workflow '{}' ({} nodes, {} edges)",
            definition.name,
            definition.nodes.len(),
            definition.edges.len()
        );

        match Graph::build(definition) {
            Ok(graph) => self.run_graph(&graph, options).await,
            Err(e) => reject(
                WorkflowRunState::new(ExecutionId::new_v4()),
                WorkflowError::from(e),
                options,
            ),
        }
    }

    /// Run an already validated graph
    pub async fn run_graph(&self, graph: &Graph, options: RunOptions) -> WorkflowRunState {
        let state = WorkflowRunState::new(ExecutionId::new_v4());

        match DependencyResolver::resolve(graph) {
            Ok(plan) => self.run_plan(graph, &plan, state, options).await,
            Err(e) => reject(state, e, options),
        }
    }

    async fn run_plan(
        &self,
        graph: &Graph,
        plan: &ExecutionPlan,
        mut state: WorkflowRunState,
        options: RunOptions,
    ) -> WorkflowRunState {
        let RunOptions {
            on_node_state_change,
            on_complete,
            inputs,
            node_timeout,
            max_parallel,
            cancellation,
        } = options;

        for id in plan.order() {
            state.node_states.insert(id.clone(), NodeRunState::pending());
        }
        state.status = WorkflowStatus::Running;
        tracing::info!("Execution {} started", state.execution_id);

        let mut run = RunLoop {
            graph,
            registry: self.registry.as_ref(),
            state,
            tracker: plan.tracker(),
            ready: BTreeSet::new(),
            running: FuturesUnordered::new(),
            in_flight: HashMap::new(),
            on_node_state_change,
            inputs,
            node_timeout,
            max_parallel: max_parallel.unwrap_or(usize::MAX),
            cancellation,
        };

        let cancelled = run.drive().await;
        let state = run.finish(cancelled);

        match state.status {
            WorkflowStatus::Completed => {
                tracing::info!("Execution {} completed", state.execution_id)
            }
            status => tracing::warn!(
                "Execution {} ended with status {:?}: {} failed node(s)",
                state.execution_id,
                status,
                state.failures().len()
            ),
        }

        if let Some(callback) = on_complete {
            callback(&state);
        }
        state
    }
}

/// Close out a run that failed before any node was scheduled
fn reject(mut state: WorkflowRunState, error: WorkflowError, options: RunOptions) -> WorkflowRunState {
    tracing::error!("Execution {} rejected: {}", state.execution_id, error);

    state.status = WorkflowStatus::Error;
    state.error = Some(error);
    state.ended_at = Some(Utc::now());

    if let Some(callback) = options.on_complete {
        callback(&state);
    }
    state
}

enum Step {
    Cancelled,
    Finished(TaskOutcome),
}

/// Mutable state of one run. Everything here is owned by the loop; spawned
/// executor tasks only see their own context.
struct RunLoop<'a> {
    graph: &'a Graph,
    registry: &'a ExecutorRegistry,
    state: WorkflowRunState,
    tracker: ReadyTracker,
    ready: BTreeSet<NodeId>,
    running: FuturesUnordered<BoxFuture<'static, TaskOutcome>>,
    in_flight: HashMap<NodeId, AbortHandle>,
    on_node_state_change: Option<NodeStateCallback>,
    inputs: PortValues,
    node_timeout: Option<Duration>,
    max_parallel: usize,
    cancellation: CancellationToken,
}

impl RunLoop<'_> {
    /// Run until nothing is ready or in flight. Returns true if cancelled.
    async fn drive(&mut self) -> bool {
        self.ready.extend(self.tracker.initial_ready());

        loop {
            if self.cancellation.is_cancelled() {
                self.cancel_in_flight();
                return true;
            }

            self.dispatch_ready();

            if self.running.is_empty() {
                return false;
            }

            let cancellation = self.cancellation.clone();
            let step = tokio::select! {
                biased;
                _ = cancellation.cancelled() => Step::Cancelled,
                Some(outcome) = self.running.next() => Step::Finished(outcome),
            };

            match step {
                Step::Cancelled => {
                    self.cancel_in_flight();
                    return true;
                }
                Step::Finished((node_id, result)) => self.finish_node(node_id, result),
            }
        }
    }

    /// Dispatch ready nodes in ascending id order, up to the parallel cap
    fn dispatch_ready(&mut self) {
        while self.running.len() < self.max_parallel {
            let Some(node_id) = self.ready.pop_first() else {
                break;
            };
            self.dispatch(node_id);
        }
    }

    fn dispatch(&mut self, node_id: NodeId) {
        let graph = self.graph;
        let Some(node) = graph.node(&node_id) else {
            return;
        };

        if self.only_failed_upstream(&node_id) {
            tracing::debug!("Skipping node {}: every upstream node failed or was skipped", node_id);
            self.transition(&node_id, NodeRunState::skip);
            self.release(&node_id);
            return;
        }

        let inputs = self.resolve_inputs(node);
        self.transition(&node_id, |s| s.start(inputs.clone()));

        let Some(executor) = self.registry.lookup(&node.node_type) else {
            self.fail(
                &node_id,
                NodeError::UnknownExecutor {
                    node_type: node.node_type.clone(),
                },
            );
            return;
        };

        if let Err(e) = executor.validate_config(&node.config) {
            self.fail(&node_id, e);
            return;
        }

        tracing::info!("Starting node: {} ({})", node_id, node.node_type);

        let ctx = ExecutionContext {
            node_id: node_id.clone(),
            node_type: node.node_type.clone(),
            config: node.config.clone(),
            inputs,
            cancellation: self.cancellation.child_token(),
        };
        self.spawn(node, executor, ctx);
    }

    /// Run the executor on its own task so a panic stays local to the node
    fn spawn(&mut self, node: &NodeSpec, executor: Arc<dyn Executor>, ctx: ExecutionContext) {
        let limit = node.timeout_ms.map(Duration::from_millis).or(self.node_timeout);

        let handle = tokio::spawn(async move {
            match limit {
                Some(limit) => match timeout(limit, executor.execute(ctx)).await {
                    Ok(result) => result,
                    Err(_) => Err(NodeError::Timeout { limit }),
                },
                None => executor.execute(ctx).await,
            }
        });

        let node_id = node.id.clone();
        self.in_flight.insert(node_id.clone(), handle.abort_handle());
        self.running.push(Box::pin(async move {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) if e.is_panic() => Err(NodeError::Panicked(panic_message(e.into_panic()))),
                Err(_) => Err(NodeError::Cancelled),
            };
            (node_id, result)
        }));
    }

    fn finish_node(&mut self, node_id: NodeId, result: Result<NodeOutput, NodeError>) {
        self.in_flight.remove(&node_id);

        match result.and_then(|output| self.check_output(&node_id, output)) {
            Ok(outputs) => {
                self.transition(&node_id, |s| s.complete(outputs));
                let duration_ms = self
                    .state
                    .node(&node_id)
                    .and_then(NodeRunState::duration_ms)
                    .unwrap_or_default();
                tracing::info!("Node {} completed in {}ms", node_id, duration_ms);
                self.release(&node_id);
            }
            Err(e) => self.fail(&node_id, e),
        }
    }

    /// Reject output handles the node does not declare
    fn check_output(&self, node_id: &str, output: NodeOutput) -> Result<PortValues, NodeError> {
        let Some(node) = self.graph.node(node_id) else {
            return Ok(output.outputs);
        };
        if node.outputs.is_empty() {
            return Ok(output.outputs);
        }

        match output.outputs.keys().find(|handle| !node.outputs.contains(*handle)) {
            Some(handle) => Err(NodeError::InvalidOutput(format!(
                "undeclared output handle '{}'",
                handle
            ))),
            None => Ok(output.outputs),
        }
    }

    fn fail(&mut self, node_id: &str, error: NodeError) {
        tracing::error!("Node {} failed: {}", node_id, error);
        self.transition(node_id, |s| s.fail(error.to_string()));
        self.release(node_id);
    }

    /// Mark `node_id` terminal in the tracker and queue newly ready nodes
    fn release(&mut self, node_id: &str) {
        let newly_ready = self.tracker.complete(node_id);
        self.ready.extend(newly_ready);
    }

    /// Keep results that are already in, then abort whatever is still running
    fn cancel_in_flight(&mut self) {
        while let Some(Some((node_id, result))) = self.running.next().now_or_never() {
            self.finish_node(node_id, result);
        }

        let mut aborted: Vec<(NodeId, AbortHandle)> = self.in_flight.drain().collect();
        aborted.sort_by(|a, b| a.0.cmp(&b.0));

        tracing::warn!(
            "Execution {} cancelled with {} node(s) in flight",
            self.state.execution_id,
            aborted.len()
        );

        for (node_id, handle) in aborted {
            handle.abort();
            let message = NodeError::Cancelled.to_string();
            self.transition(&node_id, |s| s.fail(message));
        }
        self.running.clear();
    }

    /// Apply a change to a node's state and notify the observer
    fn transition(&mut self, node_id: &str, change: impl FnOnce(&mut NodeRunState)) {
        let Some(node_state) = self.state.node_mut(node_id) else {
            return;
        };
        change(node_state);
        if let Some(callback) = &self.on_node_state_change {
            callback(node_id, node_state);
        }
    }

    fn status_of(&self, node_id: &str) -> Option<NodeStatus> {
        self.state.node(node_id).map(|s| s.status)
    }

    /// True when the node has upstream nodes and none of them completed
    fn only_failed_upstream(&self, node_id: &str) -> bool {
        let upstream = self.graph.upstream_nodes(node_id);
        !upstream.is_empty()
            && upstream.iter().all(|id| {
                matches!(
                    self.status_of(id),
                    Some(NodeStatus::Error) | Some(NodeStatus::Skipped)
                )
            })
    }

    /// Assemble a node's input map.
    ///
    /// Edge values are applied in ascending source id order, so when several
    /// edges target one handle the greatest source id wins. Root nodes then
    /// take run inputs, and declared handles with no incoming edge fall back
    /// to the node's config value of the same name.
    fn resolve_inputs(&self, node: &NodeSpec) -> PortValues {
        let mut inputs = PortValues::new();
        let mut edges = self.graph.inputs_for_node(&node.id);
        edges.sort_by(|a, b| a.source.cmp(&b.source));

        for edge in &edges {
            let value = self
                .state
                .node(&edge.source)
                .filter(|s| s.status == NodeStatus::Completed)
                .and_then(|s| s.output.as_ref())
                .and_then(|outputs| outputs.get(&edge.source_handle));

            match value {
                Some(value) => {
                    if inputs.insert(edge.target_handle.clone(), value.clone()).is_some() {
                        tracing::debug!("Edge {} overrides an earlier value", edge);
                    }
                }
                None => tracing::debug!("Edge {} carries no value", edge),
            }
        }

        if edges.is_empty() {
            for (handle, value) in &self.inputs {
                if node.inputs.is_empty() || node.inputs.contains(handle) {
                    inputs.entry(handle.clone()).or_insert_with(|| value.clone());
                }
            }
        }

        // A connected handle never falls back, even if its source produced nothing
        let connected: BTreeSet<&String> = edges.iter().copied().map(|edge| &edge.target_handle).collect();
        for handle in &node.inputs {
            if connected.contains(handle) || inputs.contains_key(handle) {
                continue;
            }
            if let Some(value) = node.config.get(handle) {
                inputs.insert(handle.clone(), value.clone());
            }
        }

        inputs
    }

    /// Compute the overall status and final output
    fn finish(mut self, cancelled: bool) -> WorkflowRunState {
        let any_error = self
            .state
            .node_states
            .values()
            .any(|s| s.status == NodeStatus::Error);

        self.state.status = if cancelled {
            WorkflowStatus::Cancelled
        } else if any_error {
            WorkflowStatus::Error
        } else {
            WorkflowStatus::Completed
        };

        let final_output: BTreeMap<NodeId, PortValues> = self
            .graph
            .terminal_nodes()
            .into_iter()
            .filter_map(|node| {
                let node_state = self.state.node(&node.id)?;
                match (node_state.status, &node_state.output) {
                    (NodeStatus::Completed, Some(output)) => Some((node.id.clone(), output.clone())),
                    _ => None,
                }
            })
            .collect();

        self.state.final_output = (!final_output.is_empty()).then_some(final_output);
        self.state.ended_at = Some(Utc::now());
        self.state
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
