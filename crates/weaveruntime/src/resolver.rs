//! Dependency resolution: Kahn's algorithm over the node set.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, HashSet};
use weavecore::{Graph, NodeId, WorkflowError};

/// Turns a validated graph into a deterministic execution plan
pub struct DependencyResolver;

impl DependencyResolver {
    /// Compute the plan, or fail with `CyclicGraph` naming the nodes that
    /// could never become ready.
    ///
    /// A node's in-degree is the number of distinct upstream nodes, so two
    /// edges from the same source count once.
    pub fn resolve(graph: &Graph) -> Result<ExecutionPlan, WorkflowError> {
        let mut deps: DiGraph<NodeId, ()> = DiGraph::new();
        let mut node_to_index: HashMap<&str, NodeIndex> = HashMap::new();

        for id in graph.node_ids() {
            let idx = deps.add_node(id.to_string());
            node_to_index.insert(id, idx);
        }

        for edge in graph.edges() {
            let from = node_to_index.get(edge.source.as_str());
            let to = node_to_index.get(edge.target.as_str());
            if let (Some(&from), Some(&to)) = (from, to) {
                // update_edge collapses parallel edges
                deps.update_edge(from, to, ());
            }
        }

        let mut in_degree = HashMap::with_capacity(deps.node_count());
        let mut dependents = HashMap::with_capacity(deps.node_count());
        for idx in deps.node_indices() {
            let id = deps[idx].clone();
            in_degree.insert(
                id.clone(),
                deps.neighbors_directed(idx, Direction::Incoming).count(),
            );
            let mut downstream: Vec<NodeId> = deps
                .neighbors_directed(idx, Direction::Outgoing)
                .map(|n| deps[n].clone())
                .collect();
            downstream.sort();
            dependents.insert(id, downstream);
        }

        let mut plan = ExecutionPlan {
            order: Vec::with_capacity(in_degree.len()),
            in_degree,
            dependents,
        };

        let mut tracker = plan.tracker();
        let mut ready: BTreeSet<NodeId> = tracker.initial_ready().into_iter().collect();
        while let Some(id) = ready.pop_first() {
            ready.extend(tracker.complete(&id));
            plan.order.push(id);
        }

        if plan.order.len() < graph.len() {
            let remaining = tracker.unfinished();
            tracing::error!("Cyclic dependency among nodes: {:?}", remaining);
            return Err(WorkflowError::CyclicGraph { remaining });
        }

        tracing::debug!("Execution order: {:?}", plan.order);
        Ok(plan)
    }
}

/// Result of dependency resolution for one graph
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    order: Vec<NodeId>,
    in_degree: HashMap<NodeId, usize>,
    dependents: HashMap<NodeId, Vec<NodeId>>,
}

impl ExecutionPlan {
    /// Full topological order, ties broken by ascending node id
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Number of distinct upstream nodes of `id`
    pub fn in_degree(&self, id: &str) -> Option<usize> {
        self.in_degree.get(id).copied()
    }

    /// Distinct downstream nodes of `id`, ascending
    pub fn dependents(&self, id: &str) -> &[NodeId] {
        self.dependents.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Fresh in-degree bookkeeping for one run
    pub fn tracker(&self) -> ReadyTracker {
        ReadyTracker {
            remaining: self.in_degree.clone(),
            dependents: self.dependents.clone(),
            finished: HashSet::new(),
        }
    }
}

/// Mutable in-degree bookkeeping used while a run progresses
#[derive(Debug, Clone)]
pub struct ReadyTracker {
    remaining: HashMap<NodeId, usize>,
    dependents: HashMap<NodeId, Vec<NodeId>>,
    finished: HashSet<NodeId>,
}

impl ReadyTracker {
    /// Nodes with no upstream dependencies, ascending
    pub fn initial_ready(&self) -> Vec<NodeId> {
        let mut ready: Vec<NodeId> = self
            .remaining
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(id, _)| id.clone())
            .collect();
        ready.sort();
        ready
    }

    /// Record that `id` reached a terminal state. Returns the downstream
    /// nodes that just became ready, ascending.
    pub fn complete(&mut self, id: &str) -> Vec<NodeId> {
        if !self.remaining.contains_key(id) || !self.finished.insert(id.to_string()) {
            return Vec::new();
        }

        let mut ready = Vec::new();
        for dependent in self.dependents.get(id).into_iter().flatten() {
            if let Some(degree) = self.remaining.get_mut(dependent) {
                *degree = degree.saturating_sub(1);
                if *degree == 0 {
                    ready.push(dependent.clone());
                }
            }
        }
        ready.sort();
        ready
    }

    pub fn is_finished(&self, id: &str) -> bool {
        self.finished.contains(id)
    }

    /// Nodes not yet reported complete, ascending
    pub fn unfinished(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .remaining
            .keys()
            .filter(|id| !self.finished.contains(*id))
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}
