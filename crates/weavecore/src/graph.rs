//! Validated, read-only view of a workflow definition.

use crate::workflow::{EdgeSpec, NodeId, NodeSpec, WorkflowDefinition, DEFAULT_HANDLE};
use crate::ValidationError;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Edge with both handles resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub source: NodeId,
    pub source_handle: String,
    pub target: NodeId,
    pub target_handle: String,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.source, self.source_handle, self.target, self.target_handle
        )
    }
}

/// Workflow graph that passed validation. Immutable for the duration of a run.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: BTreeMap<NodeId, NodeSpec>,
    edges: Vec<Edge>,
    incoming: HashMap<NodeId, Vec<usize>>,
    outgoing: HashMap<NodeId, Vec<usize>>,
}

impl Graph {
    /// Validate a definition and build its graph
    pub fn build(definition: &WorkflowDefinition) -> Result<Self, ValidationError> {
        Self::from_parts(definition.nodes.clone(), definition.edges.clone())
    }

    /// Validate nodes and edges and build a graph from them.
    ///
    /// Rejects empty ids, empty types, duplicate ids, edges pointing at
    /// unknown nodes, and edges naming a handle the node does not declare.
    pub fn from_parts(
        nodes: Vec<NodeSpec>,
        edges: Vec<EdgeSpec>,
    ) -> Result<Self, ValidationError> {
        let mut by_id = BTreeMap::new();
        for (index, node) in nodes.into_iter().enumerate() {
            if node.id.trim().is_empty() {
                return Err(ValidationError::EmptyNodeId { index });
            }
            if node.node_type.trim().is_empty() {
                return Err(ValidationError::EmptyNodeType { node_id: node.id });
            }
            if by_id.contains_key(&node.id) {
                return Err(ValidationError::DuplicateNode { node_id: node.id });
            }
            by_id.insert(node.id.clone(), node);
        }

        let mut resolved = Vec::with_capacity(edges.len());
        let mut incoming: HashMap<NodeId, Vec<usize>> = HashMap::new();
        let mut outgoing: HashMap<NodeId, Vec<usize>> = HashMap::new();

        for spec in edges {
            let source = by_id.get(&spec.source).ok_or_else(|| ValidationError::DanglingEdge {
                edge: spec.to_string(),
                node_id: spec.source.clone(),
            })?;
            let target = by_id.get(&spec.target).ok_or_else(|| ValidationError::DanglingEdge {
                edge: spec.to_string(),
                node_id: spec.target.clone(),
            })?;

            let source_handle =
                resolve_handle(&spec, source, spec.source_handle.as_deref(), &source.outputs, "output")?;
            let target_handle =
                resolve_handle(&spec, target, spec.target_handle.as_deref(), &target.inputs, "input")?;

            let index = resolved.len();
            outgoing.entry(spec.source.clone()).or_default().push(index);
            incoming.entry(spec.target.clone()).or_default().push(index);
            resolved.push(Edge {
                source: spec.source,
                source_handle,
                target: spec.target,
                target_handle,
            });
        }

        tracing::debug!("Graph validated: {} nodes, {} edges", by_id.len(), resolved.len());

        Ok(Self {
            nodes: by_id,
            edges: resolved,
            incoming,
            outgoing,
        })
    }

    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.get(id)
    }

    /// All nodes in ascending id order
    pub fn nodes(&self) -> impl Iterator<Item = &NodeSpec> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// All edges in definition order
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Incoming edges of a node, in definition order
    pub fn inputs_for_node(&self, id: &str) -> Vec<&Edge> {
        self.edges_at(&self.incoming, id)
    }

    /// Outgoing edges of a node, in definition order
    pub fn outputs_for_node(&self, id: &str) -> Vec<&Edge> {
        self.edges_at(&self.outgoing, id)
    }

    /// Distinct nodes feeding `id`, ascending
    pub fn upstream_nodes(&self, id: &str) -> Vec<&str> {
        let sources: BTreeSet<&str> = self
            .inputs_for_node(id)
            .into_iter()
            .map(|edge| edge.source.as_str())
            .collect();
        sources.into_iter().collect()
    }

    /// Nodes with no outgoing edges, ascending by id
    pub fn terminal_nodes(&self) -> Vec<&NodeSpec> {
        self.nodes
            .values()
            .filter(|node| !self.outgoing.contains_key(&node.id))
            .collect()
    }

    fn edges_at(&self, index: &HashMap<NodeId, Vec<usize>>, id: &str) -> Vec<&Edge> {
        index
            .get(id)
            .map(|positions| positions.iter().map(|&i| &self.edges[i]).collect())
            .unwrap_or_default()
    }
}

fn resolve_handle(
    edge: &EdgeSpec,
    node: &NodeSpec,
    requested: Option<&str>,
    declared: &[String],
    direction: &str,
) -> Result<String, ValidationError> {
    let handle = match requested {
        Some(handle) => handle.to_string(),
        None if declared.len() == 1 => declared[0].clone(),
        None => DEFAULT_HANDLE.to_string(),
    };

    if !declared.is_empty() && !declared.iter().any(|d| *d == handle) {
        return Err(ValidationError::UnknownHandle {
            edge: edge.to_string(),
            node_id: node.id.clone(),
            handle,
            direction: direction.to_string(),
        });
    }

    Ok(handle)
}
