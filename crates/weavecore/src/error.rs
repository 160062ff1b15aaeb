use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Errors around the engine: loading definitions, serializing reports
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A malformed workflow graph. Fatal to the whole run.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("node at position {index} has an empty id")]
    EmptyNodeId { index: usize },

    #[error("node '{node_id}' has an empty type")]
    EmptyNodeType { node_id: String },

    #[error("duplicate node id: {node_id}")]
    DuplicateNode { node_id: String },

    #[error("edge {edge} references unknown node '{node_id}'")]
    DanglingEdge { edge: String, node_id: String },

    #[error("edge {edge} references unknown {direction} handle '{handle}' on node '{node_id}'")]
    UnknownHandle {
        edge: String,
        node_id: String,
        handle: String,
        direction: String,
    },
}

/// Graph-level failures, reported before any node runs
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkflowError {
    #[error("invalid workflow: {source}")]
    Validation {
        #[from]
        source: ValidationError,
    },

    #[error("cyclic dependency detected among nodes: {}", remaining.join(", "))]
    CyclicGraph { remaining: Vec<String> },
}

impl WorkflowError {
    pub fn is_cycle(&self) -> bool {
        matches!(self, WorkflowError::CyclicGraph { .. })
    }
}

/// Failures local to one node. `Display` is the message stored on the
/// node's run state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("no executor registered for type {node_type}")]
    UnknownExecutor { node_type: String },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("missing required input: {0}")]
    MissingInput(String),

    #[error("invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("{0}")]
    ExecutionFailed(String),

    #[error("invalid executor output: {0}")]
    InvalidOutput(String),

    #[error("timed out after {}ms", limit.as_millis())]
    Timeout { limit: Duration },

    #[error("executor panicked: {0}")]
    Panicked(String),

    #[error("cancelled")]
    Cancelled,
}
