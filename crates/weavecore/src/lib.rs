//! Core abstractions for the weave workflow engine
//!
//! This crate provides the data model every other component depends on:
//! workflow definitions, the validated graph, the executor contract and
//! the run state. It does no scheduling of its own.

mod error;
mod executor;
mod graph;
mod state;
mod value;
mod workflow;

pub use error::{FlowError, NodeError, ValidationError, WorkflowError};
pub use executor::{
    executor_fn, parse_config, typed, ExecutionContext, Executor, ExecutorMetadata, FnExecutor,
    NodeOutput, PortDefinition, Typed, TypedExecutor,
};
pub use graph::{Edge, Graph};
pub use state::{ExecutionId, NodeRunState, NodeStatus, WorkflowRunState, WorkflowStatus};
pub use value::{PortValues, Value};
pub use workflow::{Config, EdgeSpec, NodeId, NodeSpec, WorkflowDefinition, DEFAULT_HANDLE};

/// Result type for engine I/O operations
pub type Result<T> = std::result::Result<T, FlowError>;
