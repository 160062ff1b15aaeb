//! Workflow execution runtime
//!
//! This crate provides the engine that runs workflows: the executor
//! registry, dependency resolution, and the coordinator that dispatches
//! ready nodes concurrently and records the run state.

mod executor;
mod loader;
mod options;
mod registry;
mod resolver;
mod runtime;

pub use executor::WorkflowExecutor;
pub use loader::{load_workflow, save_workflow};
pub use options::{CompleteCallback, NodeStateCallback, RunOptions};
pub use registry::ExecutorRegistry;
pub use resolver::{DependencyResolver, ExecutionPlan, ReadyTracker};
pub use runtime::{RuntimeConfig, WeaveRuntime};
