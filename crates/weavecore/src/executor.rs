use crate::workflow::{Config, NodeId};
use crate::{NodeError, PortValues, Value};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Work performed for one node type.
///
/// The engine treats executors as opaque: it hands over the node's config
/// and resolved inputs and expects output values keyed by output handle.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run the node with the given context
    async fn execute(&self, ctx: ExecutionContext) -> Result<NodeOutput, NodeError>;

    /// Optional: Check a node's configuration before it is dispatched
    fn validate_config(&self, _config: &Config) -> Result<(), NodeError> {
        Ok(())
    }

    /// Optional: Describe the node type (description, ports)
    fn metadata(&self) -> ExecutorMetadata {
        ExecutorMetadata::default()
    }
}

/// Everything an executor gets to see about the node it runs
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub node_id: NodeId,

    pub node_type: String,

    /// Static configuration for this node
    pub config: Config,

    /// Values resolved from upstream outputs, run inputs and config fallbacks
    pub inputs: PortValues,

    /// Fires when the run is cancelled
    pub cancellation: CancellationToken,
}

impl ExecutionContext {
    pub fn new(node_id: impl Into<NodeId>, node_type: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            node_type: node_type.into(),
            config: Config::new(),
            inputs: PortValues::new(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_inputs(mut self, inputs: PortValues) -> Self {
        self.inputs = inputs;
        self
    }

    /// Get required input or return error
    pub fn require_input(&self, name: &str) -> Result<&Value, NodeError> {
        self.inputs
            .get(name)
            .ok_or_else(|| NodeError::MissingInput(name.to_string()))
    }

    /// Get a required input that must be a string
    pub fn require_str(&self, name: &str) -> Result<&str, NodeError> {
        let value = self.require_input(name)?;
        value.as_str().ok_or_else(|| NodeError::InvalidInputType {
            field: name.to_string(),
            expected: "string".to_string(),
            actual: value.kind().to_string(),
        })
    }

    /// Get config value or return error
    pub fn require_config(&self, name: &str) -> Result<&Value, NodeError> {
        self.config
            .get(name)
            .ok_or_else(|| NodeError::InvalidConfig(format!("missing field `{}`", name)))
    }

    /// Get config with default
    pub fn get_config_or(&self, name: &str, default: Value) -> Value {
        self.config.get(name).cloned().unwrap_or(default)
    }

    /// Deserialize the whole config into a typed struct
    pub fn config_as<T: DeserializeOwned>(&self) -> Result<T, NodeError> {
        parse_config(&self.config)
    }
}

/// Deserialize a node config into `T`, mapping failures to `InvalidConfig`
pub fn parse_config<T: DeserializeOwned>(config: &Config) -> Result<T, NodeError> {
    let json = serde_json::Value::from(Value::Object(config.clone()));
    serde_json::from_value(json).map_err(|e| NodeError::InvalidConfig(e.to_string()))
}

/// Output from node execution, keyed by output handle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    pub outputs: PortValues,
}

impl NodeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, port: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.insert(port.into(), value.into());
        self
    }
}

impl From<PortValues> for NodeOutput {
    fn from(outputs: PortValues) -> Self {
        Self { outputs }
    }
}

/// Metadata about a node type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorMetadata {
    pub description: String,
    pub category: String,
    pub inputs: Vec<PortDefinition>,
    pub outputs: Vec<PortDefinition>,
}

impl Default for ExecutorMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortDefinition {
    pub name: String,
    pub description: String,
    pub required: bool,
}

impl PortDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required,
        }
    }
}

/// Executor whose configuration has a fixed, typed shape
#[async_trait]
pub trait TypedExecutor: Send + Sync {
    type Config: DeserializeOwned + Send;

    async fn execute(
        &self,
        config: Self::Config,
        ctx: ExecutionContext,
    ) -> Result<NodeOutput, NodeError>;

    fn metadata(&self) -> ExecutorMetadata {
        ExecutorMetadata::default()
    }
}

/// Adapter that parses the config before handing it to a [`TypedExecutor`]
pub struct Typed<E>(E);

pub fn typed<E: TypedExecutor>(executor: E) -> Typed<E> {
    Typed(executor)
}

#[async_trait]
impl<E: TypedExecutor> Executor for Typed<E> {
    async fn execute(&self, ctx: ExecutionContext) -> Result<NodeOutput, NodeError> {
        let config = ctx.config_as::<E::Config>()?;
        self.0.execute(config, ctx).await
    }

    fn validate_config(&self, config: &Config) -> Result<(), NodeError> {
        parse_config::<E::Config>(config).map(|_| ())
    }

    fn metadata(&self) -> ExecutorMetadata {
        self.0.metadata()
    }
}

/// Executor backed by an async closure
pub struct FnExecutor<F> {
    f: F,
    metadata: ExecutorMetadata,
}

impl<F> FnExecutor<F> {
    pub fn with_metadata(mut self, metadata: ExecutorMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

pub fn executor_fn<F, Fut>(f: F) -> FnExecutor<F>
where
    F: Fn(ExecutionContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<NodeOutput, NodeError>> + Send + 'static,
{
    FnExecutor {
        f,
        metadata: ExecutorMetadata::default(),
    }
}

#[async_trait]
impl<F, Fut> Executor for FnExecutor<F>
where
    F: Fn(ExecutionContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<NodeOutput, NodeError>> + Send + 'static,
{
    async fn execute(&self, ctx: ExecutionContext) -> Result<NodeOutput, NodeError> {
        (self.f)(ctx).await
    }

    fn metadata(&self) -> ExecutorMetadata {
        self.metadata.clone()
    }
}
