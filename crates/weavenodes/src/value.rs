use async_trait::async_trait;
use weavecore::{ExecutionContext, Executor, ExecutorMetadata, NodeError, NodeOutput};

pub(crate) const NODE_TYPE: &str = "value.constant";

/// Emits each config entry on the output handle of the same name
pub struct ConstantExecutor;

#[async_trait]
impl Executor for ConstantExecutor {
    async fn execute(&self, ctx: ExecutionContext) -> Result<NodeOutput, NodeError> {
        Ok(NodeOutput::from(ctx.config))
    }

    fn metadata(&self) -> ExecutorMetadata {
        ExecutorMetadata {
            description: "Output fixed values from config".to_string(),
            category: "value".to_string(),
            inputs: vec![],
            outputs: vec![],
        }
    }
}
