use async_trait::async_trait;
use weavecore::{
    ExecutionContext, Executor, ExecutorMetadata, NodeError, NodeOutput, PortDefinition,
};

pub(crate) const NODE_TYPE: &str = "debug.log";

/// Simple debug executor that logs its inputs
pub struct DebugExecutor;

#[async_trait]
impl Executor for DebugExecutor {
    async fn execute(&self, ctx: ExecutionContext) -> Result<NodeOutput, NodeError> {
        let message = ctx
            .inputs
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("(no message)");

        tracing::info!("DEBUG [{}]: {}", ctx.node_id, message);

        for (key, value) in &ctx.inputs {
            tracing::info!("  {}: {:?}", key, value);
        }

        Ok(NodeOutput::new().with_output("message", message))
    }

    fn metadata(&self) -> ExecutorMetadata {
        ExecutorMetadata {
            description: "Logs input values for debugging".to_string(),
            category: "debug".to_string(),
            inputs: vec![PortDefinition::new("message", "Text to log", false)],
            outputs: vec![PortDefinition::new("message", "The logged text", true)],
        }
    }
}
