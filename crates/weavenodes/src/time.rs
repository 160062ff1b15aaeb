use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::{sleep, Duration};
use weavecore::{ExecutionContext, ExecutorMetadata, NodeError, NodeOutput, TypedExecutor};

pub(crate) const NODE_TYPE: &str = "time.delay";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DelayConfig {
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_delay_ms() -> u64 {
    1000
}

/// Delay execution for a specified duration, then pass inputs through
pub struct DelayExecutor;

#[async_trait]
impl TypedExecutor for DelayExecutor {
    type Config = DelayConfig;

    async fn execute(
        &self,
        config: DelayConfig,
        ctx: ExecutionContext,
    ) -> Result<NodeOutput, NodeError> {
        tracing::debug!("Node {} delaying for {}ms", ctx.node_id, config.delay_ms);

        tokio::select! {
            _ = sleep(Duration::from_millis(config.delay_ms)) => {}
            _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
        }

        Ok(NodeOutput::from(ctx.inputs))
    }

    fn metadata(&self) -> ExecutorMetadata {
        ExecutorMetadata {
            description: "Delay execution for specified milliseconds".to_string(),
            category: "time".to_string(),
            inputs: vec![],
            outputs: vec![],
        }
    }
}
