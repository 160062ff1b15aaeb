use async_trait::async_trait;
use weavecore::{
    ExecutionContext, Executor, ExecutorMetadata, NodeError, NodeOutput, PortDefinition, Value,
};

pub(crate) const JSON_PARSE: &str = "transform.json_parse";
pub(crate) const JSON_STRINGIFY: &str = "transform.json_stringify";

/// Parse JSON string to Value
pub struct JsonParseExecutor;

#[async_trait]
impl Executor for JsonParseExecutor {
    async fn execute(&self, ctx: ExecutionContext) -> Result<NodeOutput, NodeError> {
        let input = ctx.require_str("json")?;

        let parsed: serde_json::Value = serde_json::from_str(input)
            .map_err(|e| NodeError::ExecutionFailed(format!("JSON parse error: {}", e)))?;

        Ok(NodeOutput::new().with_output("parsed", Value::from(parsed)))
    }

    fn metadata(&self) -> ExecutorMetadata {
        ExecutorMetadata {
            description: "Parse JSON string".to_string(),
            category: "transform".to_string(),
            inputs: vec![PortDefinition::new("json", "JSON text", true)],
            outputs: vec![PortDefinition::new("parsed", "Parsed value", true)],
        }
    }
}

/// Stringify Value to JSON
pub struct JsonStringifyExecutor;

#[async_trait]
impl Executor for JsonStringifyExecutor {
    async fn execute(&self, ctx: ExecutionContext) -> Result<NodeOutput, NodeError> {
        let value = ctx.require_input("value")?;
        let pretty = ctx
            .config
            .get("pretty")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        let json = serde_json::Value::from(value.clone());
        let rendered = if pretty {
            serde_json::to_string_pretty(&json)
        } else {
            serde_json::to_string(&json)
        }
        .map_err(|e| NodeError::ExecutionFailed(format!("JSON stringify error: {}", e)))?;

        Ok(NodeOutput::new().with_output("json", rendered))
    }

    fn metadata(&self) -> ExecutorMetadata {
        ExecutorMetadata {
            description: "Convert value to JSON string".to_string(),
            category: "transform".to_string(),
            inputs: vec![PortDefinition::new("value", "Value to serialize", true)],
            outputs: vec![PortDefinition::new("json", "JSON text", true)],
        }
    }
}
