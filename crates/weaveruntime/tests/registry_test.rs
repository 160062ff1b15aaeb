use async_trait::async_trait;
use std::sync::Arc;
use weavecore::{
    ExecutionContext, Executor, ExecutorMetadata, NodeError, NodeOutput, PortDefinition, Value,
};
use weaveruntime::ExecutorRegistry;

struct Constant(&'static str);

#[async_trait]
impl Executor for Constant {
    async fn execute(&self, _ctx: ExecutionContext) -> Result<NodeOutput, NodeError> {
        Ok(NodeOutput::new().with_output("value", self.0))
    }

    fn metadata(&self) -> ExecutorMetadata {
        ExecutorMetadata {
            description: format!("Always returns {}", self.0),
            category: "test".to_string(),
            inputs: vec![],
            outputs: vec![PortDefinition::new("value", "the constant", true)],
        }
    }
}

#[tokio::test]
async fn lookup_returns_registered_executor() {
    let registry = ExecutorRegistry::new();
    assert!(registry.lookup("constant").is_none());

    assert!(registry.register("constant", Constant("one")).is_none());
    let executor = registry.lookup("constant").expect("registered");

    let output = executor
        .execute(ExecutionContext::new("n", "constant"))
        .await
        .unwrap();
    assert_eq!(output.outputs["value"], Value::from("one"));
    assert!(registry.contains("constant"));
}

#[tokio::test]
async fn second_registration_wins() {
    let registry = ExecutorRegistry::new();
    registry.register("constant", Constant("one"));
    let replaced = registry.register("constant", Constant("two"));

    let previous = replaced.expect("first executor handed back");
    assert_eq!(previous.metadata().description, "Always returns one");

    let current = registry.lookup("constant").unwrap();
    let output = current
        .execute(ExecutionContext::new("n", "constant"))
        .await
        .unwrap();
    assert_eq!(output.outputs["value"], Value::from("two"));
    assert_eq!(registry.list_node_types(), vec!["constant"]);
}

#[test]
fn lists_types_sorted_with_metadata() {
    let registry = ExecutorRegistry::new();
    registry.register("zeta", Constant("z"));
    registry.register("alpha", Constant("a"));
    registry.register_arc("mid", Arc::new(Constant("m")));

    assert_eq!(registry.list_node_types(), vec!["alpha", "mid", "zeta"]);

    let metadata = registry.get_metadata("mid").unwrap();
    assert_eq!(metadata.category, "test");
    assert_eq!(metadata.outputs[0].name, "value");
    assert!(registry.get_metadata("missing").is_none());
}

#[tokio::test]
async fn registration_is_visible_across_threads() {
    let registry = Arc::new(ExecutorRegistry::new());

    let writer = {
        let registry = registry.clone();
        tokio::task::spawn_blocking(move || {
            for i in 0..50 {
                registry.register(format!("type.{i}"), Constant("x"));
            }
        })
    };
    writer.await.unwrap();

    assert_eq!(registry.list_node_types().len(), 50);
    assert!(registry.lookup("type.49").is_some());
}
