mod common;

use common::{init_tracing, test_registry, Recorder};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use weavecore::{
    executor_fn, ExecutionContext, NodeError, NodeOutput, NodeSpec, NodeStatus, Value,
    WorkflowDefinition, WorkflowStatus,
};
use weaveruntime::{
    load_workflow, save_workflow, ExecutorRegistry, RunOptions, RuntimeConfig, WeaveRuntime,
};

/// Registry with a `sleep` executor that waits `ms` from its config
fn sleepy_registry() -> Arc<ExecutorRegistry> {
    let registry = test_registry();
    registry.register(
        "sleep",
        executor_fn(|ctx: ExecutionContext| async move {
            let ms = ctx.get_config_or("ms", Value::Number(0.0)).as_f64().unwrap_or(0.0);
            tokio::time::sleep(Duration::from_millis(ms as u64)).await;
            Ok::<_, NodeError>(NodeOutput::new().with_output("slept", ms))
        }),
    );
    registry
}

fn sleeper(id: &str, ms: f64) -> NodeSpec {
    NodeSpec::new(id, "sleep").with_config("ms", ms)
}

#[tokio::test]
async fn timeout_fails_only_the_slow_node() {
    init_tracing();

    let mut wf = WorkflowDefinition::new("timeouts");
    wf.add_node(sleeper("slow", 10_000.0));
    wf.add_node(sleeper("fast", 1.0));
    wf.add_node(NodeSpec::new("after_slow", "echo"));
    wf.connect_default("slow", "after_slow");

    let runtime = WeaveRuntime::with_registry(sleepy_registry(), RuntimeConfig::default());
    let options = RunOptions::new().with_node_timeout(Duration::from_millis(50));
    let state = tokio::time::timeout(Duration::from_secs(5), runtime.run(&wf, options))
        .await
        .expect("timeout did not fire");

    let slow = state.node("slow").unwrap();
    assert_eq!(slow.status, NodeStatus::Error);
    assert_eq!(slow.error.as_deref(), Some("timed out after 50ms"));
    assert_eq!(state.node("fast").unwrap().status, NodeStatus::Completed);
    assert_eq!(state.node("after_slow").unwrap().status, NodeStatus::Skipped);
    assert_eq!(state.status, WorkflowStatus::Error);
}

#[tokio::test]
async fn node_timeout_overrides_run_default() {
    init_tracing();

    let mut wf = WorkflowDefinition::new("override");
    wf.add_node(sleeper("patient", 100.0).with_timeout(5_000));
    wf.add_node(sleeper("strict", 5_000.0).with_timeout(20));

    let config = RuntimeConfig {
        node_timeout_ms: Some(30),
        ..RuntimeConfig::default()
    };
    let runtime = WeaveRuntime::with_registry(sleepy_registry(), config);
    let state = runtime.run(&wf, RunOptions::new()).await;

    assert_eq!(state.node("patient").unwrap().status, NodeStatus::Completed);
    assert_eq!(
        state.node("strict").unwrap().error.as_deref(),
        Some("timed out after 20ms")
    );
}

#[tokio::test]
async fn cancellation_stops_dispatch() {
    init_tracing();

    let recorder = Recorder::default();
    let mut wf = WorkflowDefinition::new("cancel");
    wf.add_node(sleeper("long", 60_000.0));
    wf.add_node(NodeSpec::new("next", "echo"));
    wf.connect_default("long", "next");

    let token = CancellationToken::new();
    let options = recorder.options().with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let runtime = WeaveRuntime::with_registry(sleepy_registry(), RuntimeConfig::default());
    let state = tokio::time::timeout(Duration::from_secs(5), runtime.run(&wf, options))
        .await
        .expect("cancellation did not stop the run");
    canceller.await.unwrap();

    assert_eq!(state.status, WorkflowStatus::Cancelled);
    assert_eq!(state.node("long").unwrap().status, NodeStatus::Error);
    assert_eq!(state.node("long").unwrap().error.as_deref(), Some("cancelled"));
    assert_eq!(state.node("next").unwrap().status, NodeStatus::Pending);
    assert!(recorder.statuses("next").is_empty());
}

#[tokio::test]
async fn cancelled_before_start_runs_nothing() {
    init_tracing();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let registry = Arc::new(ExecutorRegistry::new());
    registry.register(
        "count",
        executor_fn(move |_ctx: ExecutionContext| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, NodeError>(NodeOutput::new()) }
        }),
    );

    let mut wf = WorkflowDefinition::new("pre-cancelled");
    wf.add_node(NodeSpec::new("a", "count"));

    let token = CancellationToken::new();
    token.cancel();
    let runtime = WeaveRuntime::with_registry(registry, RuntimeConfig::default());
    let state = runtime
        .run(&wf, RunOptions::new().with_cancellation(token))
        .await;

    assert_eq!(state.status, WorkflowStatus::Cancelled);
    assert_eq!(state.node("a").unwrap().status, NodeStatus::Pending);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn executors_observe_cancellation() {
    init_tracing();

    let registry = Arc::new(ExecutorRegistry::new());
    registry.register(
        "cooperative",
        executor_fn(|ctx: ExecutionContext| async move {
            ctx.cancellation.cancelled().await;
            Err::<NodeOutput, _>(NodeError::Cancelled)
        }),
    );

    let mut wf = WorkflowDefinition::new("cooperative");
    wf.add_node(NodeSpec::new("a", "cooperative"));

    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        child.cancel();
    });

    let runtime = WeaveRuntime::with_registry(registry, RuntimeConfig::default());
    let state = runtime
        .run(&wf, RunOptions::new().with_cancellation(token))
        .await;

    assert_eq!(state.status, WorkflowStatus::Cancelled);
    assert_eq!(state.node("a").unwrap().error.as_deref(), Some("cancelled"));
}

#[tokio::test]
async fn finished_work_survives_cancellation() {
    init_tracing();

    let token = CancellationToken::new();
    let trigger = token.clone();
    let registry = Arc::new(ExecutorRegistry::new());
    registry.register(
        "finish_then_cancel",
        executor_fn(move |_ctx: ExecutionContext| {
            let trigger = trigger.clone();
            async move {
                trigger.cancel();
                Ok::<_, NodeError>(NodeOutput::new().with_output("done", true))
            }
        }),
    );
    registry.register(
        "echo",
        executor_fn(|ctx: ExecutionContext| async move {
            Ok::<_, NodeError>(NodeOutput::from(ctx.inputs))
        }),
    );

    let mut wf = WorkflowDefinition::new("late cancel");
    wf.add_node(NodeSpec::new("a", "finish_then_cancel"));
    wf.add_node(NodeSpec::new("b", "echo"));
    wf.connect("a", "done", "b", "done");

    let runtime = WeaveRuntime::with_registry(registry, RuntimeConfig::default());
    let state = runtime
        .run(&wf, RunOptions::new().with_cancellation(token))
        .await;

    let a = state.node("a").unwrap();
    assert_eq!(a.status, NodeStatus::Completed);
    assert_eq!(a.error, None);
    assert_eq!(a.output.as_ref().unwrap()["done"], Value::Bool(true));
    assert_eq!(state.node("b").unwrap().status, NodeStatus::Pending);
    assert_eq!(state.status, WorkflowStatus::Cancelled);
}

#[tokio::test]
async fn max_parallel_caps_in_flight_nodes() {
    init_tracing();

    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let registry = Arc::new(ExecutorRegistry::new());
    {
        let in_flight = in_flight.clone();
        let peak = peak.clone();
        registry.register(
            "tracked",
            executor_fn(move |_ctx: ExecutionContext| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, NodeError>(NodeOutput::new())
                }
            }),
        );
    }

    let mut wf = WorkflowDefinition::new("capped");
    for id in ["a", "b", "c", "d", "e"] {
        wf.add_node(NodeSpec::new(id, "tracked"));
    }

    let config = RuntimeConfig {
        max_parallel_nodes: Some(2),
        ..RuntimeConfig::default()
    };
    let runtime = WeaveRuntime::with_registry(registry, config);
    let state = runtime.run(&wf, RunOptions::new()).await;

    assert_eq!(state.status, WorkflowStatus::Completed);
    assert_eq!(peak.load(Ordering::SeqCst), 2);
}

#[test]
fn validate_returns_plan_or_error() {
    let runtime = WeaveRuntime::new();

    let mut wf = WorkflowDefinition::new("plan");
    wf.add_node(NodeSpec::new("b", "t"));
    wf.add_node(NodeSpec::new("a", "t"));
    wf.connect_default("b", "a");
    let plan = runtime.validate(&wf).unwrap();
    assert_eq!(plan.order(), ["b", "a"]);

    wf.connect_default("a", "b");
    assert!(runtime.validate(&wf).unwrap_err().is_cycle());
}

#[test]
fn runtime_config_reads_partial_json() {
    let config: RuntimeConfig = serde_json::from_str(r#"{ "node_timeout_ms": 2500 }"#).unwrap();

    assert_eq!(config.max_parallel_nodes, None);
    assert_eq!(config.node_timeout(), Some(Duration::from_millis(2500)));
    assert_eq!(RuntimeConfig::default().node_timeout(), None);
}

#[tokio::test]
async fn workflow_files_round_trip() {
    init_tracing();

    let mut wf = WorkflowDefinition::new("saved");
    wf.add_node(
        NodeSpec::new("a", "emit")
            .with_config("out", "from disk")
            .with_outputs(["out"]),
    );
    wf.add_node(NodeSpec::new("b", "echo").with_inputs(["in"]));
    wf.connect("a", "out", "b", "in");

    let path = std::env::temp_dir().join(format!("weave-{}.json", uuid::Uuid::new_v4()));
    save_workflow(&path, &wf).unwrap();
    let loaded = load_workflow(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(loaded.name, "saved");
    assert_eq!(loaded.nodes.len(), 2);
    assert_eq!(loaded.edges[0].source_handle.as_deref(), Some("out"));

    let runtime = WeaveRuntime::with_registry(test_registry(), RuntimeConfig::default());
    let state = runtime.run(&loaded, RunOptions::new()).await;
    assert_eq!(
        state.node("b").unwrap().input.get("in"),
        Some(&Value::from("from disk"))
    );
}

#[test]
fn missing_workflow_file_is_an_io_error() {
    let err = load_workflow("/definitely/not/here.json").unwrap_err();
    assert!(matches!(err, weavecore::FlowError::Io(_)));
}
