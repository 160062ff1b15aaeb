// crates/weavecli/src/main.rs

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use weavecore::{
    NodeRunState, NodeSpec, NodeStatus, PortValues, Value, WorkflowDefinition, WorkflowStatus,
};
use weaveruntime::{load_workflow, ExecutorRegistry, RunOptions, RuntimeConfig, WeaveRuntime};

#[derive(Parser)]
#[command(name = "weave")]
#[command(about = "Weave workflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Input data as JSON object, delivered to root nodes
        #[arg(short, long)]
        input: Option<String>,

        /// Per-node timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Maximum number of nodes running at once
        #[arg(long)]
        max_parallel: Option<usize>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a workflow file
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            timeout_ms,
            max_parallel,
            verbose,
        } => {
            let level = if verbose {
                tracing::Level::DEBUG
            } else {
                tracing::Level::INFO
            };
            tracing_subscriber::fmt().with_max_level(level).init();

            let config = RuntimeConfig {
                max_parallel_nodes: max_parallel,
                node_timeout_ms: timeout_ms,
            };
            run_workflow(file, input, config).await?;
        }

        Commands::Validate { file } => {
            validate_workflow(file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_workflow(output)?;
        }
    }

    Ok(())
}

fn builtin_registry() -> Arc<ExecutorRegistry> {
    let registry = ExecutorRegistry::new();
    weavenodes::register_all(&registry);
    Arc::new(registry)
}

/// Parse `--input` into run inputs. Only JSON objects are accepted.
fn parse_inputs(input: Option<String>) -> Result<PortValues> {
    let Some(input) = input else {
        return Ok(PortValues::new());
    };

    let json: serde_json::Value = serde_json::from_str(&input)?;
    match Value::from(json) {
        Value::Object(map) => Ok(map),
        _ => bail!("Input must be a JSON object"),
    }
}

fn print_transition(node_id: &str, state: &NodeRunState) {
    match state.status {
        NodeStatus::Pending => {}
        NodeStatus::Running => println!("  ⚡ Starting node: {}", node_id),
        NodeStatus::Completed => println!(
            "  ✅ Node {} completed in {}ms",
            node_id,
            state.duration_ms().unwrap_or_default()
        ),
        NodeStatus::Error => println!(
            "  ❌ Node {} failed: {}",
            node_id,
            state.error.as_deref().unwrap_or("unknown error")
        ),
        NodeStatus::Skipped => println!("  ⏭️  Node {} skipped", node_id),
    }
}

async fn run_workflow(file: PathBuf, input: Option<String>, config: RuntimeConfig) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());

    let workflow = load_workflow(&file)?;

    println!("📋 Workflow: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Edges: {}", workflow.edges.len());
    println!();

    let inputs = parse_inputs(input)?;
    let runtime = WeaveRuntime::with_registry(builtin_registry(), config);

    println!("▶️  Workflow started");
    let options = RunOptions::new()
        .with_inputs(inputs)
        .on_node_state_change(print_transition);
    let state = runtime.run(&workflow, options).await;

    let duration_ms = state
        .ended_at
        .map(|end| (end - state.started_at).num_milliseconds())
        .unwrap_or_default();

    match state.status {
        WorkflowStatus::Completed => {
            println!("✨ Workflow completed successfully in {}ms", duration_ms)
        }
        WorkflowStatus::Cancelled => println!("🛑 Workflow cancelled after {}ms", duration_ms),
        _ => println!("💥 Workflow failed after {}ms", duration_ms),
    }

    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", state.execution_id);
    if let Some(error) = &state.error {
        println!("   Error: {}", error);
    }
    println!(
        "   Completed: {}/{} nodes",
        state.nodes_with_status(NodeStatus::Completed).len(),
        state.node_states.len()
    );
    for (node_id, error) in state.failures() {
        println!("   ❌ {}: {}", node_id, error);
    }
    let skipped = state.nodes_with_status(NodeStatus::Skipped);
    if !skipped.is_empty() {
        println!("   Skipped: {}", skipped.join(", "));
    }

    if let Some(final_output) = &state.final_output {
        let outputs: serde_json::Value = Value::Object(
            final_output
                .iter()
                .map(|(id, ports)| (id.clone(), Value::Object(ports.clone())))
                .collect(),
        )
        .into();

        println!();
        println!("📤 Outputs:");
        println!("{}", serde_json::to_string_pretty(&outputs)?);
    }

    if state.status != WorkflowStatus::Completed {
        bail!("workflow '{}' finished with status {:?}", workflow.name, state.status);
    }
    Ok(())
}

fn validate_workflow(file: PathBuf) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow = load_workflow(&file)?;
    let runtime = WeaveRuntime::with_registry(builtin_registry(), RuntimeConfig::default());

    let plan = match runtime.validate(&workflow) {
        Ok(plan) => plan,
        Err(e) => bail!("❌ Workflow is invalid: {}", e),
    };

    println!("✅ Workflow is valid:");
    println!("   Name: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Edges: {}", workflow.edges.len());
    println!("   Execution order: {}", plan.order().join(" -> "));

    for node in &workflow.nodes {
        if !runtime.registry().contains(&node.node_type) {
            println!(
                "   ⚠️  Node {} uses unregistered type {}",
                node.id, node.node_type
            );
        }
    }

    Ok(())
}

fn list_nodes() {
    println!("📦 Available Node Types:");
    println!();

    let registry = builtin_registry();

    for node_type in registry.list_node_types() {
        if let Some(metadata) = registry.get_metadata(&node_type) {
            println!("  • {} ({})", node_type, metadata.category);
            println!("    {}", metadata.description);
        } else {
            println!("  • {}", node_type);
        }
    }
}

fn create_example_workflow(output: PathBuf) -> Result<()> {
    let mut workflow = WorkflowDefinition::new("Example Workflow");
    workflow.description = Some("Parses a JSON document, waits, then logs it".to_string());

    let source = workflow.add_node(
        NodeSpec::new("source", "value.constant")
            .with_name("Document")
            .with_config("json", r#"{"greeting": "hello"}"#)
            .with_outputs(["json"]),
    );
    let parse = workflow.add_node(
        NodeSpec::new("parse", "transform.json_parse")
            .with_name("Parse")
            .with_inputs(["json"]),
    );
    let wait = workflow.add_node(
        NodeSpec::new("wait", "time.delay")
            .with_name("Wait")
            .with_config("delay_ms", 250.0),
    );
    let render = workflow.add_node(
        NodeSpec::new("render", "transform.json_stringify")
            .with_name("Render")
            .with_inputs(["value"]),
    );
    let log = workflow.add_node(
        NodeSpec::new("log", "debug.log")
            .with_name("Log")
            .with_inputs(["message"]),
    );

    workflow.connect(&source, "json", &parse, "json");
    workflow.connect(&parse, "parsed", &wait, "parsed");
    workflow.connect(&wait, "parsed", &render, "value");
    workflow.connect(&render, "json", &log, "message");

    weaveruntime::save_workflow(&output, &workflow)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  weave run --file {} --timeout-ms 5000", output.display());

    Ok(())
}
