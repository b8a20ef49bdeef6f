// Operational CLI over the RuntimeEngine: load a definition, drive one
// instance through it, and inspect lifecycle/error output. Each invocation
// owns a fresh in-process engine — the in-memory persistence store does
// not survive across process runs, so `run` (define+start+execute in one
// shot) is the common case; the finer-grained subcommands exist for
// scripting a single session via one `define`-then-act pipeline.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use workflow_runtime::atoms::{ConditionId, Context, ContextScope, State, StateId, StateType, Transition, TransitionType, WorkId};
use workflow_runtime::config::RuntimeConfig;
use workflow_runtime::cores::StateMachineCore;
use workflow_runtime::error::{Result, WorkflowError};
use workflow_runtime::runtime::{InMemoryPersistenceStore, InstanceStatus, RuntimeEngine};
use workflow_runtime::workflow::{Configuration, WorkflowDefinition};

#[derive(Parser)]
#[command(name = "workflow-cli", about = "Inspect and drive the workflow runtime", version)]
struct Cli {
    /// Path to a workflow definition JSON file.
    #[arg(short, long, global = true)]
    definition: Option<PathBuf>,

    /// Path to a JSON object used as the initial context.
    #[arg(short, long, global = true)]
    context: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load and validate a definition file without running it.
    Define,
    /// Start an instance and execute it to completion.
    Run,
    /// Start an instance and execute a single step.
    Step,
    /// Start, pause, then report status.
    Pause,
    /// Start, pause, resume, then run to completion.
    Resume,
    /// Start, then cancel immediately.
    Cancel,
    /// Start and report status without advancing.
    Status,
    /// Start, run to completion, then print the lifecycle event log.
    Events,
    /// Start, run until it can't proceed, then print the error ledger.
    Errors,
}

#[derive(Debug, Deserialize)]
struct StateFile {
    id: String,
    #[serde(rename = "type")]
    state_type: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct TransitionFile {
    id: String,
    #[serde(rename = "type")]
    transition_type: String,
    from: String,
    to: String,
    name: String,
    #[serde(default)]
    conditions: Vec<String>,
    #[serde(default)]
    actions: Vec<String>,
    #[serde(default)]
    priority: i64,
}

#[derive(Debug, Deserialize)]
struct DefinitionFile {
    id: String,
    version: String,
    name: String,
    states: Vec<StateFile>,
    transitions: Vec<TransitionFile>,
    initial_state: String,
    #[serde(default)]
    final_states: Vec<String>,
    #[serde(default)]
    error_states: Vec<String>,
    #[serde(default)]
    configuration: Option<ConfigurationFile>,
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct ConfigurationFile {
    #[serde(default)]
    max_concurrent_instances: Option<u32>,
    #[serde(default)]
    default_timeout_seconds: Option<u64>,
    #[serde(default)]
    compensation_enabled: Option<bool>,
    #[serde(default)]
    persistence_enabled: Option<bool>,
    #[serde(default)]
    logging_level: Option<String>,
    #[serde(default)]
    environment: HashMap<String, String>,
}

fn parse_state_type(s: &str) -> Result<StateType> {
    match s {
        "initial" => Ok(StateType::Initial),
        "intermediate" => Ok(StateType::Intermediate),
        "final" => Ok(StateType::Final),
        "error" => Ok(StateType::Error),
        other => Err(WorkflowError::Validation(format!("unknown state type '{other}'"))),
    }
}

fn parse_transition_type(s: &str) -> Result<TransitionType> {
    match s {
        "automatic" => Ok(TransitionType::Automatic),
        "manual" => Ok(TransitionType::Manual),
        "conditional" => Ok(TransitionType::Conditional),
        "compensation" => Ok(TransitionType::Compensation),
        other => Err(WorkflowError::Validation(format!("unknown transition type '{other}'"))),
    }
}

fn load_definition(path: &PathBuf) -> Result<WorkflowDefinition> {
    let raw = fs::read_to_string(path)?;
    let file: DefinitionFile = serde_json::from_str(&raw)?;

    let state_machine = StateMachineCore::new();
    for s in &file.states {
        state_machine.add_state(State::new(s.id.clone(), parse_state_type(&s.state_type)?, s.name.clone()))?;
    }
    for t in &file.transitions {
        let mut transition = Transition::new(
            t.id.clone(),
            parse_transition_type(&t.transition_type)?,
            t.from.clone(),
            t.to.clone(),
            t.name.clone(),
        )
        .with_priority(t.priority);
        if !t.conditions.is_empty() {
            transition = transition.with_conditions(t.conditions.iter().map(|c| ConditionId::new(c.clone())).collect());
        }
        if !t.actions.is_empty() {
            transition = transition.with_actions(t.actions.iter().map(|a| WorkId::new(a.clone())).collect());
        }
        state_machine.add_transition(transition)?;
    }

    let mut configuration = Configuration::default();
    if let Some(cfg) = file.configuration {
        if let Some(v) = cfg.max_concurrent_instances {
            configuration.max_concurrent_instances = v;
        }
        if let Some(v) = cfg.default_timeout_seconds {
            configuration.default_timeout_seconds = v;
        }
        if let Some(v) = cfg.compensation_enabled {
            configuration.compensation_enabled = v;
        }
        if let Some(v) = cfg.persistence_enabled {
            configuration.persistence_enabled = v;
        }
        if let Some(v) = cfg.logging_level {
            configuration.logging_level = v;
        }
        configuration.environment = cfg.environment;
    }

    let definition = WorkflowDefinition::new(file.id, file.version, file.name, state_machine, file.initial_state)
        .with_final_states(file.final_states.into_iter().map(StateId::new))
        .with_error_states(file.error_states.into_iter().map(StateId::new))
        .with_configuration(configuration)
        .activate();

    definition.validate()?;
    Ok(definition)
}

fn load_initial_context(path: Option<&PathBuf>) -> Result<Context> {
    let mut context = Context::new("cli-initial", ContextScope::Workflow, "cli");
    if let Some(path) = path {
        let raw = fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&raw)?;
        if let Value::Object(map) = value {
            for (k, v) in map {
                context = context.set(k, v);
            }
        }
    }
    Ok(context)
}

fn print_status(label: &str, status: InstanceStatus) {
    let rendered = format!("{status:?}");
    let colored = match status {
        InstanceStatus::Completed => rendered.green(),
        InstanceStatus::Failed | InstanceStatus::Cancelled => rendered.red(),
        InstanceStatus::Paused => rendered.yellow(),
        _ => rendered.cyan(),
    };
    println!("{label}: {colored}");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let runtime_config = RuntimeConfig::load().unwrap_or_default();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new(runtime_config.log_level.clone())
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let definition_path = cli
        .definition
        .clone()
        .ok_or_else(|| anyhow::anyhow!("--definition <path> is required"))?;
    let definition = load_definition(&definition_path)?;

    if matches!(cli.command, Command::Define) {
        println!("{} definition '{}' is valid", "OK".green().bold(), definition.id);
        return Ok(());
    }

    let persistence = Arc::new(InMemoryPersistenceStore::new());
    let engine = RuntimeEngine::new(persistence);
    engine
        .register_work_executor(
            "cloud_function".into(),
            Arc::new(workflow_runtime::executors::CloudFunctionExecutor),
        )
        .await
        .ok();

    let initial_context = load_initial_context(cli.context.as_ref())?;
    let instance_id = engine.start_workflow(&definition, initial_context).await?;
    println!("started instance {}", instance_id.bold());

    match cli.command {
        Command::Define => unreachable!("handled above"),
        Command::Run => {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
            spinner.set_message("executing workflow...");
            let outcome = engine.execute_workflow(&instance_id).await;
            spinner.finish_and_clear();
            outcome?;
            let status = engine.get_workflow_status(&instance_id).await?;
            print_status("final status", status);
        }
        Command::Step => {
            engine.execute_step(&instance_id).await?;
            let status = engine.get_workflow_status(&instance_id).await?;
            print_status("status after one step", status);
        }
        Command::Pause => {
            engine.pause_workflow(&instance_id).await?;
            let status = engine.get_workflow_status(&instance_id).await?;
            print_status("status", status);
        }
        Command::Resume => {
            engine.pause_workflow(&instance_id).await?;
            engine.resume_workflow(&instance_id).await?;
            engine.execute_workflow(&instance_id).await?;
            let status = engine.get_workflow_status(&instance_id).await?;
            print_status("final status", status);
        }
        Command::Cancel => {
            engine.cancel_workflow(&instance_id).await?;
            let status = engine.get_workflow_status(&instance_id).await?;
            print_status("status", status);
        }
        Command::Status => {
            let status = engine.get_workflow_status(&instance_id).await?;
            print_status("status", status);
        }
        Command::Events => {
            let _ = engine.execute_workflow(&instance_id).await;
            for event in engine.lifecycle().get_events(&instance_id) {
                println!("{} {:?} {}", event.timestamp, event.event_type, event.data);
            }
        }
        Command::Errors => {
            let _ = engine.execute_workflow(&instance_id).await;
            let errors = engine.error_handler().get_errors(&instance_id);
            if errors.is_empty() {
                println!("{}", "no errors recorded".green());
            }
            for err in errors {
                println!(
                    "{} [{:?}] {} (recoverable={})",
                    err.timestamp,
                    err.severity,
                    err.message.red(),
                    err.recoverable
                );
            }
        }
    }

    Ok(())
}
