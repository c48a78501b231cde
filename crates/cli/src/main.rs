//! `workflow-core` CLI entry-point.
//!
//! Available sub-commands:
//! - `validate`: check a definition (and optional extensions file) builds.
//! - `run`: feed events to a definition using dry-run capabilities and
//!   print every emitted event plus the final snapshot.

mod dry_run;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use engine::{
    Checkpoint, ExtensionsBuilder, RunnerArgs, RunnerConfig, WorkflowDefinition, WorkflowRunner,
};
use plugins::{StatePlugin, WorkflowEvent};

use crate::dry_run::{ExtensionsFile, LoggingChildInvoker, LoggingStateAction, LoopbackIntegration};

#[derive(Parser)]
#[command(name = "workflow-core", about = "Workflow execution core", version)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a workflow definition and its extensions.
    Validate {
        #[arg(long)]
        definition: PathBuf,
        #[arg(long)]
        extensions: Option<PathBuf>,
    },
    /// Run events against a definition with dry-run integrations.
    Run {
        #[arg(long)]
        definition: PathBuf,
        #[arg(long)]
        extensions: Option<PathBuf>,
        /// Resume from a `{state, machineContext}` file.
        #[arg(long)]
        checkpoint: Option<PathBuf>,
        #[arg(long)]
        runtime_id: Option<String>,
        /// Runner configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// `TYPE` or `TYPE=<json payload>`; repeatable, processed in order.
        #[arg(long = "event", required = true)]
        events: Vec<String>,
        /// Write the final checkpoint here.
        #[arg(long)]
        save_checkpoint: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Command::Validate {
            definition,
            extensions,
        } => {
            let runner = build_runner(
                "validate".into(),
                &definition,
                extensions.as_deref(),
                None,
                RunnerConfig::default(),
            )?;
            println!("workflow is valid, initial state '{}'", runner.state());
        }
        Command::Run {
            definition,
            extensions,
            checkpoint,
            runtime_id,
            config,
            events,
            save_checkpoint,
        } => {
            let config = RunnerConfig::load(config.as_deref())?;
            let checkpoint = checkpoint
                .as_deref()
                .map(read_json::<Checkpoint>)
                .transpose()?;
            let runtime_id = runtime_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

            let mut runner =
                build_runner(runtime_id, &definition, extensions.as_deref(), checkpoint, config)?;
            runner.subscribe(|event: &WorkflowEvent| {
                if let Ok(line) = serde_json::to_string(event) {
                    println!("{line}");
                }
            });

            for raw in &events {
                let event = parse_event(raw)?;
                info!(event = %event.event_type, "sending event");
                runner.process(event).await?;
            }

            println!("{}", serde_json::to_string_pretty(&runner.snapshot())?);

            if let Some(path) = save_checkpoint {
                std::fs::write(&path, serde_json::to_vec_pretty(&runner.checkpoint())?)
                    .with_context(|| format!("cannot write checkpoint {}", path.display()))?;
                info!(path = %path.display(), "checkpoint saved");
            }
        }
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_runner(
    runtime_id: String,
    definition: &Path,
    extensions: Option<&Path>,
    checkpoint: Option<Checkpoint>,
    config: RunnerConfig,
) -> Result<WorkflowRunner> {
    let definition: WorkflowDefinition = read_json(definition)?;
    let file: ExtensionsFile = extensions.map(read_json).transpose()?.unwrap_or_default();

    let mut builder = ExtensionsBuilder::new()
        .descriptors(file.descriptors)
        .integration(Arc::new(LoopbackIntegration))
        .child_invoker(Arc::new(LoggingChildInvoker));
    for binding in file.blocking_state_plugins {
        let action = Arc::new(LoggingStateAction {
            name: binding.name.clone(),
        });
        builder = builder.state_plugin(StatePlugin::new(
            binding.name,
            binding.state_names,
            binding.when,
            binding.is_blocking,
            action,
        ));
    }

    let runner = WorkflowRunner::new(
        RunnerArgs {
            runtime_id,
            definition,
            extensions: builder,
            checkpoint,
        },
        config,
    )?;
    Ok(runner)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}

/// `GO` or `GO={"amount":10}`.
fn parse_event(raw: &str) -> Result<WorkflowEvent> {
    let (event_type, payload) = match raw.split_once('=') {
        Some((event_type, payload)) => {
            let payload: Value = serde_json::from_str(payload)
                .with_context(|| format!("invalid payload for event {event_type}"))?;
            (event_type, payload)
        }
        None => (raw, Value::Null),
    };
    if event_type.is_empty() {
        bail!("event type must not be empty");
    }
    Ok(WorkflowEvent::new(event_type).with_payload(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_bare_and_payload_events() {
        assert_eq!(parse_event("GO").unwrap(), WorkflowEvent::new("GO"));
        assert_eq!(
            parse_event(r#"UPDATE_CONTEXT={"amount":10}"#).unwrap().payload,
            json!({ "amount": 10 })
        );
        assert!(parse_event("=1").is_err());
        assert!(parse_event("GO={oops").is_err());
    }
}
