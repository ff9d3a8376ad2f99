//! Loads the sample environment, prompts on stdin, and runs it until the
//! host interaction finishes or Ctrl-C arrives.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use plumber::capabilities::{CapabilityRegistry, ProcessCapability};
use plumber::config::{DefinitionSource, EnvironmentRegistry, ScriptCatalog};
use plumber::kernel::{EnvironmentRuntime, RuntimeConfig, ShutdownSignal};
use plumber::primitives::{Context, ScriptResult, script_fn};
use plumber::prompts::LinePromptAdapter;
use plumber::telemetry::TelemetryConfig;
use serde_json::Value;
use tracing::info;

#[derive(Debug, Parser)]
#[command(about = "Run a Plumber environment definition")]
struct Args {
    /// Definition file (.json, .yaml or .yml).
    #[arg(
        long,
        default_value = concat!(env!("CARGO_MANIFEST_DIR"), "/environments/sample-environment.json")
    )]
    definition: PathBuf,

    /// Environment to launch; defaults to the one defined in the file.
    #[arg(long)]
    environment: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    plumber::telemetry::init(&TelemetryConfig::default())?;
    let args = Args::parse();

    let mut catalog = ScriptCatalog::with_builtins();
    catalog.register_script("announce", script_fn(announce))?;
    catalog.register_script("goodbye", script_fn(goodbye))?;

    let registry = EnvironmentRegistry::new(catalog);
    let loaded = registry.load(&DefinitionSource::file(&args.definition))?;
    let name = args
        .environment
        .unwrap_or_else(|| loaded.name().to_owned());

    // Shared so the exit code requested by scripts outlives the session.
    let process = Arc::new(ProcessCapability::new());
    let capabilities = CapabilityRegistry::new();
    capabilities.register_instance(process.clone())?;

    let runtime = EnvironmentRuntime::new(
        Arc::new(capabilities),
        Arc::new(LinePromptAdapter::stdio()),
        Arc::new(ShutdownSignal),
        RuntimeConfig::default(),
    )?;

    let session = runtime.launch(&registry, &name).await?;
    let report = session.run_with(&script_fn(interact)).await;
    info!(
        outcome = ?report.outcome,
        exit_failures = report.exit_failures.len(),
        "session report"
    );

    if let Some(code) = process.requested_exit_code() {
        std::process::exit(code);
    }
    Ok(())
}

fn announce(ctx: &mut Context) -> ScriptResult<()> {
    let mode = if ctx.data("isDevelopment") == Some(&Value::Bool(true)) {
        "development"
    } else {
        "production"
    };
    println!("Plumber is now running on {mode} environment");

    let welcome = ctx.require("welcomeText")?.as_str().unwrap_or_default();
    let username = ctx.require("username")?.as_str().unwrap_or_default();
    let greeting = format!("{welcome} {username}");
    ctx.call("sayHello", Some(Value::from(greeting)))?;
    Ok(())
}

fn interact(ctx: &mut Context) -> ScriptResult<()> {
    let name = ctx.require("username")?.as_str().unwrap_or("stranger");
    println!("Hello, {name}! Session {} is ready.", ctx.session_id());
    Ok(())
}

fn goodbye(ctx: &mut Context) -> ScriptResult<()> {
    let process = ctx.capability::<ProcessCapability>("p")?;
    println!("Goodbye from pid {}.", process.id());
    process.request_exit(0);
    Ok(())
}
