use std::path::PathBuf;
use std::sync::Arc;

use action_flow::{EngineEvent, Outcome};
use anyhow::{bail, Context, Result};
use autoplay_event_bus::{to_mpsc, InMemoryBus};
use clap::Args;
use serde::Serialize;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::context::CliContext;
use crate::cli::output::emit;
use crate::manifest::Manifest;
use crate::replay::{RecordedAction, ReplayController};

const EVENT_BUFFER: usize = 1024;

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Manifest file
    #[arg(short, long)]
    pub manifest: PathBuf,

    /// Task to run
    #[arg(short, long)]
    pub task: String,

    /// Directory of PNG frames replayed as the device screen
    #[arg(short, long)]
    pub frames: PathBuf,

    /// Override the task's retry bound
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Include engine events in the output
    #[arg(long)]
    pub events: bool,
}

#[derive(Serialize)]
pub struct RunSummary<'a> {
    pub outcome: &'a Outcome,
    pub inputs: Vec<RecordedAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<EngineEvent>>,
}

pub async fn cmd_run(args: RunArgs, ctx: &CliContext) -> Result<()> {
    let manifest = Manifest::load(&args.manifest)?;
    let mut task = manifest
        .task(&args.task)
        .cloned()
        .with_context(|| format!("Unknown task {}", args.task))?;
    if let Some(max_retries) = args.max_retries {
        task = task.with_max_retries(max_retries);
    }

    let config = ctx.config();
    let device = Arc::new(
        ReplayController::from_dir(&args.frames)?
            .with_capabilities(config.replay.capability_set()),
    );

    let bus = InMemoryBus::<EngineEvent>::new(EVENT_BUFFER);
    let mut event_rx = to_mpsc(Arc::clone(&bus), EVENT_BUFFER);
    let engine = manifest
        .engine(Arc::clone(&device), config.engine.clone())
        .with_event_bus(bus);
    let bound = engine
        .load_task(task)
        .with_context(|| format!("Task {} rejected", args.task))?;

    // drains until the engine, the only publisher, is dropped
    let collector = tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = event_rx.recv().await {
            debug!(?event, "engine event");
            events.push(event);
        }
        events
    });

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling run");
                cancel.cancel();
            }
        })
    };

    info!(
        task = %bound.name(),
        max_retries = bound.max_retries(),
        step_timeout_ms = bound.step_timeout().as_millis() as u64,
        frames = device.frame_count(),
        config = %ctx.config_path().display(),
        "Running task on replay device"
    );
    let outcome = engine.run(&bound, &cancel).await;
    interrupt.abort();
    drop(engine);

    let events = collector.await.context("Event collector stopped")?;
    let summary = RunSummary {
        outcome: &outcome,
        inputs: device.recorded().await,
        events: args.events.then_some(events),
    };
    emit(ctx.output(), &summary, print_summary)?;

    match outcome.abort_reason() {
        None => Ok(()),
        Some(reason) => bail!("Task {} aborted: {}", bound.name(), reason),
    }
}

fn print_summary(summary: &RunSummary<'_>) {
    let report = summary.outcome.report();

    println!("\n=== Run summary ===");
    println!("Task: {}", report.task);
    match summary.outcome.abort_reason() {
        None => println!("Status: success ({}ms)", report.latency_ms),
        Some(reason) => {
            println!("Status: aborted ({}): {}", reason.kind(), reason);
            if reason.is_structural() {
                println!("The navigation graph has no such route; rerunning will not help");
            }
        }
    }
    if !report.visited.is_empty() {
        println!("Route: {}", report.visited.join(" -> "));
    }
    println!(
        "Actions: {} executed, {} failed; captures: {}; retries: {}",
        report.actions_executed, report.actions_failed, report.capture_attempts, report.retries
    );

    if !report.steps.is_empty() {
        println!("\nSteps:");
        for step in &report.steps {
            let status = if step.success { "ok" } else { "failed" };
            match &step.error {
                Some(error) => println!(
                    "- #{} {} {} after {} attempts: {}",
                    step.index, step.action, status, step.attempts, error
                ),
                None => println!(
                    "- #{} {} {} ({} attempts)",
                    step.index, step.action, status, step.attempts
                ),
            }
        }
    }

    if !summary.inputs.is_empty() {
        println!("\nInputs:");
        for input in &summary.inputs {
            println!("- [frame {}] {}", input.frame, input.action);
        }
    }

    if let Some(events) = &summary.events {
        println!("\nEvents: {}", events.len());
    }
}
