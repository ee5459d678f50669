use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::context::CliContext;
use crate::cli::output::emit;
use crate::manifest::Manifest;

#[derive(Args, Clone, Debug)]
pub struct ValidateArgs {
    /// Manifest file
    #[arg(short, long)]
    pub manifest: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct ValidateSummary {
    pub manifest: String,
    pub templates: usize,
    pub nodes: usize,
    pub edges: usize,
    pub recovery: usize,
    pub tasks: Vec<TaskSummary>,
}

#[derive(Debug, Serialize)]
pub struct TaskSummary {
    pub name: String,
    pub target: Option<String>,
    pub steps: usize,
    /// Nodes with some route to the target
    pub reachable_from: Vec<String>,
}

pub async fn cmd_validate(args: ValidateArgs, ctx: &CliContext) -> Result<()> {
    let manifest = Manifest::load(&args.manifest)?;
    let graph = &manifest.graph;

    let tasks = manifest
        .tasks
        .iter()
        .map(|task| {
            let reachable_from = task
                .target
                .as_deref()
                .and_then(|name| graph.node_id(name))
                .map(|target| {
                    graph
                        .nodes_reaching(target)
                        .into_iter()
                        .map(|id| graph.name_of(id))
                        .collect()
                })
                .unwrap_or_default();
            TaskSummary {
                name: task.name.clone(),
                target: task.target.clone(),
                steps: task.steps.len(),
                reachable_from,
            }
        })
        .collect();

    let summary = ValidateSummary {
        manifest: args.manifest.display().to_string(),
        templates: manifest.templates.len(),
        nodes: graph.node_count(),
        edges: graph.edge_count(),
        recovery: manifest.recovery.len(),
        tasks,
    };

    emit(ctx.output(), &summary, |s| {
        println!("Manifest {} is valid", s.manifest);
        println!(
            "  {} templates, {} nodes, {} edges, {} recovery actions",
            s.templates, s.nodes, s.edges, s.recovery
        );
        for task in &s.tasks {
            match &task.target {
                Some(target) => println!(
                    "  task {} -> {} ({} steps, reachable from {} nodes)",
                    task.name,
                    target,
                    task.steps,
                    task.reachable_from.len()
                ),
                None => println!("  task {} ({} steps)", task.name, task.steps),
            }
        }
    })
}
