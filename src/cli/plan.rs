use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::context::CliContext;
use crate::cli::output::emit;
use crate::manifest::Manifest;

#[derive(Args, Clone, Debug)]
pub struct PlanArgs {
    /// Manifest file
    #[arg(short, long)]
    pub manifest: PathBuf,

    /// Starting node
    #[arg(long)]
    pub from: String,

    /// Destination node
    #[arg(long)]
    pub to: String,
}

#[derive(Debug, Serialize)]
pub struct PlanSummary {
    pub from: String,
    pub to: String,
    pub total_weight: f64,
    pub hops: Vec<Hop>,
}

#[derive(Debug, Serialize)]
pub struct Hop {
    pub from: String,
    pub to: String,
    pub action: String,
    pub weight: f64,
}

pub async fn cmd_plan(args: PlanArgs, ctx: &CliContext) -> Result<()> {
    let manifest = Manifest::load(&args.manifest)?;
    let graph = &manifest.graph;

    let from = graph
        .node_id(&args.from)
        .with_context(|| format!("Unknown node {}", args.from))?;
    let to = graph
        .node_id(&args.to)
        .with_context(|| format!("Unknown node {}", args.to))?;
    let path = graph
        .shortest_path(from, to)
        .with_context(|| format!("No path from {} to {}", args.from, args.to))?;

    let hops = path
        .edges
        .iter()
        .filter_map(|id| graph.edge(*id))
        .map(|edge| Hop {
            from: graph.name_of(edge.from),
            to: graph.name_of(edge.to),
            action: edge.action.to_string(),
            weight: edge.weight,
        })
        .collect();

    let summary = PlanSummary {
        from: args.from,
        to: args.to,
        total_weight: path.total_weight,
        hops,
    };

    emit(ctx.output(), &summary, |s| {
        if s.hops.is_empty() {
            println!("Already at {}", s.to);
            return;
        }
        println!("{} -> {} (weight {})", s.from, s.to, s.total_weight);
        for (i, hop) in s.hops.iter().enumerate() {
            println!("  {}. {} -> {} via {} [{}]", i + 1, hop.from, hop.to, hop.action, hop.weight);
        }
    })
}
