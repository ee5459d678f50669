use clap::Subcommand;

use super::plan::PlanArgs;
use super::run::RunArgs;
use super::validate::ValidateArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Load a manifest and check every reference in it
    Validate(ValidateArgs),

    /// Show the lowest-cost route between two nodes
    Plan(PlanArgs),

    /// Run a task against a replayed device
    Run(RunArgs),
}
