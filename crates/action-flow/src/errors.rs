//! Engine error types

use autoplay_core_types::Capability;
use nav_graph::GraphError;
use thiserror::Error;

/// Errors raised while binding a task to an engine.
///
/// These are structural: nothing here is retried.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// Controller cannot perform an action the task may need
    #[error("Capability {capability} unavailable for action {action}")]
    CapabilityUnavailable {
        action: String,
        capability: Capability,
    },

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Unknown template {template} referenced by {context}")]
    UnknownTemplate { context: String, template: String },

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Invalid task {task}: {reason}")]
    InvalidTask { task: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
