//! Error types for graph construction

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    #[error("Duplicate node: {0}")]
    DuplicateNode(String),

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Node {0} has no templates")]
    EmptyNode(String),

    #[error("Node {node} references unknown template {template}")]
    UnknownTemplate { node: String, template: String },

    #[error("Edge {from} -> {to} has invalid weight {weight} (must be finite and >= 0)")]
    InvalidWeight { from: String, to: String, weight: f64 },
}
