//! Navigation graph of recognizable UI states
//!
//! Nodes are UI states identified by templates; edges are actions that move
//! the device from one state to another. Planning picks the minimum-weight
//! route with deterministic tie-breaking.

pub mod errors;
pub mod graph;
pub mod planner;

pub use errors::GraphError;
pub use graph::{Edge, EdgeId, MatchMode, NavGraph, Node, NodeId};
pub use planner::Path;
