//! Arena-backed navigation graph

use action_primitives::Action;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::errors::GraphError;

/// Stable index of a node in its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Stable index of an edge; also its insertion order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// How a node's templates combine to identify it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Any one template identifies the node; aggregate is the best score
    #[default]
    Any,
    /// Every template must match; aggregate is the mean score
    All,
}

/// A recognizable UI state
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub templates: Vec<String>,
    pub match_mode: MatchMode,
}

impl Node {
    pub fn new(name: impl Into<String>, templates: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            templates: templates.into_iter().map(Into::into).collect(),
            match_mode: MatchMode::Any,
        }
    }

    pub fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }
}

/// A directed transition realized by one action
#[derive(Debug, Clone)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub action: Action,
    pub weight: f64,
    /// Expected time for the UI to settle after the action
    pub delay: Duration,
}

impl Edge {
    pub fn new(from: NodeId, to: NodeId, action: Action) -> Self {
        Self {
            from,
            to,
            action,
            weight: 1.0,
            delay: Duration::ZERO,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Directed, possibly cyclic graph of UI states.
///
/// Nodes and edges live in arenas and refer to each other by index, so cycles
/// need no special handling. The graph is append-only.
#[derive(Debug, Clone, Default)]
pub struct NavGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    by_name: HashMap<String, NodeId>,
    outgoing: Vec<Vec<EdgeId>>,
    incoming: Vec<Vec<EdgeId>>,
}

impl NavGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Node) -> Result<NodeId, GraphError> {
        if self.by_name.contains_key(&node.name) {
            return Err(GraphError::DuplicateNode(node.name));
        }
        if node.templates.is_empty() {
            return Err(GraphError::EmptyNode(node.name));
        }
        let id = NodeId(self.nodes.len());
        self.by_name.insert(node.name.clone(), id);
        self.nodes.push(node);
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        Ok(id)
    }

    pub fn add_edge(&mut self, edge: Edge) -> Result<EdgeId, GraphError> {
        let from = self.require(edge.from)?.name.clone();
        let to = self.require(edge.to)?.name.clone();
        if !(edge.weight.is_finite() && edge.weight >= 0.0) {
            return Err(GraphError::InvalidWeight {
                from,
                to,
                weight: edge.weight,
            });
        }
        let id = EdgeId(self.edges.len());
        self.outgoing[edge.from.0].push(id);
        self.incoming[edge.to.0].push(id);
        self.edges.push(edge);
        Ok(id)
    }

    fn require(&self, id: NodeId) -> Result<&Node, GraphError> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    /// Node name for logging; unknown ids print as their index
    pub fn name_of(&self, id: NodeId) -> String {
        self.node(id)
            .map(|n| n.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.0)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges.iter().enumerate().map(|(i, e)| (EdgeId(i), e))
    }

    /// Outgoing edges in insertion order
    pub fn outgoing(&self, id: NodeId) -> &[EdgeId] {
        self.outgoing.get(id.0).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Nodes from which `target` can be reached (including `target` itself)
    pub fn nodes_reaching(&self, target: NodeId) -> Vec<NodeId> {
        let mut seen = vec![false; self.nodes.len()];
        let mut queue = VecDeque::new();
        if let Some(flag) = seen.get_mut(target.0) {
            *flag = true;
            queue.push_back(target);
        }
        while let Some(current) = queue.pop_front() {
            for edge_id in &self.incoming[current.0] {
                let from = self.edges[edge_id.0].from;
                if !seen[from.0] {
                    seen[from.0] = true;
                    queue.push_back(from);
                }
            }
        }
        seen.iter()
            .enumerate()
            .filter(|(_, reached)| **reached)
            .map(|(i, _)| NodeId(i))
            .collect()
    }

    /// Edges that can lie on some path to `target`
    pub fn edges_toward(&self, target: NodeId) -> Vec<EdgeId> {
        let reaching = self.nodes_reaching(target);
        let mut useful = vec![false; self.nodes.len()];
        for id in reaching {
            useful[id.0] = true;
        }
        self.edges()
            .filter(|(_, e)| useful[e.from.0] && useful[e.to.0])
            .map(|(id, _)| id)
            .collect()
    }

    /// Check every node's templates against a lookup
    pub fn validate_templates<F>(&self, known: F) -> Result<(), GraphError>
    where
        F: Fn(&str) -> bool,
    {
        for node in &self.nodes {
            if let Some(missing) = node.templates.iter().find(|t| !known(t.as_str())) {
                return Err(GraphError::UnknownTemplate {
                    node: node.name.clone(),
                    template: missing.clone(),
                });
            }
        }
        debug!(nodes = self.nodes.len(), "node templates validated");
        Ok(())
    }
}
