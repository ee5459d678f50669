//! Node resolution from template matches

use nav_graph::{MatchMode, NavGraph, Node, NodeId};
use perceiver_visual::MatchReport;

/// What the engine believes the screen shows
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved { node: NodeId, score: f64 },
    Unknown,
    /// Top candidates too close to call, best first
    Ambiguous { candidates: Vec<(NodeId, f64)> },
}

/// Aggregate score of a node, or `None` when the node does not match
pub fn node_score(node: &Node, report: &MatchReport) -> Option<f64> {
    let scores = node
        .templates
        .iter()
        .map(|t| report.get(t).map(|m| m.score));

    match node.match_mode {
        MatchMode::Any => scores.flatten().reduce(f64::max),
        MatchMode::All => {
            let scores: Option<Vec<f64>> = scores.collect();
            let scores = scores?;
            if scores.is_empty() {
                return None;
            }
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        }
    }
}

/// Resolve the current node.
///
/// Several matching nodes resolve to the best one only when it leads the
/// runner-up by at least `epsilon`; otherwise the result is ambiguous and no
/// tie-break is attempted.
pub fn resolve(graph: &NavGraph, report: &MatchReport, epsilon: f64) -> Resolution {
    let mut candidates: Vec<(NodeId, f64)> = graph
        .nodes()
        .filter_map(|(id, node)| node_score(node, report).map(|score| (id, score)))
        .collect();

    // stable: equal scores keep node order
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

    let Some(&(node, top)) = candidates.first() else {
        return Resolution::Unknown;
    };

    // an exact tie is ambiguous even with a zero epsilon
    let too_close = |score: f64| score == top || top - score < epsilon;
    match candidates.get(1) {
        Some(&(_, second)) if too_close(second) => {
            candidates.retain(|&(_, score)| too_close(score));
            Resolution::Ambiguous { candidates }
        }
        _ => Resolution::Resolved { node, score: top },
    }
}
