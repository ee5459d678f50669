//! Lowest-cost path planning

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::graph::{EdgeId, NavGraph, NodeId};

/// Planned route: edges to take in order
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub edges: Vec<EdgeId>,
    pub total_weight: f64,
}

impl Path {
    pub fn first(&self) -> Option<EdgeId> {
        self.edges.first().copied()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[derive(Copy, Clone, PartialEq)]
struct State {
    cost: f64,
    seq: usize,
    position: usize,
}

impl Eq for State {}

// min-heap on cost, then on push order
impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl NavGraph {
    /// Minimum-weight path from `from` to `to`.
    ///
    /// Equal-cost alternatives resolve by edge insertion order: outgoing edges
    /// are relaxed in the order they were added and only a strictly cheaper
    /// route replaces a known one. Returns `None` when `to` is unreachable.
    pub fn shortest_path(&self, from: NodeId, to: NodeId) -> Option<Path> {
        let n = self.node_count();
        if from.0 >= n || to.0 >= n {
            return None;
        }

        let mut dist = vec![f64::INFINITY; n];
        let mut via: Vec<Option<EdgeId>> = vec![None; n];
        let mut settled = vec![false; n];
        let mut heap = BinaryHeap::new();
        let mut seq = 0;

        dist[from.0] = 0.0;
        heap.push(State {
            cost: 0.0,
            seq,
            position: from.0,
        });

        while let Some(State { cost, position, .. }) = heap.pop() {
            if settled[position] || cost > dist[position] {
                continue;
            }
            settled[position] = true;
            if position == to.0 {
                break;
            }

            for &edge_id in self.outgoing(NodeId(position)) {
                let Some(edge) = self.edge(edge_id) else {
                    continue;
                };
                let next = edge.to.0;
                let next_cost = cost + edge.weight;
                if !settled[next] && next_cost < dist[next] {
                    dist[next] = next_cost;
                    via[next] = Some(edge_id);
                    seq += 1;
                    heap.push(State {
                        cost: next_cost,
                        seq,
                        position: next,
                    });
                }
            }
        }

        if !dist[to.0].is_finite() {
            return None;
        }

        let mut edges = Vec::new();
        let mut cursor = to.0;
        while cursor != from.0 {
            let edge_id = via[cursor]?;
            edges.push(edge_id);
            cursor = self.edge(edge_id)?.from.0;
        }
        edges.reverse();

        Some(Path {
            edges,
            total_weight: dist[to.0],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node};
    use action_primitives::Action;

    fn graph(names: &[&str]) -> (NavGraph, Vec<NodeId>) {
        let mut g = NavGraph::new();
        let ids = names
            .iter()
            .map(|name| g.add_node(Node::new(*name, [format!("{}_tpl", name)])).unwrap())
            .collect();
        (g, ids)
    }

    fn click(x: u32) -> Action {
        Action::Click { x, y: 0 }
    }

    #[test]
    fn test_prefers_cheaper_detour() {
        let (mut g, n) = graph(&["a", "b", "c"]);
        g.add_edge(Edge::new(n[0], n[2], click(1)).with_weight(5.0)).unwrap();
        let ab = g.add_edge(Edge::new(n[0], n[1], click(2)).with_weight(1.0)).unwrap();
        let bc = g.add_edge(Edge::new(n[1], n[2], click(3)).with_weight(1.5)).unwrap();

        let path = g.shortest_path(n[0], n[2]).unwrap();
        assert_eq!(path.edges, vec![ab, bc]);
        assert_eq!(path.total_weight, 2.5);
    }

    #[test]
    fn test_ties_follow_insertion_order() {
        let (mut g, n) = graph(&["a", "b"]);
        let first = g.add_edge(Edge::new(n[0], n[1], click(1))).unwrap();
        g.add_edge(Edge::new(n[0], n[1], click(2))).unwrap();

        for _ in 0..10 {
            assert_eq!(g.shortest_path(n[0], n[1]).unwrap().edges, vec![first]);
        }
    }

    #[test]
    fn test_cycles_and_self_path() {
        let (mut g, n) = graph(&["menu", "settings"]);
        g.add_edge(Edge::new(n[0], n[1], click(1))).unwrap();
        g.add_edge(Edge::new(n[1], n[0], click(2))).unwrap();

        let here = g.shortest_path(n[0], n[0]).unwrap();
        assert!(here.is_empty());
        assert_eq!(here.total_weight, 0.0);
        assert_eq!(g.shortest_path(n[1], n[0]).unwrap().len(), 1);
    }

    #[test]
    fn test_disconnected_is_none() {
        let (mut g, n) = graph(&["a", "b", "c", "d"]);
        g.add_edge(Edge::new(n[0], n[1], click(1))).unwrap();
        g.add_edge(Edge::new(n[2], n[3], click(2))).unwrap();

        assert!(g.shortest_path(n[2], n[1]).is_none());
        assert!(g.shortest_path(n[1], n[0]).is_none());
    }

    #[test]
    fn test_zero_weight_edges() {
        let (mut g, n) = graph(&["a", "b", "c"]);
        g.add_edge(Edge::new(n[0], n[1], click(1)).with_weight(0.0)).unwrap();
        g.add_edge(Edge::new(n[1], n[2], click(2)).with_weight(0.0)).unwrap();
        let path = g.shortest_path(n[0], n[2]).unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path.total_weight, 0.0);
    }
}
