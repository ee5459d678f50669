use action_primitives::Action;
use nav_graph::{Edge, NavGraph, Node, NodeId};

/// Small deterministic generator so failures reproduce
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, bound: u64) -> u64 {
        self.next() % bound
    }
}

fn random_graph(rng: &mut XorShift) -> NavGraph {
    let mut g = NavGraph::new();
    let nodes = 2 + rng.below(9) as usize;
    for i in 0..nodes {
        g.add_node(Node::new(format!("s{}", i), [format!("t{}", i)]))
            .unwrap();
    }
    let edges = rng.below((nodes * nodes) as u64) as usize;
    for _ in 0..edges {
        let from = NodeId(rng.below(nodes as u64) as usize);
        let to = NodeId(rng.below(nodes as u64) as usize);
        let weight = rng.below(10) as f64;
        let action = Action::Click {
            x: rng.below(100) as u32,
            y: 0,
        };
        g.add_edge(Edge::new(from, to, action).with_weight(weight))
            .unwrap();
    }
    g
}

fn floyd_warshall(g: &NavGraph) -> Vec<Vec<f64>> {
    let n = g.node_count();
    let mut dist = vec![vec![f64::INFINITY; n]; n];
    for (i, row) in dist.iter_mut().enumerate() {
        row[i] = 0.0;
    }
    for (_, e) in g.edges() {
        let d = &mut dist[e.from.0][e.to.0];
        *d = d.min(e.weight);
    }
    for k in 0..n {
        for i in 0..n {
            for j in 0..n {
                let through = dist[i][k] + dist[k][j];
                if through < dist[i][j] {
                    dist[i][j] = through;
                }
            }
        }
    }
    dist
}

#[test]
fn planned_weight_matches_reference() {
    let mut rng = XorShift(0x9E37_79B9_7F4A_7C15);
    for _ in 0..200 {
        let g = random_graph(&mut rng);
        let reference = floyd_warshall(&g);
        let n = g.node_count();

        for from in 0..n {
            for to in 0..n {
                let planned = g.shortest_path(NodeId(from), NodeId(to));
                match planned {
                    None => assert!(reference[from][to].is_infinite()),
                    Some(path) => {
                        assert_eq!(path.total_weight, reference[from][to]);

                        // the path is a connected walk from -> to with the reported weight
                        let mut at = NodeId(from);
                        let mut sum = 0.0;
                        for id in &path.edges {
                            let edge = g.edge(*id).unwrap();
                            assert_eq!(edge.from, at);
                            at = edge.to;
                            sum += edge.weight;
                        }
                        assert_eq!(at, NodeId(to));
                        assert_eq!(sum, path.total_weight);
                    }
                }
            }
        }
    }
}

#[test]
fn planning_is_repeatable() {
    let mut rng = XorShift(42);
    let g = random_graph(&mut rng);
    let n = g.node_count();
    for from in 0..n {
        for to in 0..n {
            let first = g.shortest_path(NodeId(from), NodeId(to));
            let second = g.shortest_path(NodeId(from), NodeId(to));
            assert_eq!(first, second);
        }
    }
}

#[test]
fn rejects_invalid_edges() {
    let mut g = NavGraph::new();
    let a = g.add_node(Node::new("a", ["a"])).unwrap();
    let b = g.add_node(Node::new("b", ["b"])).unwrap();

    let click = Action::Click { x: 0, y: 0 };
    assert!(g
        .add_edge(Edge::new(a, b, click.clone()).with_weight(-1.0))
        .is_err());
    assert!(g
        .add_edge(Edge::new(a, b, click.clone()).with_weight(f64::NAN))
        .is_err());
    assert!(g.add_edge(Edge::new(a, NodeId(7), click)).is_err());
    assert!(g.add_node(Node::new("a", ["x"])).is_err());
    assert!(g.add_node(Node::new("empty", Vec::<String>::new())).is_err());
}

#[test]
fn reverse_reachability() {
    let mut g = NavGraph::new();
    let ids: Vec<_> = ["home", "menu", "shop", "island"]
        .iter()
        .map(|n| g.add_node(Node::new(*n, [*n])).unwrap())
        .collect();
    let click = Action::Click { x: 0, y: 0 };
    g.add_edge(Edge::new(ids[0], ids[1], click.clone())).unwrap();
    g.add_edge(Edge::new(ids[1], ids[2], click.clone())).unwrap();
    g.add_edge(Edge::new(ids[2], ids[0], click.clone())).unwrap();
    g.add_edge(Edge::new(ids[2], ids[3], click)).unwrap();

    assert_eq!(g.nodes_reaching(ids[1]), vec![ids[0], ids[1], ids[2]]);
    assert_eq!(g.nodes_reaching(ids[3]).len(), 4);
    // edge into island cannot help reach menu
    assert_eq!(g.edges_toward(ids[1]).len(), 3);
}
