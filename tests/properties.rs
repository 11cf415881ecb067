//! Randomized checks of the graph store, traversals and layout against
//! straightforward reference implementations.

use std::collections::{BTreeMap, BTreeSet};

use graphwalk::config::LayoutConfig;
use graphwalk::traversal::WalkIter;
use graphwalk::{GraphSeed, GraphStore, NodeId, TraversalKind, compute_layout};
use proptest::{
    collection::vec,
    prelude::{Just, Strategy, prop_assert, prop_assert_eq},
    proptest,
};

type Edges = Vec<(NodeId, NodeId)>;

fn graph_strategy() -> impl Strategy<Value = (NodeId, Edges)> {
    (1_u32..=12).prop_flat_map(|n| (Just(n), vec((1..=n, 1..=n), 0..30)))
}

fn store(n: NodeId, edges: &[(NodeId, NodeId)]) -> GraphStore {
    GraphStore::new(GraphSeed::new(1..=n, edges)).expect("edges stay inside the universe")
}

fn find(parent: &mut BTreeMap<NodeId, NodeId>, node: NodeId) -> NodeId {
    let mut root = node;
    while parent[&root] != root {
        root = parent[&root];
    }
    parent.insert(node, root);
    root
}

fn union_find_components(n: NodeId, edges: &[(NodeId, NodeId)]) -> usize {
    let mut parent: BTreeMap<NodeId, NodeId> = (1..=n).map(|node| (node, node)).collect();
    for &(a, b) in edges {
        let ra = find(&mut parent, a);
        let rb = find(&mut parent, b);
        if ra != rb {
            parent.insert(ra, rb);
        }
    }
    (1..=n).filter(|&node| find(&mut parent, node) == node).count()
}

/// Hop distances by repeated relaxation, independent of any queue order.
fn reference_distances(graph: &GraphStore, start: NodeId) -> BTreeMap<NodeId, usize> {
    let mut dist = BTreeMap::from([(start, 0_usize)]);
    loop {
        let mut changed = false;
        for (from, to) in graph.edges() {
            let Some(&d) = dist.get(&from) else { continue };
            if dist.get(&to).is_none_or(|&current| d + 1 < current) {
                dist.insert(to, d + 1);
                changed = true;
            }
        }
        if !changed {
            return dist;
        }
    }
}

fn assert_reverse_is_inverse(graph: &GraphStore) {
    let forward: BTreeSet<(NodeId, NodeId)> = graph.edges().collect();
    let backward: BTreeSet<(NodeId, NodeId)> = graph
        .reverse_adjacency()
        .iter()
        .flat_map(|(&to, sources)| sources.iter().map(move |&from| (from, to)))
        .collect();
    assert_eq!(forward, backward);
}

proptest! {
    #[test]
    fn weak_components_match_union_find((n, edges) in graph_strategy()) {
        let graph = store(n, &edges);
        prop_assert_eq!(graph.weak_component_count(), union_find_components(n, &edges));
    }

    #[test]
    fn reverse_adjacency_tracks_removals_and_reset(
        (n, edges) in graph_strategy(),
        picks in vec(0_usize..64, 0..12),
    ) {
        let mut graph = store(n, &edges);
        let fresh = store(n, &edges);

        for pick in picks {
            if edges.is_empty() {
                break;
            }
            let (from, to) = edges[pick % edges.len()];
            graph.remove_edge(from, to);
            prop_assert!(!graph.remove_edge(from, to), "second removal must be a no-op");
            assert_reverse_is_inverse(&graph);
        }

        graph.reset();
        prop_assert_eq!(graph.adjacency(), fresh.adjacency());
        prop_assert_eq!(graph.reverse_adjacency(), fresh.reverse_adjacency());
    }

    #[test]
    fn bfs_layers_are_shortest_hop_levels((n, edges) in graph_strategy(), start_pick in 0_u32..12) {
        let graph = store(n, &edges);
        let start = start_pick % n + 1;
        let expected = reference_distances(&graph, start);

        let mut seen = BTreeMap::new();
        for (level, step) in WalkIter::new(&graph, TraversalKind::Bfs, start).enumerate() {
            prop_assert_eq!(step.counter, level + 1);
            for node in step.nodes {
                prop_assert!(seen.insert(node, level).is_none(), "node {} repeated", node);
            }
        }
        prop_assert_eq!(seen, expected);
    }

    #[test]
    fn dfs_visits_reachable_set_once((n, edges) in graph_strategy(), start_pick in 0_u32..12) {
        let graph = store(n, &edges);
        let start = start_pick % n + 1;
        let reachable: BTreeSet<NodeId> = reference_distances(&graph, start).into_keys().collect();

        let order: Vec<NodeId> = WalkIter::new(&graph, TraversalKind::Dfs, start)
            .flat_map(|step| step.nodes)
            .collect();
        let unique: BTreeSet<NodeId> = order.iter().copied().collect();
        prop_assert_eq!(order.len(), unique.len());
        prop_assert_eq!(order.first().copied(), Some(start));
        prop_assert_eq!(unique, reachable);
    }

    #[test]
    fn layout_ignores_edge_order((n, edges) in graph_strategy()) {
        let config = LayoutConfig::default();
        let forward = compute_layout(&store(n, &edges), &config);

        let mut reversed = edges.clone();
        reversed.reverse();
        let backward = compute_layout(&store(n, &reversed), &config);

        prop_assert_eq!(forward.positions.len(), n as usize);
        prop_assert_eq!(forward, backward);
    }
}
