use std::collections::{BTreeMap, BTreeSet, VecDeque};

use thiserror::Error;

use crate::NodeId;

/// The built-in social graph: node 1 is a hub connected both ways to 2..=9,
/// with two chains hanging off 6/7/8 that reconverge through 17.
const SOCIAL_EDGES: &[(NodeId, NodeId)] = &[
    (1, 2),
    (1, 3),
    (1, 4),
    (1, 5),
    (1, 6),
    (1, 7),
    (1, 8),
    (1, 9),
    (2, 1),
    (3, 1),
    (4, 1),
    (5, 1),
    (6, 1),
    (7, 1),
    (8, 1),
    (9, 1),
    (10, 3),
    (10, 4),
    (10, 5),
    (6, 11),
    (11, 10),
    (10, 11),
    (11, 12),
    (7, 13),
    (8, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    (16, 17),
    (17, 18),
    (18, 19),
    (18, 21),
    (22, 17),
    (17, 20),
    (10, 15),
    (19, 22),
];

const SOCIAL_NODE_COUNT: NodeId = 22;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("edge {from} -> {to} references a node outside the graph")]
    InvalidEdge { from: NodeId, to: NodeId },
}

/// Node universe plus the canonical edge list a store is seeded from and
/// restored to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSeed {
    pub nodes: Vec<NodeId>,
    pub edges: Vec<(NodeId, NodeId)>,
}

impl GraphSeed {
    pub fn new(nodes: impl IntoIterator<Item = NodeId>, edges: &[(NodeId, NodeId)]) -> Self {
        let nodes: BTreeSet<NodeId> = nodes.into_iter().collect();
        Self {
            nodes: nodes.into_iter().collect(),
            edges: edges.to_vec(),
        }
    }

    pub fn social() -> Self {
        Self::new(1..=SOCIAL_NODE_COUNT, SOCIAL_EDGES)
    }
}

impl Default for GraphSeed {
    fn default() -> Self {
        Self::social()
    }
}

#[derive(Debug, Clone)]
pub struct GraphStore {
    seed: GraphSeed,
    canonical: BTreeMap<NodeId, BTreeSet<NodeId>>,
    adjacency: BTreeMap<NodeId, BTreeSet<NodeId>>,
    reverse: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

impl GraphStore {
    pub fn new(seed: GraphSeed) -> Result<Self, GraphError> {
        let canonical = build_adjacency(&seed.nodes, &seed.edges)?;
        let mut store = Self {
            seed,
            adjacency: canonical.clone(),
            canonical,
            reverse: BTreeMap::new(),
        };
        store.rebuild_reverse();
        Ok(store)
    }

    /// Replaces the adjacency with one built from `edges` over the store's
    /// node universe. On error the current adjacency is left untouched.
    pub fn initialize(&mut self, edges: &[(NodeId, NodeId)]) -> Result<(), GraphError> {
        self.adjacency = build_adjacency(&self.seed.nodes, edges)?;
        self.rebuild_reverse();
        Ok(())
    }

    pub fn rebuild_reverse(&mut self) {
        let mut reverse: BTreeMap<NodeId, BTreeSet<NodeId>> = self
            .seed
            .nodes
            .iter()
            .map(|&id| (id, BTreeSet::new()))
            .collect();
        for (&from, targets) in &self.adjacency {
            for &to in targets {
                reverse.entry(to).or_default().insert(from);
            }
        }
        self.reverse = reverse;
    }

    /// Removes the directed edge `from -> to`. Returns `false` when it was
    /// not present.
    pub fn remove_edge(&mut self, from: NodeId, to: NodeId) -> bool {
        let removed = self
            .adjacency
            .get_mut(&from)
            .is_some_and(|targets| targets.remove(&to));
        if removed {
            if let Some(sources) = self.reverse.get_mut(&to) {
                sources.remove(&from);
            }
        }
        removed
    }

    pub fn reset(&mut self) {
        self.adjacency = self.canonical.clone();
        self.rebuild_reverse();
    }

    pub fn weak_component_count(&self) -> usize {
        let mut seen: BTreeSet<NodeId> = BTreeSet::new();
        let mut count = 0;

        for &start in &self.seed.nodes {
            if seen.contains(&start) {
                continue;
            }
            count += 1;
            let mut stack = vec![start];
            while let Some(node) = stack.pop() {
                if !seen.insert(node) {
                    continue;
                }
                for neighbor in self.successors(node).chain(self.predecessors(node)) {
                    if !seen.contains(&neighbor) {
                        stack.push(neighbor);
                    }
                }
            }
        }

        count
    }

    /// Everything reachable from `roots` along outgoing edges. Roots are only
    /// included when some path leads back to them.
    pub fn descendants(&self, roots: &[NodeId]) -> BTreeSet<NodeId> {
        let mut out = BTreeSet::new();
        let mut queue: VecDeque<NodeId> = roots.iter().copied().collect();
        while let Some(node) = queue.pop_front() {
            for next in self.successors(node) {
                if out.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        out
    }

    pub fn successors(&self, node: NodeId) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.adjacency
            .get(&node)
            .into_iter()
            .flat_map(|targets| targets.iter().copied())
    }

    pub fn predecessors(&self, node: NodeId) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.reverse
            .get(&node)
            .into_iter()
            .flat_map(|sources| sources.iter().copied())
    }

    pub fn out_degree(&self, node: NodeId) -> usize {
        self.adjacency.get(&node).map_or(0, BTreeSet::len)
    }

    pub fn in_degree(&self, node: NodeId) -> usize {
        self.reverse.get(&node).map_or(0, BTreeSet::len)
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.adjacency.contains_key(&node)
    }

    pub fn contains_edge(&self, from: NodeId, to: NodeId) -> bool {
        self.adjacency
            .get(&from)
            .is_some_and(|targets| targets.contains(&to))
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.seed.nodes
    }

    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.adjacency
            .iter()
            .flat_map(|(&from, targets)| targets.iter().map(move |&to| (from, to)))
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum()
    }

    pub fn canonical_edges(&self) -> &[(NodeId, NodeId)] {
        &self.seed.edges
    }

    pub fn adjacency(&self) -> &BTreeMap<NodeId, BTreeSet<NodeId>> {
        &self.adjacency
    }

    pub fn reverse_adjacency(&self) -> &BTreeMap<NodeId, BTreeSet<NodeId>> {
        &self.reverse
    }
}

fn build_adjacency(
    nodes: &[NodeId],
    edges: &[(NodeId, NodeId)],
) -> Result<BTreeMap<NodeId, BTreeSet<NodeId>>, GraphError> {
    let mut adjacency: BTreeMap<NodeId, BTreeSet<NodeId>> =
        nodes.iter().map(|&id| (id, BTreeSet::new())).collect();

    for &(from, to) in edges {
        if !adjacency.contains_key(&to) {
            return Err(GraphError::InvalidEdge { from, to });
        }
        match adjacency.get_mut(&from) {
            Some(targets) => {
                targets.insert(to);
            }
            None => return Err(GraphError::InvalidEdge { from, to }),
        }
    }

    Ok(adjacency)
}
