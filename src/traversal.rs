use std::collections::{BTreeSet, VecDeque};
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::TraversalTiming;
use crate::{GraphStore, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TraversalKind {
    Bfs,
    Dfs,
}

impl TraversalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraversalKind::Bfs => "bfs",
            TraversalKind::Dfs => "dfs",
        }
    }

    pub fn delay(&self, timing: &TraversalTiming) -> Duration {
        match self {
            TraversalKind::Bfs => timing.bfs_delay(),
            TraversalKind::Dfs => timing.dfs_delay(),
        }
    }
}

/// Identifies one traversal run. Steps carrying an older generation are
/// ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Generation(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum TraversalStatus {
    Idle,
    Running {
        kind: TraversalKind,
        generation: Generation,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkStep {
    pub nodes: Vec<NodeId>,
    pub counter: usize,
}

#[derive(Debug, Clone)]
enum Frontier {
    Queue(VecDeque<NodeId>),
    Stack(Vec<NodeId>),
}

/// One BFS or DFS run as an owned step machine. Successors of the last
/// reported step are expanded lazily on the next `advance`, so edges removed
/// in between are not followed.
#[derive(Debug, Clone)]
pub struct Walk {
    kind: TraversalKind,
    frontier: Frontier,
    visited: BTreeSet<NodeId>,
    pending: Vec<NodeId>,
    counter: usize,
}

impl Walk {
    pub fn new(kind: TraversalKind, start: NodeId) -> Self {
        let frontier = match kind {
            TraversalKind::Bfs => Frontier::Queue(VecDeque::from([start])),
            TraversalKind::Dfs => Frontier::Stack(vec![start]),
        };
        Self {
            kind,
            frontier,
            visited: BTreeSet::new(),
            pending: Vec::new(),
            counter: 0,
        }
    }

    pub fn kind(&self) -> TraversalKind {
        self.kind
    }

    pub fn visited(&self) -> &BTreeSet<NodeId> {
        &self.visited
    }

    pub fn advance(&mut self, graph: &GraphStore) -> Option<WalkStep> {
        let pending = std::mem::take(&mut self.pending);
        match &mut self.frontier {
            Frontier::Queue(queue) => {
                for &node in &pending {
                    for next in graph.successors(node) {
                        if !self.visited.contains(&next) {
                            queue.push_back(next);
                        }
                    }
                }

                let mut layer = Vec::new();
                while let Some(node) = queue.pop_front() {
                    if !self.visited.contains(&node) && !layer.contains(&node) {
                        layer.push(node);
                    }
                }
                if layer.is_empty() {
                    return None;
                }

                self.visited.extend(layer.iter().copied());
                self.counter += 1;
                self.pending = layer.clone();
                Some(WalkStep {
                    nodes: layer,
                    counter: self.counter,
                })
            }
            Frontier::Stack(stack) => {
                for &node in &pending {
                    for next in graph.successors(node).rev() {
                        if !self.visited.contains(&next) {
                            stack.push(next);
                        }
                    }
                }

                while let Some(node) = stack.pop() {
                    if !self.visited.insert(node) {
                        continue;
                    }
                    self.counter += 1;
                    self.pending = vec![node];
                    return Some(WalkStep {
                        nodes: vec![node],
                        counter: self.counter,
                    });
                }
                None
            }
        }
    }
}

/// Runs a walk to completion against a fixed graph.
pub struct WalkIter<'g> {
    walk: Walk,
    graph: &'g GraphStore,
}

impl<'g> WalkIter<'g> {
    pub fn new(graph: &'g GraphStore, kind: TraversalKind, start: NodeId) -> Self {
        Self {
            walk: Walk::new(kind, start),
            graph,
        }
    }
}

impl Iterator for WalkIter<'_> {
    type Item = WalkStep;

    fn next(&mut self) -> Option<Self::Item> {
        self.walk.advance(self.graph)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Advanced { nodes: Vec<NodeId>, delay: Duration },
    Finished,
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraversalSnapshot {
    pub visited: BTreeSet<NodeId>,
    pub active: Option<BTreeSet<NodeId>>,
    pub counter: usize,
    pub status: TraversalStatus,
}

#[derive(Debug, Clone)]
pub struct TraversalEngine {
    timing: TraversalTiming,
    visited: BTreeSet<NodeId>,
    active: Option<BTreeSet<NodeId>>,
    counter: usize,
    status: TraversalStatus,
    walk: Option<Walk>,
    next_generation: u64,
}

impl TraversalEngine {
    pub fn new(timing: TraversalTiming) -> Self {
        Self {
            timing,
            visited: BTreeSet::new(),
            active: None,
            counter: 0,
            status: TraversalStatus::Idle,
            walk: None,
            next_generation: 0,
        }
    }

    /// Starts a run from `start`, cancelling whatever run was in flight.
    /// Returns `None` when `start` is not part of the graph.
    pub fn start(
        &mut self,
        kind: TraversalKind,
        start: NodeId,
        graph: &GraphStore,
    ) -> Option<Generation> {
        if !graph.contains_node(start) {
            return None;
        }

        self.cancel();
        self.next_generation += 1;
        let generation = Generation(self.next_generation);
        self.walk = Some(Walk::new(kind, start));
        self.status = TraversalStatus::Running { kind, generation };
        tracing::debug!(kind = kind.as_str(), start, generation = generation.0, "traversal started");
        Some(generation)
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        matches!(self.status, TraversalStatus::Running { generation: current, .. } if current == generation)
    }

    pub fn step(&mut self, generation: Generation, graph: &GraphStore) -> StepOutcome {
        if !self.is_current(generation) {
            return StepOutcome::Stale;
        }
        self.active = None;

        let Some(walk) = self.walk.as_mut() else {
            self.finish();
            return StepOutcome::Finished;
        };
        let kind = walk.kind();

        match walk.advance(graph) {
            Some(step) => {
                self.visited.extend(step.nodes.iter().copied());
                self.active = Some(step.nodes.iter().copied().collect());
                self.counter = step.counter;
                tracing::debug!(
                    kind = kind.as_str(),
                    counter = step.counter,
                    nodes = ?step.nodes,
                    "traversal step"
                );
                StepOutcome::Advanced {
                    nodes: step.nodes,
                    delay: kind.delay(&self.timing),
                }
            }
            None => {
                self.finish();
                tracing::debug!(kind = kind.as_str(), generation = generation.0, "traversal finished");
                StepOutcome::Finished
            }
        }
    }

    /// Drops the highlight once the display pause for `generation` is over.
    pub fn settle(&mut self, generation: Generation) {
        if self.is_current(generation) {
            self.active = None;
        }
    }

    pub fn clear(&mut self) {
        self.cancel();
        self.visited.clear();
    }

    fn cancel(&mut self) {
        self.walk = None;
        self.active = None;
        self.counter = 0;
        self.status = TraversalStatus::Idle;
    }

    fn finish(&mut self) {
        self.cancel();
    }

    pub fn visited(&self) -> &BTreeSet<NodeId> {
        &self.visited
    }

    pub fn active(&self) -> Option<&BTreeSet<NodeId>> {
        self.active.as_ref()
    }

    pub fn counter(&self) -> usize {
        self.counter
    }

    pub fn status(&self) -> TraversalStatus {
        self.status
    }

    pub fn timing(&self) -> &TraversalTiming {
        &self.timing
    }

    pub fn snapshot(&self) -> TraversalSnapshot {
        TraversalSnapshot {
            visited: self.visited.clone(),
            active: self.active.clone(),
            counter: self.counter,
            status: self.status,
        }
    }
}

/// Drives `generation` to completion on the calling thread. `pace` sees the
/// state right after each step together with the delay a display would hold
/// it for.
pub fn drive_blocking<F>(
    engine: &mut TraversalEngine,
    graph: &GraphStore,
    generation: Generation,
    mut pace: F,
) -> usize
where
    F: FnMut(&TraversalSnapshot, Duration),
{
    let mut steps = 0;
    loop {
        match engine.step(generation, graph) {
            StepOutcome::Advanced { delay, .. } => {
                steps += 1;
                pace(&engine.snapshot(), delay);
                engine.settle(generation);
            }
            StepOutcome::Finished | StepOutcome::Stale => return steps,
        }
    }
}
