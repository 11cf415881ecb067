use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::render::FrameSource;
use crate::traversal::{Generation, TraversalStatus, drive_blocking};
use crate::*;

const MIN_CANVAS_WIDTH: f32 = 480.0;
const MIN_CANVAS_HEIGHT: f32 = 360.0;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no node is selected")]
    NoSelection,
    #[error("node {0} is not part of the graph")]
    UnknownNode(NodeId),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerButton {
    Left,
    Middle,
    Right,
}

/// What an input event ended up doing, so callers can react (for example by
/// scheduling the steps of a traversal that just started).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Select {
        node: NodeId,
    },
    Toggle {
        node: NodeId,
    },
    Traverse {
        kind: TraversalKind,
        start: NodeId,
        generation: Generation,
    },
    RemoveEdge {
        from: NodeId,
        to: NodeId,
        removed: bool,
    },
    ClearTraversal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeDetails {
    pub id: NodeId,
    pub out_degree: usize,
    pub in_degree: usize,
    pub level: Option<usize>,
    pub visited: bool,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub nodes_total: usize,
    pub edges_total: usize,
    pub components: usize,
    pub visited: usize,
    pub counter: usize,
    pub selected: Vec<NodeId>,
    pub last_traversal: Option<TraversalKind>,
    pub status: TraversalStatus,
}

/// The whole interactive state: graph, layout, viewport, selection and
/// traversal progress.
#[derive(Debug, Clone)]
pub struct GraphSession {
    config: Config,
    graph: GraphStore,
    layout: Layout,
    view: ViewportTransform,
    size: (f32, f32),
    selection: Vec<NodeId>,
    traversal: TraversalEngine,
    last_traversal: Option<TraversalKind>,
}

impl GraphSession {
    pub fn new(config: Config) -> Result<Self, SessionError> {
        Self::with_seed(config, GraphSeed::social())
    }

    pub fn with_seed(config: Config, seed: GraphSeed) -> Result<Self, SessionError> {
        config.validate()?;
        let graph = GraphStore::new(seed)?;
        let layout = compute_layout(&graph, &config.layout);
        let size = (
            config.viewport.width.max(MIN_CANVAS_WIDTH),
            config.viewport.height.max(MIN_CANVAS_HEIGHT),
        );
        let traversal = TraversalEngine::new(config.traversal.clone());
        let view = ViewportTransform::with_bounds(config.viewport.min_scale, config.viewport.max_scale);

        let mut session = Self {
            config,
            graph,
            layout,
            view,
            size,
            selection: Vec::new(),
            traversal,
            last_traversal: None,
        };
        session.refit();

        tracing::info!(
            nodes = session.graph.nodes().len(),
            edges = session.graph.edge_count(),
            "graph session ready"
        );
        Ok(session)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn view(&self) -> &ViewportTransform {
        &self.view
    }

    pub fn size(&self) -> (f32, f32) {
        self.size
    }

    pub fn traversal(&self) -> &TraversalEngine {
        &self.traversal
    }

    pub fn selection(&self) -> &[NodeId] {
        &self.selection
    }

    pub fn select_only(&mut self, node: NodeId) -> Result<(), SessionError> {
        self.ensure_node(node)?;
        self.selection = vec![node];
        tracing::debug!(node, "selection replaced");
        Ok(())
    }

    /// Adds `node` to the end of the selection, or drops it if already there.
    pub fn toggle_selection(&mut self, node: NodeId) -> Result<(), SessionError> {
        self.ensure_node(node)?;
        match self.selection.iter().position(|&selected| selected == node) {
            Some(idx) => {
                self.selection.remove(idx);
            }
            None => self.selection.push(node),
        }
        tracing::debug!(node, selection = ?self.selection, "selection toggled");
        Ok(())
    }

    /// Removes the edge from the first to the second selected node. Does
    /// nothing unless exactly two nodes are selected; in that case the
    /// selection is cleared whether or not the edge existed.
    pub fn delete_selected_edge(&mut self) -> Option<Command> {
        let &[from, to] = self.selection.as_slice() else {
            return None;
        };
        let removed = self.delete_edge(from, to);
        self.selection.clear();
        Some(Command::RemoveEdge { from, to, removed })
    }

    /// Removes a single directed edge. Layout and traversal state are left
    /// alone.
    pub fn delete_edge(&mut self, from: NodeId, to: NodeId) -> bool {
        let removed = self.graph.remove_edge(from, to);
        if removed {
            tracing::info!(from, to, "edge removed");
        }
        removed
    }

    pub fn clear_traversal(&mut self) {
        self.traversal.clear();
    }

    pub fn clear_all(&mut self) {
        self.traversal.clear();
        self.selection.clear();
    }

    pub fn start_traversal(&mut self, kind: TraversalKind) -> Result<Generation, SessionError> {
        let start = self.selection.first().copied().ok_or(SessionError::NoSelection)?;
        self.start_traversal_from(kind, start)
    }

    pub fn start_traversal_from(
        &mut self,
        kind: TraversalKind,
        start: NodeId,
    ) -> Result<Generation, SessionError> {
        let generation = self
            .traversal
            .start(kind, start, &self.graph)
            .ok_or(SessionError::UnknownNode(start))?;
        self.last_traversal = Some(kind);
        Ok(generation)
    }

    pub fn step(&mut self, generation: Generation) -> StepOutcome {
        self.traversal.step(generation, &self.graph)
    }

    pub fn settle(&mut self, generation: Generation) {
        self.traversal.settle(generation);
    }

    /// Runs `generation` to the end on the calling thread, handing each
    /// intermediate state to `pace`.
    pub fn drive<F>(&mut self, generation: Generation, pace: F) -> usize
    where
        F: FnMut(&TraversalSnapshot, Duration),
    {
        drive_blocking(&mut self.traversal, &self.graph, generation, pace)
    }

    /// Puts the canonical edge list back, recomputes the layout and drops
    /// selection and traversal state.
    pub fn restore_canonical(&mut self) {
        self.graph.reset();
        self.layout = compute_layout(&self.graph, &self.config.layout);
        self.refit();
        self.selection.clear();
        self.traversal.clear();
        self.last_traversal = None;
        tracing::info!(edges = self.graph.edge_count(), "canonical graph restored");
    }

    pub fn pointer_down(&mut self, button: PointerButton, point: Point, shift: bool) -> Option<Command> {
        let node = self.hit_test(point)?;
        match (button, shift) {
            (PointerButton::Left, false) => {
                self.select_only(node).ok()?;
                Some(Command::Select { node })
            }
            (PointerButton::Left, true) | (PointerButton::Right, _) => {
                self.toggle_selection(node).ok()?;
                Some(Command::Toggle { node })
            }
            (PointerButton::Middle, _) => self.traverse_command(TraversalKind::Bfs, node),
        }
    }

    pub fn long_press(&mut self, point: Point, held: Duration) -> Option<Command> {
        if held < self.config.interaction.long_press() {
            return None;
        }
        let node = self.hit_test(point)?;
        self.traverse_command(TraversalKind::Bfs, node)
    }

    pub fn key(&mut self, key: &str) -> Option<Command> {
        match key.to_lowercase().as_str() {
            "enter" => self.delete_selected_edge(),
            "c" => {
                self.clear_traversal();
                Some(Command::ClearTraversal)
            }
            "a" => {
                let start = self.selection.first().copied()?;
                self.traverse_command(TraversalKind::Bfs, start)
            }
            _ => None,
        }
    }

    fn traverse_command(&mut self, kind: TraversalKind, start: NodeId) -> Option<Command> {
        let generation = self.start_traversal_from(kind, start).ok()?;
        Some(Command::Traverse {
            kind,
            start,
            generation,
        })
    }

    pub fn wheel(&mut self, point: Point, delta_y: f32) {
        self.view
            .zoom_by_wheel(point, delta_y, self.config.viewport.wheel_sensitivity);
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.view.pan(dx, dy);
    }

    pub fn pinch(&mut self, previous: (Point, Point), current: (Point, Point)) {
        self.view.pinch(previous, current);
    }

    /// New canvas size. Positions stay where they are; only the view is
    /// refitted.
    pub fn resize(&mut self, width: f32, height: f32) {
        self.size = (width.max(MIN_CANVAS_WIDTH), height.max(MIN_CANVAS_HEIGHT));
        self.refit();
    }

    fn refit(&mut self) {
        let bounds = (self.config.viewport.min_scale, self.config.viewport.max_scale);
        if let Some(view) = fit_to_screen(
            &self.layout.positions,
            self.size.0,
            self.size.1,
            bounds,
            &self.config.fit,
        ) {
            self.view = view;
        }
    }

    /// Nearest node whose center is within the scale-dependent pick radius
    /// of `point`. Ties go to the lower id.
    pub fn hit_test(&self, point: Point) -> Option<NodeId> {
        let interaction = &self.config.interaction;
        let threshold = interaction.min_hit_radius.max(interaction.hit_radius * self.view.scale);

        let mut best: Option<(NodeId, f32)> = None;
        for (&node, &world) in &self.layout.positions {
            let distance = point.distance(self.view.world_to_screen(world));
            if distance <= threshold && best.is_none_or(|(_, best_distance)| distance < best_distance) {
                best = Some((node, distance));
            }
        }
        best.map(|(node, _)| node)
    }

    pub fn screen_position(&self, node: NodeId) -> Option<Point> {
        self.layout
            .positions
            .get(&node)
            .map(|&world| self.view.world_to_screen(world))
    }

    pub fn node_details(&self, node: NodeId) -> Result<NodeDetails, SessionError> {
        self.ensure_node(node)?;
        Ok(NodeDetails {
            id: node,
            out_degree: self.graph.out_degree(node),
            in_degree: self.graph.in_degree(node),
            level: self.layout.levels.get(&node).copied(),
            visited: self.traversal.visited().contains(&node),
            selected: self.selection.contains(&node),
        })
    }

    pub fn summary(&self) -> Summary {
        Summary {
            nodes_total: self.graph.nodes().len(),
            edges_total: self.graph.edge_count(),
            components: self.graph.weak_component_count(),
            visited: self.traversal.visited().len(),
            counter: self.traversal.counter(),
            selected: self.selection.clone(),
            last_traversal: self.last_traversal,
            status: self.traversal.status(),
        }
    }

    pub fn frame(&self) -> Frame {
        Frame::build(FrameSource {
            graph: &self.graph,
            positions: &self.layout.positions,
            view: &self.view,
            selected: &self.selection,
            active: self.traversal.active(),
            visited: self.traversal.visited(),
            routing: &self.config.routing,
            size: self.size,
        })
    }

    pub fn render_svg(&self, background: &str) -> Result<String> {
        render_svg(&self.frame(), &self.config.theme, background)
    }

    fn ensure_node(&self, node: NodeId) -> Result<(), SessionError> {
        if self.graph.contains_node(node) {
            Ok(())
        } else {
            Err(SessionError::UnknownNode(node))
        }
    }
}
